use glam::{Mat4, UVec2, Vec4};
use silhouette_types::{
    Camera, CameraHandle, CameraProjection, Handedness, LayerMask, RenderPath, RenderTargetHandle, SourceCamera,
    ViewportRect,
};

use crate::util::freelist::{FreelistIndex, FreelistVec};

/// Host capability that resolves camera handles.
pub trait CameraProvider {
    fn camera(&self, handle: CameraHandle) -> Option<SourceCamera>;

    /// Camera used when nothing more specific is configured.
    fn default_camera(&self) -> Option<SourceCamera>;
}

/// Simple [`CameraProvider`] storing cameras by handle.
#[derive(Debug, Default)]
pub struct CameraSet {
    cameras: FreelistVec<SourceCamera>,
    default: Option<CameraHandle>,
}

impl CameraSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a camera. The first camera added becomes the default camera.
    pub fn add(&mut self, camera: SourceCamera) -> CameraHandle {
        let handle = CameraHandle::new(self.cameras.push(camera).0);
        self.default.get_or_insert(handle);
        handle
    }

    /// Replaces the camera's state, returning false if the handle is unknown.
    pub fn update(&mut self, handle: CameraHandle, camera: SourceCamera) -> bool {
        match self.cameras.get_mut(FreelistIndex(handle.idx)) {
            Some(slot) => {
                *slot = camera;
                true
            }
            None => false,
        }
    }

    pub fn get_mut(&mut self, handle: CameraHandle) -> Option<&mut SourceCamera> {
        self.cameras.get_mut(FreelistIndex(handle.idx))
    }

    pub fn remove(&mut self, handle: CameraHandle) -> Option<SourceCamera> {
        if self.default == Some(handle) {
            self.default = None;
        }
        self.cameras.remove(FreelistIndex(handle.idx))
    }

    pub fn set_default(&mut self, handle: Option<CameraHandle>) {
        self.default = handle;
    }
}

impl CameraProvider for CameraSet {
    fn camera(&self, handle: CameraHandle) -> Option<SourceCamera> {
        self.cameras.get(FreelistIndex(handle.idx)).copied()
    }

    fn default_camera(&self) -> Option<SourceCamera> {
        self.camera(self.default?)
    }
}

/// Full state of the off-screen camera as handed to a backend.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OutlineCameraState {
    pub camera: Camera,
    pub handedness: Handedness,
    pub resolution: UVec2,
    pub view_proj: Mat4,
    pub render_path: RenderPath,
    pub clear_color: Vec4,
    /// Depth the target is cleared to. Projection uses reversed z, so this is
    /// the far plane.
    pub clear_depth: f32,
    pub viewport: ViewportRect,
    pub hdr: bool,
    pub culling_mask: LayerMask,
    pub target: Option<RenderTargetHandle>,
}

impl Default for OutlineCameraState {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            handedness: Handedness::Left,
            resolution: UVec2::ZERO,
            view_proj: Mat4::IDENTITY,
            render_path: RenderPath::Forward,
            clear_color: Vec4::ZERO,
            clear_depth: 0.0,
            viewport: ViewportRect::FULL,
            hdr: false,
            culling_mask: LayerMask::NONE,
            target: None,
        }
    }
}

/// The off-screen camera a compositor renders tagged objects with.
///
/// Each compositor owns exactly one; it mirrors the source camera every frame
/// while rendering nothing through the ordinary scene pipeline.
#[derive(Debug, Default)]
pub struct AuxiliaryCamera {
    state: OutlineCameraState,
}

impl AuxiliaryCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror `source` and retarget output to `target`.
    pub fn sync(&mut self, source: &SourceCamera, target: RenderTargetHandle) {
        profiling::scope!("AuxiliaryCamera::sync");

        let aspect_ratio = if source.resolution.y == 0 {
            1.0
        } else {
            source.resolution.x as f32 / source.resolution.y as f32
        };
        let proj = compute_projection_matrix(source.camera, source.handedness, aspect_ratio);

        self.state = OutlineCameraState {
            camera: source.camera,
            handedness: source.handedness,
            resolution: source.resolution,
            view_proj: proj * source.camera.view,
            render_path: RenderPath::Forward,
            clear_color: Vec4::ZERO,
            clear_depth: 0.0,
            viewport: ViewportRect::FULL,
            hdr: false,
            culling_mask: LayerMask::NONE,
            target: Some(target),
        };
    }

    pub fn state(&self) -> &OutlineCameraState {
        &self.state
    }

    pub fn target(&self) -> Option<RenderTargetHandle> {
        self.state.target
    }

    /// Drop the target binding, used when the compositor tears down.
    pub fn detach(&mut self) {
        self.state.target = None;
    }
}

fn compute_projection_matrix(data: Camera, handedness: Handedness, aspect_ratio: f32) -> Mat4 {
    match data.projection {
        CameraProjection::Orthographic { size } => {
            let half = size * 0.5;
            if handedness == Handedness::Left {
                Mat4::orthographic_lh(-half.x, half.x, -half.y, half.y, half.z, -half.z)
            } else {
                Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, half.z, -half.z)
            }
        }
        CameraProjection::Perspective { vfov, near } => {
            if handedness == Handedness::Left {
                Mat4::perspective_infinite_reverse_lh(vfov.to_radians(), aspect_ratio, near)
            } else {
                Mat4::perspective_infinite_reverse_rh(vfov.to_radians(), aspect_ratio, near)
            }
        }
        CameraProjection::Raw(proj) => proj,
    }
}

#[cfg(test)]
mod test {
    use glam::{Vec2, Vec3, Vec3A};

    use super::*;

    #[test]
    fn sync_mirrors_source_but_draws_nothing() {
        let mut source = SourceCamera::new(
            Camera {
                projection: CameraProjection::Orthographic {
                    size: Vec3A::new(2.0, 2.0, 2.0),
                },
                view: Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5)),
            },
            UVec2::new(640, 360),
        );
        source.render_path = RenderPath::Deferred;
        source.hdr = true;
        source.viewport = ViewportRect {
            offset: Vec2::new(0.5, 0.0),
            size: Vec2::new(0.5, 1.0),
        };
        source.clear_color = Vec4::ONE;

        let mut aux = AuxiliaryCamera::new();
        let target = RenderTargetHandle::new(7);
        aux.sync(&source, target);

        let state = aux.state();
        assert_eq!(state.camera, source.camera);
        assert_eq!(state.resolution, source.resolution);
        assert_eq!(state.render_path, RenderPath::Forward);
        assert_eq!(state.clear_color, Vec4::ZERO);
        assert_eq!(state.viewport, ViewportRect::FULL);
        assert!(!state.hdr);
        assert_eq!(state.culling_mask, LayerMask::NONE);
        assert_eq!(state.target, Some(target));

        // The world origin lands in the middle of the screen.
        let clip = state.view_proj * Vec4::new(0.0, 0.0, -0.5, 1.0);
        assert!(clip.x.abs() < 1e-6 && clip.y.abs() < 1e-6);
    }

    #[test]
    fn camera_set_default_follows_removal() {
        let mut set = CameraSet::new();
        let a = set.add(SourceCamera::new(Camera::default(), UVec2::new(4, 4)));
        let b = set.add(SourceCamera::new(Camera::default(), UVec2::new(8, 8)));

        assert_eq!(set.default_camera().unwrap().resolution, UVec2::new(4, 4));
        set.remove(a);
        assert!(set.default_camera().is_none());
        assert!(set.camera(a).is_none());

        set.set_default(Some(b));
        assert_eq!(set.default_camera().unwrap().resolution, UVec2::new(8, 8));
    }
}
