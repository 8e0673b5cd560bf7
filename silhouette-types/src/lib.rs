#![warn(unsafe_op_in_unsafe_fn)]

//! Type declarations for the silhouette outline rendering crates.
//!
//! This is reexported in the silhouette crate proper and includes all the
//! "surface" api arguments: handles, meshes, cameras and the outline
//! configuration.

use std::{fmt::Debug, hash::Hash, marker::PhantomData};

/// Reexport of the glam version silhouette is using.
pub use glam;
use glam::{Mat4, UVec2, Vec2, Vec3A, Vec4};

mod config;
mod mesh;

pub use config::*;
pub use mesh::*;

/// Non-owning resource handle.
///
/// Handles are handed out by a backend and are only meaningful to the backend
/// which created them.
pub struct RawResourceHandle<T> {
    /// Underlying value of the handle.
    pub idx: usize,
    _phantom: PhantomData<T>,
}

impl<T> RawResourceHandle<T> {
    /// Creates a new handle with the given value
    pub const fn new(idx: usize) -> Self {
        Self {
            idx,
            _phantom: PhantomData,
        }
    }
}

// Need Debug/Copy/Clone impls that don't require T: Trait.
impl<T> Debug for RawResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResourceHandle").field("idx", &self.idx).finish()
    }
}

impl<T> Copy for RawResourceHandle<T> {}

impl<T> Clone for RawResourceHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for RawResourceHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl<T> Eq for RawResourceHandle<T> {}

impl<T> PartialOrd for RawResourceHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for RawResourceHandle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.idx.cmp(&other.idx)
    }
}

impl<T> Hash for RawResourceHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}

/// Tag type for differentiating draw materials on the type level.
#[doc(hidden)]
pub struct DrawMaterialTag;
/// Tag type for differentiating render targets on the type level.
#[doc(hidden)]
pub struct RenderTargetTag;

/// Handle to a Mesh
pub type MeshHandle = RawResourceHandle<Mesh>;
/// Handle to a Texture. Texture identity is the handle identity.
pub type TextureHandle = RawResourceHandle<Texture>;
/// Handle to a Skeleton
pub type SkeletonHandle = RawResourceHandle<Skeleton>;
/// Handle to a backend draw material
pub type MaterialHandle = RawResourceHandle<DrawMaterialTag>;
/// Handle to a backend render target
pub type RenderTargetHandle = RawResourceHandle<RenderTargetTag>;
/// Handle to a host camera
pub type CameraHandle = RawResourceHandle<SourceCamera>;

/// Which way the host's coordinate system is oriented.
///
/// Determines which winding order is considered front facing: left handed
/// hosts treat clockwise triangles as front facing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Handedness {
    #[default]
    Left,
    Right,
}

/// Describes how the camera should look at the scene.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CameraProjection {
    Orthographic {
        /// Size assumes the location is at the center of the camera area.
        size: Vec3A,
    },
    Perspective {
        /// Vertical field of view in degrees.
        vfov: f32,
        /// Near plane distance. All projection uses a infinite far plane.
        near: f32,
    },
    Raw(Mat4),
}

impl Default for CameraProjection {
    fn default() -> Self {
        Self::Perspective { vfov: 60.0, near: 0.1 }
    }
}

/// Describes how the world should be projected into the camera.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub projection: CameraProjection,
    /// View matrix
    pub view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: CameraProjection::default(),
            view: Mat4::IDENTITY,
        }
    }
}

/// Normalized viewport rectangle of a camera, in `[0, 1]` target space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportRect {
    pub offset: Vec2,
    pub size: Vec2,
}

impl ViewportRect {
    pub const FULL: Self = Self {
        offset: Vec2::ZERO,
        size: Vec2::ONE,
    };
}

impl Default for ViewportRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Rendering path a camera renders the ordinary scene with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum RenderPath {
    #[default]
    Forward,
    Deferred,
}

/// Bitmask of the 32 scene layers a camera renders.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: Self = Self(u32::MAX);
    pub const NONE: Self = Self(0);

    /// Mask containing exactly one layer. Layers past 31 produce an empty mask.
    pub const fn layer(layer: u8) -> Self {
        if layer < 32 {
            Self(1 << layer)
        } else {
            Self::NONE
        }
    }

    pub const fn contains_layer(self, layer: u8) -> bool {
        layer < 32 && self.0 & (1 << layer) != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Everything the outline pipeline needs to know about a host camera to mirror
/// it for a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SourceCamera {
    pub camera: Camera,
    pub handedness: Handedness,
    /// Pixel dimensions of the camera's output.
    pub resolution: UVec2,
    pub culling_mask: LayerMask,
    pub viewport: ViewportRect,
    pub render_path: RenderPath,
    pub clear_color: Vec4,
    pub hdr: bool,
    /// Set when the camera renders into a stereo eye texture. Line thickness is
    /// then normalized against the eye texture instead of the viewport.
    pub stereo_eye_resolution: Option<UVec2>,
}

impl SourceCamera {
    pub fn new(camera: Camera, resolution: UVec2) -> Self {
        Self {
            camera,
            handedness: Handedness::Left,
            resolution,
            culling_mask: LayerMask::ALL,
            viewport: ViewportRect::FULL,
            render_path: RenderPath::Forward,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            hdr: false,
            stereo_eye_resolution: None,
        }
    }
}

/// Texture data given to a backend. Always RGBA8, row-major, no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub label: Option<String>,
    pub size: UVec2,
    pub data: Vec<u8>,
}

impl Texture {
    /// Alpha of the texel at the given integer coordinate, wrapping around the
    /// edges.
    pub fn alpha_at(&self, x: i32, y: i32) -> f32 {
        if self.size.x == 0 || self.size.y == 0 {
            return 0.0;
        }
        let x = x.rem_euclid(self.size.x as i32) as usize;
        let y = y.rem_euclid(self.size.y as i32) as usize;
        let offset = (y * self.size.x as usize + x) * 4 + 3;
        self.data.get(offset).map_or(0.0, |&a| a as f32 / 255.0)
    }
}

/// Per-joint deformation of a posed skeleton. Each matrix is applied to the
/// vertices weighted to the corresponding joint; it is not the joint's own
/// transform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub joint_deltas: Vec<Mat4>,
}

/// Which mesh an object renders, and whether it is deformed by a skeleton.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Static(MeshHandle),
    Skinned { mesh: MeshHandle, skeleton: SkeletonHandle },
}

impl MeshKind {
    pub fn mesh(&self) -> MeshHandle {
        match *self {
            Self::Static(mesh) => mesh,
            Self::Skinned { mesh, .. } => mesh,
        }
    }

    pub fn skeleton(&self) -> Option<SkeletonHandle> {
        match *self {
            Self::Static(_) => None,
            Self::Skinned { skeleton, .. } => Some(skeleton),
        }
    }
}

/// The part of a host surface material the outline pipeline cares about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct SurfaceMaterial {
    /// Base color texture, used for alpha-tested cut-outs.
    pub base_texture: Option<TextureHandle>,
}

impl SurfaceMaterial {
    pub const UNTEXTURED: Self = Self { base_texture: None };

    pub fn textured(texture: TextureHandle) -> Self {
        Self {
            base_texture: Some(texture),
        }
    }
}
