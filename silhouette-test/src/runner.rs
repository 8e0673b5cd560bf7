use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Mat4, UVec2, Vec4};
use silhouette::{
    compose::ColorImage,
    types::{
        Camera, CameraHandle, CameraProjection, ColorGroup, Handedness, MeshBuilder, MeshHandle, MeshKind,
        OutlineConfig, SourceCamera, SurfaceMaterial, Texture, TextureHandle,
    },
    CameraProvider, CameraSet, FrameReport, ObjectRenderable, OutlineBackend, OutlineCompositor, SoftwareBackend, TagRegistry,
    TaggedObject,
};

use crate::helpers::{pixel_rect_transform, QUAD_INDICES, QUAD_POSITIONS, QUAD_TEXTURE_COORDINATES};

/// Color of the host frame the runner composites onto.
pub const SOURCE_COLOR: Vec4 = Vec4::new(0.2, 0.4, 0.6, 1.0);

pub struct TestRunnerBuilder {
    resolution: UVec2,
    handedness: Handedness,
    config: OutlineConfig,
    missing_assets: Vec<&'static str>,
}

impl TestRunnerBuilder {
    pub fn new() -> Self {
        Self {
            resolution: UVec2::splat(32),
            handedness: Handedness::Left,
            config: OutlineConfig::default(),
            missing_assets: Vec::new(),
        }
    }

    pub fn resolution(mut self, resolution: UVec2) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = handedness;
        self
    }

    pub fn config(mut self, config: OutlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build as if the named shader asset was never shipped.
    pub fn without_asset(mut self, name: &'static str) -> Self {
        self.missing_assets.push(name);
        self
    }

    /// Create the runner and activate its compositor.
    pub fn build(self) -> Result<TestRunner> {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut backend = SoftwareBackend::new();
        for name in self.missing_assets {
            backend.remove_asset(name);
        }

        let mut source = SourceCamera::new(
            Camera {
                projection: CameraProjection::Raw(Mat4::IDENTITY),
                view: Mat4::IDENTITY,
            },
            self.resolution,
        );
        source.handedness = self.handedness;

        let mut cameras = CameraSet::new();
        let camera = cameras.add(source);

        let mut compositor = OutlineCompositor::new(backend, self.config);
        compositor
            .on_activate(&cameras)
            .context("Outline compositor activation failed")?;

        let quad = compositor.backend_mut().add_mesh(
            MeshBuilder::new(QUAD_POSITIONS.to_vec())
                .with_vertex_texture_coordinates(QUAD_TEXTURE_COORDINATES.to_vec())
                .with_indices(QUAD_INDICES.to_vec())
                .build()?,
        )?;

        Ok(TestRunner {
            compositor,
            registry: TagRegistry::new(),
            cameras,
            camera,
            quad_mesh: quad,
        })
    }
}

impl Default for TestRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives an [`OutlineCompositor`] on the software backend the way a host
/// render loop would.
pub struct TestRunner {
    pub compositor: OutlineCompositor<SoftwareBackend>,
    pub registry: TagRegistry,
    pub cameras: CameraSet,
    pub camera: CameraHandle,
    quad_mesh: MeshHandle,
}

impl TestRunner {
    pub fn builder() -> TestRunnerBuilder {
        TestRunnerBuilder::new()
    }

    pub fn backend(&mut self) -> &mut SoftwareBackend {
        self.compositor.backend_mut()
    }

    /// The [-1, 1] plane every quad helper draws.
    pub fn quad_mesh(&self) -> MeshHandle {
        self.quad_mesh
    }

    pub fn resolution(&self) -> UVec2 {
        self.source().resolution
    }

    pub fn source(&self) -> SourceCamera {
        self.cameras
            .camera(self.camera)
            .expect("runner camera is never removed")
    }

    pub fn resize(&mut self, resolution: UVec2) {
        if let Some(camera) = self.cameras.get_mut(self.camera) {
            camera.resolution = resolution;
        }
    }

    /// A renderable quad covering the pixels `min..max` of the current
    /// resolution.
    pub fn quad(&self, min: UVec2, max: UVec2, surfaces: impl IntoIterator<Item = SurfaceMaterial>) -> ObjectRenderable {
        ObjectRenderable::new(MeshKind::Static(self.quad_mesh), 1, surfaces)
            .with_transform(pixel_rect_transform(min, max, self.resolution()))
    }

    /// Tag and register an untextured quad.
    pub fn add_quad(&mut self, min: UVec2, max: UVec2, group: ColorGroup) -> Arc<TaggedObject> {
        self.add_object(self.quad(min, max, [SurfaceMaterial::UNTEXTURED]), group, false)
    }

    pub fn add_erase_quad(&mut self, min: UVec2, max: UVec2) -> Arc<TaggedObject> {
        self.add_object(self.quad(min, max, [SurfaceMaterial::UNTEXTURED]), ColorGroup::A, true)
    }

    pub fn add_textured_quad(
        &mut self,
        min: UVec2,
        max: UVec2,
        texture: TextureHandle,
        group: ColorGroup,
    ) -> Arc<TaggedObject> {
        self.add_object(self.quad(min, max, [SurfaceMaterial::textured(texture)]), group, false)
    }

    pub fn add_object(&mut self, renderable: ObjectRenderable, group: ColorGroup, erase: bool) -> Arc<TaggedObject> {
        let object = Arc::new(TaggedObject::new(Arc::new(renderable), group).with_erase(erase));
        self.registry.register(Arc::clone(&object));
        object
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureHandle {
        self.backend().add_texture(texture)
    }

    /// Pre-render phase only.
    pub fn frame_begin(&mut self) -> Result<FrameReport> {
        Ok(self.compositor.on_frame_begin(&self.registry, &self.cameras)?)
    }

    /// The outline buffer as the last pre-render phase left it.
    pub fn outline_buffer(&self) -> Result<&ColorImage> {
        let buffers = self.compositor.buffers().context("Compositor has no buffers")?;
        self.compositor
            .backend()
            .image(buffers.outline)
            .context("Outline buffer is not an image")
    }

    /// Run a whole frame over a host frame filled with [`SOURCE_COLOR`],
    /// returning the composited result.
    pub fn render_frame(&mut self) -> Result<(FrameReport, ColorImage)> {
        let report = self.frame_begin()?;

        let resolution = self.resolution();
        let backend = self.compositor.backend_mut();
        let source = backend.import_image("host frame", ColorImage::filled(resolution, SOURCE_COLOR));
        let destination = backend.import_image("host destination", ColorImage::new(resolution));

        let result = self.compositor.on_composite(source, destination);
        let image = self.compositor.backend().image(destination).cloned();

        let backend = self.compositor.backend_mut();
        backend.release_render_target(source);
        backend.release_render_target(destination);

        result?;
        Ok((report, image.context("Destination image vanished")?))
    }
}
