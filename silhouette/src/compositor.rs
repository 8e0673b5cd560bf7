//! Frame lifecycle of the outline effect.

use glam::UVec2;
use silhouette_types::{CameraHandle, OutlineConfig, RenderTargetHandle, SourceCamera};

use crate::{
    backend::{CompositePass, OutlineBackend, RenderTargetDescriptor},
    camera::{AuxiliaryCamera, CameraProvider},
    dispatch::DrawDispatcher,
    material::MaterialCache,
    registry::TagRegistry,
    uniforms::OutlineUniforms,
    OutlineError, OutlineResult,
};

/// The off-screen targets tagged objects are drawn into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutlineBuffers {
    /// Receives the tagged objects.
    pub outline: RenderTargetHandle,
    /// Receives the separation pass when lines between colors are enabled.
    pub extra: RenderTargetHandle,
    pub resolution: UVec2,
}

/// Summary of one pre-render phase.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub resolution: UVec2,
    /// The buffers were reallocated this frame.
    pub resized: bool,
    pub drawn_objects: usize,
    pub draws: usize,
    pub culled: usize,
    pub skipped: usize,
}

/// Renders outlines around the objects of a [`TagRegistry`] onto a camera's
/// frame.
///
/// The host drives it with [`on_activate`](Self::on_activate), then per frame
/// [`on_frame_begin`](Self::on_frame_begin) after its own scene has been
/// submitted and [`on_composite`](Self::on_composite) with the rendered frame,
/// and finally [`on_teardown`](Self::on_teardown). Dropping the compositor
/// tears it down.
pub struct OutlineCompositor<B: OutlineBackend> {
    backend: B,
    config: OutlineConfig,
    attached_camera: Option<CameraHandle>,
    camera: AuxiliaryCamera,
    buffers: Option<OutlineBuffers>,
    materials: MaterialCache,
    dispatcher: DrawDispatcher,
    source: Option<SourceCamera>,
    uniforms: OutlineUniforms,
    active: bool,
}

impl<B: OutlineBackend> OutlineCompositor<B> {
    pub fn new(backend: B, config: OutlineConfig) -> Self {
        Self {
            backend,
            config,
            attached_camera: None,
            camera: AuxiliaryCamera::new(),
            buffers: None,
            materials: MaterialCache::new(),
            dispatcher: DrawDispatcher::new(),
            source: None,
            uniforms: OutlineUniforms::default(),
            active: false,
        }
    }

    /// The camera this compositor belongs to. Used when the config does not
    /// name a source camera.
    pub fn attach_camera(&mut self, camera: Option<CameraHandle>) {
        self.attached_camera = camera;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &OutlineConfig {
        &self.config
    }

    /// Mutable config. Changes reach the shader on the next
    /// [`apply_config`](Self::apply_config), which every frame runs.
    pub fn config_mut(&mut self) -> &mut OutlineConfig {
        &mut self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn buffers(&self) -> Option<&OutlineBuffers> {
        self.buffers.as_ref()
    }

    pub fn auxiliary_camera(&self) -> &AuxiliaryCamera {
        &self.camera
    }

    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    pub fn dispatcher(&self) -> &DrawDispatcher {
        &self.dispatcher
    }

    pub fn uniforms(&self) -> &OutlineUniforms {
        &self.uniforms
    }

    /// Load shaders, create the shared materials and the buffers.
    ///
    /// A missing shader asset fails activation and leaves nothing allocated.
    pub fn on_activate<C: CameraProvider + ?Sized>(&mut self, cameras: &C) -> OutlineResult<()> {
        profiling::scope!("OutlineCompositor::on_activate");

        if self.active {
            return Ok(());
        }

        let result = self.activate(cameras);
        if result.is_err() {
            self.release_resources();
        }
        result
    }

    fn activate<C: CameraProvider + ?Sized>(&mut self, cameras: &C) -> OutlineResult<()> {
        self.backend.prepare()?;
        self.materials.create_shared(&mut self.backend, self.config.cull_mode())?;

        let source = self.resolve_source(cameras)?;
        let buffers = self.ensure_buffers(source.resolution).0;
        self.source = Some(source);
        self.apply_config();
        self.camera.sync(&source, buffers.outline);

        self.active = true;
        log::debug!("Outline compositor active at {}", source.resolution);
        Ok(())
    }

    /// Pre-render phase: mirror the source camera and draw every tagged object
    /// into the outline buffer.
    pub fn on_frame_begin<C: CameraProvider + ?Sized>(
        &mut self,
        registry: &TagRegistry,
        cameras: &C,
    ) -> OutlineResult<FrameReport> {
        profiling::scope!("OutlineCompositor::on_frame_begin");

        if !self.active {
            return Err(OutlineError::Inactive);
        }

        let source = self.resolve_source(cameras)?;
        let (buffers, resized) = self.ensure_buffers(source.resolution);
        self.source = Some(source);
        self.apply_config();
        self.camera.sync(&source, buffers.outline);

        let stats = self.dispatcher.dispatch(
            &mut self.backend,
            &mut self.materials,
            &registry.all(),
            source.culling_mask,
            self.config.cull_mode(),
        )?;
        self.backend.render_camera(self.camera.state(), self.dispatcher.commands())?;

        Ok(FrameReport {
            resolution: buffers.resolution,
            resized,
            drawn_objects: stats.drawn_objects,
            draws: stats.draws,
            culled: stats.culled,
            skipped: stats.skipped,
        })
    }

    /// Composition phase: blend outlines onto `source`, writing `destination`.
    pub fn on_composite(&mut self, source: RenderTargetHandle, destination: RenderTargetHandle) -> OutlineResult<()> {
        profiling::scope!("OutlineCompositor::on_composite");

        if !self.active {
            return Err(OutlineError::Inactive);
        }
        let buffers = self.buffers.ok_or(OutlineError::Inactive)?;
        self.apply_config();

        let outline = if self.config.add_lines_between_colors {
            self.backend
                .blit(CompositePass::SeparateColors, source, buffers.outline, buffers.extra)?;
            buffers.extra
        } else {
            buffers.outline
        };
        self.backend
            .blit(CompositePass::Composite, source, outline, destination)
    }

    /// Push the config into the shader uniforms. Out of range values are
    /// clamped first.
    pub fn apply_config(&mut self) {
        profiling::scope!("OutlineCompositor::apply_config");

        if self.config.clamp_to_ranges() {
            log::warn!("Outline config had out of range values, clamped to {:?}", self.config);
        }
        let Some(source) = self.source else {
            return;
        };
        self.uniforms = OutlineUniforms::new(&self.config, &source);
        self.backend.write_uniforms(&self.uniforms);
    }

    /// Destroy all texture keyed materials, for hosts that swap texture sets.
    pub fn clear_material_cache(&mut self) {
        self.materials.clear(&mut self.backend);
    }

    /// Release every material and render target. Safe to call repeatedly.
    pub fn on_teardown(&mut self) {
        profiling::scope!("OutlineCompositor::on_teardown");

        if self.active {
            log::debug!("Outline compositor torn down");
        }
        self.release_resources();
    }

    fn release_resources(&mut self) {
        self.materials.teardown(&mut self.backend);
        if let Some(buffers) = self.buffers.take() {
            self.backend.release_render_target(buffers.outline);
            self.backend.release_render_target(buffers.extra);
        }
        self.camera.detach();
        self.source = None;
        self.active = false;
    }

    fn resolve_source<C: CameraProvider + ?Sized>(&self, cameras: &C) -> OutlineResult<SourceCamera> {
        match self.config.source_camera.or(self.attached_camera) {
            Some(handle) => cameras.camera(handle).ok_or(OutlineError::UnknownCamera(handle)),
            None => cameras.default_camera().ok_or(OutlineError::NoSourceCamera),
        }
    }

    /// Make the buffers match `resolution`, returning them and whether they were
    /// reallocated.
    fn ensure_buffers(&mut self, resolution: UVec2) -> (OutlineBuffers, bool) {
        let resolution = resolution.max(UVec2::ONE);

        if let Some(buffers) = self.buffers {
            let current = self.backend.render_target_resolution(buffers.outline);
            if buffers.resolution == resolution && current == Some(resolution) {
                return (buffers, false);
            }
            log::debug!("Outline buffers resized from {} to {}", buffers.resolution, resolution);
            self.backend.release_render_target(buffers.outline);
            self.backend.release_render_target(buffers.extra);
        }

        let outline = self.backend.create_render_target(&RenderTargetDescriptor {
            label: "outline buffer".into(),
            resolution,
        });
        let extra = self.backend.create_render_target(&RenderTargetDescriptor {
            label: "outline separation buffer".into(),
            resolution,
        });
        let buffers = OutlineBuffers {
            outline,
            extra,
            resolution,
        };
        self.buffers = Some(buffers);
        (buffers, true)
    }
}

impl<B: OutlineBackend> Drop for OutlineCompositor<B> {
    fn drop(&mut self) {
        self.on_teardown();
    }
}
