//! The host renderer capability the compositor drives.

use glam::{Mat4, UVec2};
use silhouette_types::{
    CullMode, MaterialHandle, MeshKind, OutlineChannel, RenderTargetHandle, TextureHandle,
};

use crate::{camera::OutlineCameraState, registry::ObjectId, uniforms::OutlineUniforms, OutlineResult};

mod software;

pub use software::*;

/// Name of the shader asset that draws objects into the outline buffer.
pub const OUTLINE_BUFFER_SHADER: &str = "outline_buffer.wgsl";
/// Name of the shader asset holding both full-screen composite passes.
pub const OUTLINE_COMPOSITE_SHADER: &str = "outline_composite.wgsl";

/// Off-screen color and depth target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub label: String,
    pub resolution: UVec2,
}

/// Material an object is drawn into the outline buffer with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DrawMaterialDescriptor {
    pub channel: OutlineChannel,
    /// Alpha tested against the configured cutoff when set.
    pub base_texture: Option<TextureHandle>,
    pub cull_mode: CullMode,
}

/// One draw of one submesh into the outline buffer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCommand {
    pub object: ObjectId,
    pub mesh: MeshKind,
    pub submesh: u32,
    pub transform: Mat4,
    pub material: MaterialHandle,
    pub channel: OutlineChannel,
}

/// The two full-screen passes of the composite shader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompositePass {
    /// Pass 0: writes separation markers between groups.
    SeparateColors,
    /// Pass 1: edge detection, fill and blending onto the frame.
    Composite,
}

impl CompositePass {
    pub const fn index(self) -> u32 {
        match self {
            Self::SeparateColors => 0,
            Self::Composite => 1,
        }
    }
}

/// Everything the outline pipeline needs from the host renderer.
pub trait OutlineBackend {
    /// Load the shader assets. Fails with `MissingAsset` when either is absent.
    fn prepare(&mut self) -> OutlineResult<()>;

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> RenderTargetHandle;
    fn release_render_target(&mut self, target: RenderTargetHandle);
    fn render_target_resolution(&self, target: RenderTargetHandle) -> Option<UVec2>;

    fn create_draw_material(&mut self, desc: &DrawMaterialDescriptor) -> OutlineResult<MaterialHandle>;
    fn set_material_cull_mode(&mut self, material: MaterialHandle, cull_mode: CullMode);
    fn destroy_draw_material(&mut self, material: MaterialHandle);

    fn write_uniforms(&mut self, uniforms: &OutlineUniforms);

    /// Clear the camera's target and draw `draws` into it, in order. Draws
    /// replace the destination.
    fn render_camera(&mut self, camera: &OutlineCameraState, draws: &[DrawCommand]) -> OutlineResult<()>;

    /// Run one composite pass over every pixel of `destination`.
    fn blit(
        &mut self,
        pass: CompositePass,
        source: RenderTargetHandle,
        outline: RenderTargetHandle,
        destination: RenderTargetHandle,
    ) -> OutlineResult<()>;
}
