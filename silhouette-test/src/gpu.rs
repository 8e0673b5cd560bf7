use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use glam::{Mat4, UVec2, Vec4};
use silhouette::{
    compose::ColorImage,
    types::{
        Camera, CameraProjection, ColorGroup, Mesh, MeshBuilder, MeshKind, OutlineConfig, Skeleton, SourceCamera,
        SurfaceMaterial, Texture,
    },
    CameraSet, ObjectRenderable, OutlineCompositor, OutlineUniforms, SoftwareBackend, TagRegistry, TaggedObject,
};
use silhouette_routine::{ShaderLibrary, WgpuBackend, OUTLINE_FORMAT};
use wgpu::{DeviceDescriptor, DownlevelFlags, Instance, InstanceDescriptor, RequestAdapterOptions};

use crate::{
    helpers::{pixel_rect_transform, QUAD_INDICES, QUAD_POSITIONS, QUAD_TEXTURE_COORDINATES},
    runner::SOURCE_COLOR,
};

/// A tagged quad covering the pixels `min..max`, rendered the same way by the
/// gpu and software backends.
#[derive(Debug, Clone)]
pub struct SceneQuad {
    pub min: UVec2,
    pub max: UVec2,
    pub group: ColorGroup,
    pub erase: bool,
    /// Alpha tested base texture.
    pub texture: Option<Texture>,
    /// Skins the quad: the left edge follows joint 0, the right edge joint 1.
    pub skeleton: Option<Skeleton>,
}

impl SceneQuad {
    pub fn new(min: UVec2, max: UVec2, group: ColorGroup) -> Self {
        Self {
            min,
            max,
            group,
            erase: false,
            texture: None,
            skeleton: None,
        }
    }

    pub fn erase(mut self) -> Self {
        self.erase = true;
        self
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeleton = Some(skeleton);
        self
    }
}

/// Results of one frame rendered on the gpu, with the software backend's
/// outline buffer for the same scene.
pub struct GpuFrame {
    /// The host frame as the gpu saw it, after 8 bit quantization.
    pub source: ColorImage,
    pub outline: ColorImage,
    /// Separation buffer. Only written when lines between colors are enabled.
    pub extra: ColorImage,
    pub image: ColorImage,
    pub uniforms: OutlineUniforms,
    pub software_outline: ColorImage,
}

/// Quad whose left vertices are bound to joint 0 and right vertices to joint 1.
fn split_quad() -> Result<Mesh> {
    Ok(MeshBuilder::new(QUAD_POSITIONS.to_vec())
        .with_vertex_texture_coordinates(QUAD_TEXTURE_COORDINATES.to_vec())
        .with_vertex_joint_indices(vec![[0; 4], [0; 4], [1, 0, 0, 0], [1, 0, 0, 0]])
        .with_vertex_joint_weights(vec![Vec4::X; 4])
        .with_indices(QUAD_INDICES.to_vec())
        .build()?)
}

fn scene_cameras(size: UVec2) -> CameraSet {
    let mut cameras = CameraSet::new();
    cameras.add(SourceCamera::new(
        Camera {
            projection: CameraProjection::Raw(Mat4::IDENTITY),
            view: Mat4::IDENTITY,
        },
        size,
    ));
    cameras
}

fn tag(registry: &mut TagRegistry, quad: &SceneQuad, mesh: MeshKind, surface: SurfaceMaterial, size: UVec2) {
    let renderable =
        ObjectRenderable::new(mesh, 1, [surface]).with_transform(pixel_rect_transform(quad.min, quad.max, size));
    registry.register(Arc::new(
        TaggedObject::new(Arc::new(renderable), quad.group).with_erase(quad.erase),
    ));
}

fn software_outline(size: UVec2, config: &OutlineConfig, quads: &[SceneQuad]) -> Result<ColorImage> {
    let cameras = scene_cameras(size);
    let mut compositor = OutlineCompositor::new(SoftwareBackend::new(), config.clone());
    compositor.on_activate(&cameras)?;

    let backend = compositor.backend_mut();
    let mesh = backend.add_mesh(split_quad()?)?;
    let mut registry = TagRegistry::new();
    for quad in quads {
        let surface = match &quad.texture {
            Some(texture) => SurfaceMaterial::textured(backend.add_texture(texture.clone())),
            None => SurfaceMaterial::UNTEXTURED,
        };
        let kind = match &quad.skeleton {
            Some(skeleton) => MeshKind::Skinned {
                mesh,
                skeleton: backend.add_skeleton(skeleton.clone()),
            },
            None => MeshKind::Static(mesh),
        };
        tag(&mut registry, quad, kind, surface, size);
    }

    compositor.on_frame_begin(&registry, &cameras)?;
    let buffers = compositor.buffers().context("Compositor has no buffers")?;
    let outline = compositor
        .backend()
        .image(buffers.outline)
        .cloned()
        .context("Outline buffer is not an image")?;
    Ok(outline)
}

/// Owns a wgpu device for tests that render on real hardware.
pub struct GpuTestRunner {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuTestRunner {
    /// Fails when there is no adapter that can run the outline shaders. Use
    /// with [`no_gpu_return!`](crate::no_gpu_return).
    pub async fn new() -> Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let instance = Instance::new(InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .context("No adapter found")?;

        let downlevel = adapter.get_downlevel_capabilities();
        ensure!(
            downlevel.flags.contains(DownlevelFlags::VERTEX_STORAGE),
            "Adapter {:?} can't read storage buffers from vertex shaders",
            adapter.get_info().name
        );

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("silhouette test device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .context("Device creation failed")?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    pub fn backend(&self) -> WgpuBackend {
        WgpuBackend::new(Arc::clone(&self.device), Arc::clone(&self.queue), ShaderLibrary::new())
    }

    /// Render `quads` over a host frame filled with [`SOURCE_COLOR`] on the
    /// gpu and read every buffer back.
    pub async fn render_scene(&self, size: UVec2, config: OutlineConfig, quads: &[SceneQuad]) -> Result<GpuFrame> {
        let software_outline = software_outline(size, &config, quads)?;

        let cameras = scene_cameras(size);
        let mut compositor = OutlineCompositor::new(self.backend(), config);
        compositor.on_activate(&cameras)?;

        let backend = compositor.backend_mut();
        let mesh = backend.add_mesh(&split_quad()?)?;
        let mut registry = TagRegistry::new();
        for quad in quads {
            let surface = match &quad.texture {
                Some(texture) => SurfaceMaterial::textured(backend.add_texture(texture)),
                None => SurfaceMaterial::UNTEXTURED,
            };
            let kind = match &quad.skeleton {
                Some(skeleton) => MeshKind::Skinned {
                    mesh,
                    skeleton: backend.add_skeleton(skeleton.clone()),
                },
                None => MeshKind::Static(mesh),
            };
            tag(&mut registry, quad, kind, surface, size);
        }

        compositor.on_frame_begin(&registry, &cameras)?;

        let backend = compositor.backend_mut();
        let source = backend.create_color_target("host frame", size, OUTLINE_FORMAT);
        let destination = backend.create_color_target("host destination", size, OUTLINE_FORMAT);
        let source_image = ColorImage::filled(size, SOURCE_COLOR);
        backend.write_target(source, &source_image)?;

        compositor.on_composite(source, destination)?;

        let buffers = *compositor.buffers().context("Compositor has no buffers")?;
        let backend = compositor.backend();
        Ok(GpuFrame {
            source: ColorImage::from_rgba8(size, &source_image.to_rgba8()).context("Bad source image")?,
            outline: backend.read_target(buffers.outline).await?,
            extra: backend.read_target(buffers.extra).await?,
            image: backend.read_target(destination).await?,
            uniforms: *compositor.uniforms(),
            software_outline,
        })
    }
}
