use std::{borrow::Cow, sync::Arc};

use glam::{Mat4, UVec2, Vec4};
use silhouette::{
    compose::ColorImage,
    types::{
        CullMode, Handedness, MaterialHandle, Mesh, MeshHandle, RenderTargetHandle, Skeleton, SkeletonHandle, Texture,
        TextureHandle,
    },
    util::{
        freelist::{FreelistIndex, FreelistVec},
        typedefs::FastHashMap,
    },
    CompositePass, DrawCommand, DrawMaterialDescriptor, OutlineBackend, OutlineCameraState, OutlineError,
    OutlineResult, OutlineUniforms, RenderTargetDescriptor, OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER,
};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    AddressMode, BindGroup, Buffer, BufferDescriptor, BufferUsages, Color, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompareFunction, DepthBiasState, DepthStencilState, Device, Extent3d, Face, FilterMode,
    FragmentState, FrontFace, ImageCopyBuffer, ImageDataLayout, IndexFormat, LoadOp, Maintain, MapMode,
    MultisampleState, Operations, PipelineLayout, PipelineLayoutDescriptor, PolygonMode, PrimitiveState,
    PrimitiveTopology, Queue, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, Sampler, SamplerDescriptor, ShaderModule, ShaderModuleDescriptor,
    ShaderSource, StencilState, StoreOp, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureView, TextureViewDescriptor, VertexState,
};

use crate::{bind::BindGroupBuilder, interfaces::ShaderInterfaces, mesh::GpuMesh, shaders::ShaderLibrary};

/// Format of the targets the backend creates itself.
pub const OUTLINE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const OUTLINE_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Per-draw data read by `outline_buffer.wgsl`. Must match `ObjectData`.
#[derive(Debug, Copy, Clone)]
#[repr(C, align(16))]
struct GpuObject {
    model_view_proj: Mat4,
    color: Vec4,
    joint_offset: u32,
    joint_count: u32,
    skinned: u32,
    _padding: u32,
}

unsafe impl bytemuck::Zeroable for GpuObject {}
unsafe impl bytemuck::Pod for GpuObject {}

struct GpuTarget {
    label: String,
    /// Absent for views imported from the host.
    texture: Option<wgpu::Texture>,
    view: TextureView,
    depth: Option<TextureView>,
    format: TextureFormat,
    size: UVec2,
}

struct GpuMaterial {
    desc: DrawMaterialDescriptor,
    bind_group: BindGroup,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: TextureView,
}

/// Everything that exists once the shaders have been compiled.
struct Pipelines {
    buffer: FastHashMap<(CullMode, Handedness), RenderPipeline>,
    composite_module: ShaderModule,
    composite_layout: PipelineLayout,
    composite: FastHashMap<(CompositePass, TextureFormat), RenderPipeline>,
}

/// [`OutlineBackend`] drawing with wgpu.
///
/// Owns gpu copies of the meshes, textures and skeletons the host registers
/// with it. Host frames come in either as views imported with
/// [`WgpuBackend::import_view`] or as targets created and written through the
/// backend.
pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    library: ShaderLibrary,
    interfaces: ShaderInterfaces,

    uniform_buffer: Buffer,
    uniforms: OutlineUniforms,
    sampler: Sampler,
    white: GpuTexture,

    pipelines: Option<Pipelines>,

    targets: FreelistVec<GpuTarget>,
    materials: FreelistVec<GpuMaterial>,
    meshes: FreelistVec<GpuMesh>,
    textures: FreelistVec<GpuTexture>,
    skeletons: FreelistVec<Skeleton>,
}

impl WgpuBackend {
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, library: ShaderLibrary) -> Self {
        profiling::scope!("WgpuBackend::new");

        let interfaces = ShaderInterfaces::new(&device);

        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("outline uniforms"),
            size: std::mem::size_of::<OutlineUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("outline nearest sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            ..SamplerDescriptor::default()
        });

        // Untextured materials sample this, so they always pass the alpha test.
        let white = upload_texture(
            &device,
            &queue,
            &Texture {
                label: Some("outline white".to_owned()),
                size: UVec2::ONE,
                data: vec![255; 4],
            },
        );

        Self {
            device,
            queue,
            library,
            interfaces,
            uniform_buffer,
            uniforms: OutlineUniforms::default(),
            sampler,
            white,
            pipelines: None,
            targets: FreelistVec::new(),
            materials: FreelistVec::new(),
            meshes: FreelistVec::new(),
            textures: FreelistVec::new(),
            skeletons: FreelistVec::new(),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Edit the shader sources. Pipelines are rebuilt from the edited library
    /// on the next draw or blit.
    pub fn library_mut(&mut self) -> &mut ShaderLibrary {
        self.pipelines = None;
        &mut self.library
    }

    pub fn add_mesh(&mut self, mesh: &Mesh) -> OutlineResult<MeshHandle> {
        mesh.validate()?;
        let gpu = GpuMesh::upload(&self.device, mesh);
        Ok(MeshHandle::new(self.meshes.push(gpu).0))
    }

    pub fn remove_mesh(&mut self, handle: MeshHandle) {
        self.meshes.remove(FreelistIndex(handle.idx));
    }

    pub fn add_texture(&mut self, texture: &Texture) -> TextureHandle {
        let gpu = upload_texture(&self.device, &self.queue, texture);
        TextureHandle::new(self.textures.push(gpu).0)
    }

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonHandle {
        SkeletonHandle::new(self.skeletons.push(skeleton).0)
    }

    /// Replace the pose of a skeleton. Returns false for unknown handles.
    pub fn set_skeleton(&mut self, handle: SkeletonHandle, skeleton: Skeleton) -> bool {
        match self.skeletons.get_mut(FreelistIndex(handle.idx)) {
            Some(slot) => {
                *slot = skeleton;
                true
            }
            None => false,
        }
    }

    /// Use a host texture view as a render target. The view must be renderable
    /// when used as a destination and bindable when used as a source. Imported
    /// targets can not be read back or written; both return
    /// [`OutlineError::ImportedTarget`].
    pub fn import_view(
        &mut self,
        label: &str,
        view: TextureView,
        format: TextureFormat,
        size: UVec2,
    ) -> RenderTargetHandle {
        let index = self.targets.push(GpuTarget {
            label: label.to_owned(),
            texture: None,
            view,
            depth: None,
            format,
            size,
        });
        RenderTargetHandle::new(index.0)
    }

    /// Create a color target owned by the backend that the host renders its
    /// frame into, or composites onto.
    pub fn create_color_target(&mut self, label: &str, size: UVec2, format: TextureFormat) -> RenderTargetHandle {
        let target = create_target(&self.device, label, size, format, false);
        RenderTargetHandle::new(self.targets.push(target).0)
    }

    pub fn target_view(&self, target: RenderTargetHandle) -> Option<&TextureView> {
        Some(&self.targets.get(FreelistIndex(target.idx))?.view)
    }

    pub fn target_label(&self, target: RenderTargetHandle) -> Option<&str> {
        Some(&self.targets.get(FreelistIndex(target.idx))?.label)
    }

    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn material(&self, material: MaterialHandle) -> Option<&DrawMaterialDescriptor> {
        Some(&self.materials.get(FreelistIndex(material.idx))?.desc)
    }

    /// Upload an image into an owned rgba8 target.
    pub fn write_target(&self, target: RenderTargetHandle, image: &ColorImage) -> OutlineResult<()> {
        let gpu = self
            .targets
            .get(FreelistIndex(target.idx))
            .ok_or(OutlineError::UnknownRenderTarget(target))?;
        let texture = gpu.texture.as_ref().ok_or(OutlineError::ImportedTarget(target))?;
        let size = gpu.size.min(image.size());

        self.queue.write_texture(
            texture.as_image_copy(),
            &image.to_rgba8(),
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.size().x * 4),
                rows_per_image: None,
            },
            extent(size),
        );
        Ok(())
    }

    /// Copy an owned rgba8 target back to the cpu.
    pub async fn read_target(&self, target: RenderTargetHandle) -> OutlineResult<ColorImage> {
        profiling::scope!("WgpuBackend::read_target");

        let gpu = self
            .targets
            .get(FreelistIndex(target.idx))
            .ok_or(OutlineError::UnknownRenderTarget(target))?;
        let texture = gpu.texture.as_ref().ok_or(OutlineError::ImportedTarget(target))?;

        let unpadded = gpu.size.x * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = (unpadded + align - 1) / align * align;

        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("outline readback buffer"),
            size: padded as u64 * gpu.size.y as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("outline readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            ImageCopyBuffer {
                buffer: &buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: None,
                },
            },
            extent(gpu.size),
        );
        let submit_index = self.queue.submit(Some(encoder.finish()));

        let (sender, receiver) = flume::bounded(1);
        buffer.slice(..).map_async(MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(Maintain::WaitForSubmissionIndex(submit_index));

        match receiver.recv_async().await {
            Ok(Ok(())) => {}
            _ => return Err(OutlineError::ReadbackFailed(target)),
        }

        let data: Vec<u8> = {
            let mapping = buffer.slice(..).get_mapped_range();
            mapping
                .chunks_exact(padded as usize)
                .flat_map(|row| &row[..unpadded as usize])
                .copied()
                .collect()
        };
        buffer.unmap();

        ColorImage::from_rgba8(gpu.size, &data).ok_or(OutlineError::ReadbackFailed(target))
    }

    fn compile(&self) -> OutlineResult<Pipelines> {
        profiling::scope!("WgpuBackend::compile");

        let buffer_source = self.library.get(OUTLINE_BUFFER_SHADER)?;
        let composite_source = self.library.get(OUTLINE_COMPOSITE_SHADER)?;

        let buffer_module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(OUTLINE_BUFFER_SHADER),
            source: ShaderSource::Wgsl(Cow::Borrowed(buffer_source)),
        });
        let composite_module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(OUTLINE_COMPOSITE_SHADER),
            source: ShaderSource::Wgsl(Cow::Borrowed(composite_source)),
        });

        let buffer_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("outline buffer pll"),
            bind_group_layouts: &[&self.interfaces.draw_bgl, &self.interfaces.material_bgl],
            push_constant_ranges: &[],
        });
        let composite_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("outline composite pll"),
            bind_group_layouts: &[&self.interfaces.composite_bgl],
            push_constant_ranges: &[],
        });

        let mut buffer = FastHashMap::default();
        for cull_mode in [CullMode::Back, CullMode::Off] {
            for handedness in [Handedness::Left, Handedness::Right] {
                let pipeline = build_buffer_pipeline(&self.device, &buffer_layout, &buffer_module, cull_mode, handedness);
                buffer.insert((cull_mode, handedness), pipeline);
            }
        }

        Ok(Pipelines {
            buffer,
            composite_module,
            composite_layout,
            composite: FastHashMap::default(),
        })
    }
}

impl OutlineBackend for WgpuBackend {
    fn prepare(&mut self) -> OutlineResult<()> {
        if self.pipelines.is_none() {
            self.pipelines = Some(self.compile()?);
        }
        Ok(())
    }

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> RenderTargetHandle {
        let target = create_target(&self.device, &desc.label, desc.resolution, OUTLINE_FORMAT, true);
        RenderTargetHandle::new(self.targets.push(target).0)
    }

    fn release_render_target(&mut self, target: RenderTargetHandle) {
        if self.targets.remove(FreelistIndex(target.idx)).is_none() {
            log::warn!("Released unknown render target {:?}", target);
        }
    }

    fn render_target_resolution(&self, target: RenderTargetHandle) -> Option<UVec2> {
        Some(self.targets.get(FreelistIndex(target.idx))?.size)
    }

    fn create_draw_material(&mut self, desc: &DrawMaterialDescriptor) -> OutlineResult<MaterialHandle> {
        self.library.get(OUTLINE_BUFFER_SHADER)?;

        let view = match desc.base_texture {
            Some(texture) => match self.textures.get(FreelistIndex(texture.idx)) {
                Some(gpu) => &gpu.view,
                None => {
                    log::warn!("Draw material references unknown texture {:?}, drawing untextured", texture);
                    &self.white.view
                }
            },
            None => &self.white.view,
        };

        let bind_group = BindGroupBuilder::new()
            .append_texture_view(view)
            .append_sampler(&self.sampler)
            .build(&self.device, Some("outline material bg"), &self.interfaces.material_bgl);

        let index = self.materials.push(GpuMaterial { desc: *desc, bind_group });
        Ok(MaterialHandle::new(index.0))
    }

    fn set_material_cull_mode(&mut self, material: MaterialHandle, cull_mode: CullMode) {
        if let Some(gpu) = self.materials.get_mut(FreelistIndex(material.idx)) {
            gpu.desc.cull_mode = cull_mode;
        }
    }

    fn destroy_draw_material(&mut self, material: MaterialHandle) {
        self.materials.remove(FreelistIndex(material.idx));
    }

    fn write_uniforms(&mut self, uniforms: &OutlineUniforms) {
        self.uniforms = *uniforms;
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn render_camera(&mut self, camera: &OutlineCameraState, draws: &[DrawCommand]) -> OutlineResult<()> {
        profiling::scope!("WgpuBackend::render_camera");

        // Editing the shader library drops the pipelines; rebuild them here.
        self.prepare()?;
        let pipelines = self.pipelines.as_ref().ok_or(OutlineError::Inactive)?;
        let handle = camera.target.ok_or(OutlineError::Inactive)?;
        let target = self
            .targets
            .get(FreelistIndex(handle.idx))
            .ok_or(OutlineError::UnknownRenderTarget(handle))?;

        // Slot zero keeps the joint buffer non-empty.
        let mut joints = vec![Mat4::IDENTITY];
        let mut objects = Vec::with_capacity(draws.len());
        let mut resolved = Vec::with_capacity(draws.len());
        for draw in draws {
            let Some(material) = self.materials.get(FreelistIndex(draw.material.idx)) else {
                log::warn!("Skipping draw with unknown material {:?}", draw.material);
                continue;
            };
            let Some(mesh) = self.meshes.get(FreelistIndex(draw.mesh.mesh().idx)) else {
                log::warn!("Skipping draw with unknown mesh {:?}", draw.mesh.mesh());
                continue;
            };
            let Some(range) = mesh.submeshes.get(draw.submesh as usize) else {
                continue;
            };

            let skeleton = draw
                .mesh
                .skeleton()
                .and_then(|handle| self.skeletons.get(FreelistIndex(handle.idx)));
            let (joint_offset, joint_count) = match skeleton {
                Some(skeleton) => {
                    let offset = joints.len() as u32;
                    joints.extend_from_slice(&skeleton.joint_deltas);
                    (offset, skeleton.joint_deltas.len() as u32)
                }
                None => (0, 0),
            };

            let instance = objects.len() as u32;
            objects.push(GpuObject {
                model_view_proj: camera.view_proj * draw.transform,
                color: draw.channel.buffer_color(),
                joint_offset,
                joint_count,
                skinned: skeleton.is_some() as u32,
                _padding: 0,
            });
            resolved.push((instance, mesh, range.clone(), material));
        }

        if objects.is_empty() {
            objects.push(bytemuck::Zeroable::zeroed());
        }

        let object_buffer = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("outline objects"),
            contents: bytemuck::cast_slice(&objects),
            usage: BufferUsages::STORAGE,
        });
        let joint_buffer = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("outline joints"),
            contents: bytemuck::cast_slice(&joints),
            usage: BufferUsages::STORAGE,
        });
        let draw_bg = BindGroupBuilder::new()
            .append_buffer(&self.uniform_buffer)
            .append_buffer(&object_buffer)
            .append_buffer(&joint_buffer)
            .build(&self.device, Some("outline draw bg"), &self.interfaces.draw_bgl);

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("outline buffer encoder"),
        });
        {
            let clear = camera.clear_color.as_dvec4();
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("outline buffer"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: clear.x,
                            g: clear.y,
                            b: clear.z,
                            a: clear.w,
                        }),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.as_ref().map(|view| RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(camera.clear_depth),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_bind_group(0, &draw_bg, &[]);
            for (instance, mesh, range, material) in &resolved {
                let Some(pipeline) = pipelines.buffer.get(&(material.desc.cull_mode, camera.handedness)) else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &material.bind_group, &[]);
                rpass.set_vertex_buffer(0, mesh.positions.slice(..));
                rpass.set_vertex_buffer(1, mesh.coordinates.slice(..));
                rpass.set_vertex_buffer(2, mesh.joint_indices.slice(..));
                rpass.set_vertex_buffer(3, mesh.joint_weights.slice(..));
                rpass.set_index_buffer(mesh.indices.slice(..), IndexFormat::Uint32);
                rpass.draw_indexed(range.clone(), 0, *instance..*instance + 1);
            }
        }
        self.queue.submit(Some(encoder.finish()));

        Ok(())
    }

    fn blit(
        &mut self,
        pass: CompositePass,
        source: RenderTargetHandle,
        outline: RenderTargetHandle,
        destination: RenderTargetHandle,
    ) -> OutlineResult<()> {
        profiling::scope!("WgpuBackend::blit");

        self.prepare()?;

        let format = self
            .targets
            .get(FreelistIndex(destination.idx))
            .ok_or(OutlineError::UnknownRenderTarget(destination))?
            .format;

        let pipelines = self.pipelines.as_mut().ok_or(OutlineError::Inactive)?;
        if !pipelines.composite.contains_key(&(pass, format)) {
            let pipeline = build_composite_pipeline(
                &self.device,
                &pipelines.composite_layout,
                &pipelines.composite_module,
                pass,
                format,
            );
            pipelines.composite.insert((pass, format), pipeline);
        }
        let Some(pipeline) = pipelines.composite.get(&(pass, format)) else {
            return Err(OutlineError::Inactive);
        };

        let view = |handle: RenderTargetHandle| {
            self.targets
                .get(FreelistIndex(handle.idx))
                .map(|target| &target.view)
                .ok_or(OutlineError::UnknownRenderTarget(handle))
        };
        let source_view = view(source)?;
        let outline_view = view(outline)?;
        let destination_view = view(destination)?;

        let composite_bg = BindGroupBuilder::new()
            .append_buffer(&self.uniform_buffer)
            .append_texture_view(source_view)
            .append_texture_view(outline_view)
            .build(&self.device, Some("outline composite bg"), &self.interfaces.composite_bgl);

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("outline composite encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("outline composite"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: destination_view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &composite_bg, &[]);
            rpass.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));

        Ok(())
    }
}

fn extent(size: UVec2) -> Extent3d {
    Extent3d {
        width: size.x,
        height: size.y,
        depth_or_array_layers: 1,
    }
}

fn create_target(device: &Device, label: &str, size: UVec2, format: TextureFormat, depth: bool) -> GpuTarget {
    let size = size.max(UVec2::ONE);
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: extent(size),
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage: TextureUsages::RENDER_ATTACHMENT
            | TextureUsages::TEXTURE_BINDING
            | TextureUsages::COPY_SRC
            | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&TextureViewDescriptor::default());

    let depth = depth.then(|| {
        device
            .create_texture(&TextureDescriptor {
                label: Some(label),
                size: extent(size),
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: OUTLINE_DEPTH_FORMAT,
                usage: TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&TextureViewDescriptor::default())
    });

    GpuTarget {
        label: label.to_owned(),
        texture: Some(texture),
        view,
        depth,
        format,
        size,
    }
}

fn upload_texture(device: &Device, queue: &Queue, texture: &Texture) -> GpuTexture {
    profiling::scope!("upload_texture");

    let size = texture.size.max(UVec2::ONE);
    let gpu = device.create_texture_with_data(
        queue,
        &TextureDescriptor {
            label: texture.label.as_deref(),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &padded_texels(texture, size),
    );
    let view = gpu.create_view(&TextureViewDescriptor::default());
    GpuTexture { _texture: gpu, view }
}

/// Texel data sized exactly for `size`; missing texels are transparent.
fn padded_texels(texture: &Texture, size: UVec2) -> Vec<u8> {
    let mut data = texture.data.clone();
    data.resize(size.x as usize * size.y as usize * 4, 0);
    data
}

fn build_buffer_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    module: &ShaderModule,
    cull_mode: CullMode,
    handedness: Handedness,
) -> RenderPipeline {
    profiling::scope!("build_buffer_pipeline");

    let front_face = match handedness {
        Handedness::Left => FrontFace::Cw,
        Handedness::Right => FrontFace::Ccw,
    };
    let cull_mode = match cull_mode {
        CullMode::Back => Some(Face::Back),
        CullMode::Off => None,
    };

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("outline buffer pipeline"),
        layout: Some(layout),
        vertex: VertexState {
            module,
            entry_point: "vs_main",
            buffers: &crate::mesh::VERTEX_BUFFER_LAYOUTS,
        },
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face,
            cull_mode,
            unclipped_depth: false,
            polygon_mode: PolygonMode::Fill,
            conservative: false,
        },
        // Outlines show through occluders, so depth is neither tested nor written.
        depth_stencil: Some(DepthStencilState {
            format: OUTLINE_DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        fragment: Some(FragmentState {
            module,
            entry_point: "fs_main",
            targets: &[Some(ColorTargetState {
                format: OUTLINE_FORMAT,
                blend: None,
                write_mask: ColorWrites::all(),
            })],
        }),
        multiview: None,
    })
}

fn build_composite_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    module: &ShaderModule,
    pass: CompositePass,
    format: TextureFormat,
) -> RenderPipeline {
    profiling::scope!("build_composite_pipeline");

    let (label, entry_point) = match pass {
        CompositePass::SeparateColors => ("outline separate colors pipeline", "fs_separate_colors"),
        CompositePass::Composite => ("outline composite pipeline", "fs_composite"),
    };

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: VertexState {
            module,
            entry_point: "vs_fullscreen",
            buffers: &[],
        },
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Cw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: MultisampleState::default(),
        fragment: Some(FragmentState {
            module,
            entry_point,
            targets: &[Some(ColorTargetState {
                format,
                blend: None,
                write_mask: ColorWrites::all(),
            })],
        }),
        multiview: None,
    })
}
