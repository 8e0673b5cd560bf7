use std::num::NonZeroU64;

use silhouette::OutlineUniforms;
use wgpu::{
    BindGroupLayout, BindingType, BufferBindingType, Device, SamplerBindingType, ShaderStages, TextureSampleType,
    TextureViewDimension,
};

use crate::bind::BindGroupLayoutBuilder;

/// Bind group layouts shared by the outline pipelines.
pub struct ShaderInterfaces {
    /// Uniforms, per-object data and joint deltas of a camera render.
    pub draw_bgl: BindGroupLayout,
    /// Base texture and sampler of a draw material.
    pub material_bgl: BindGroupLayout,
    /// Uniforms, source frame and outline buffer of a composite pass.
    pub composite_bgl: BindGroupLayout,
}

impl ShaderInterfaces {
    pub fn new(device: &Device) -> Self {
        profiling::scope!("ShaderInterfaces::new");

        let uniform = BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<OutlineUniforms>() as u64),
        };
        let storage = BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        };

        let draw_bgl = BindGroupLayoutBuilder::new()
            .append(ShaderStages::VERTEX_FRAGMENT, uniform)
            .append(ShaderStages::VERTEX_FRAGMENT, storage)
            .append(ShaderStages::VERTEX, storage)
            .build(device, Some("outline draw bgl"));

        let material_bgl = BindGroupLayoutBuilder::new()
            .append(
                ShaderStages::FRAGMENT,
                BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
            )
            .append(ShaderStages::FRAGMENT, BindingType::Sampler(SamplerBindingType::Filtering))
            .build(device, Some("outline material bgl"));

        // Composite passes only ever textureLoad, so any float format works.
        let loaded_texture = BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: false },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        };
        let composite_bgl = BindGroupLayoutBuilder::new()
            .append(ShaderStages::FRAGMENT, uniform)
            .append(ShaderStages::FRAGMENT, loaded_texture)
            .append(ShaderStages::FRAGMENT, loaded_texture)
            .build(device, Some("outline composite bgl"));

        Self {
            draw_bgl,
            material_bgl,
            composite_bgl,
        }
    }
}
