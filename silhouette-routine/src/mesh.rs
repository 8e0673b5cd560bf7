use std::ops::Range;

use silhouette::types::Mesh;
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    Buffer, BufferUsages, Device, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
};

/// Vertex streams of the outline buffer shader, one buffer per attribute.
pub const VERTEX_BUFFER_LAYOUTS: [VertexBufferLayout<'static>; 4] = [
    VertexBufferLayout {
        array_stride: 12,
        step_mode: VertexStepMode::Vertex,
        attributes: &[VertexAttribute {
            format: VertexFormat::Float32x3,
            offset: 0,
            shader_location: 0,
        }],
    },
    VertexBufferLayout {
        array_stride: 8,
        step_mode: VertexStepMode::Vertex,
        attributes: &[VertexAttribute {
            format: VertexFormat::Float32x2,
            offset: 0,
            shader_location: 1,
        }],
    },
    VertexBufferLayout {
        array_stride: 8,
        step_mode: VertexStepMode::Vertex,
        attributes: &[VertexAttribute {
            format: VertexFormat::Uint16x4,
            offset: 0,
            shader_location: 2,
        }],
    },
    VertexBufferLayout {
        array_stride: 16,
        step_mode: VertexStepMode::Vertex,
        attributes: &[VertexAttribute {
            format: VertexFormat::Float32x4,
            offset: 0,
            shader_location: 3,
        }],
    },
];

/// A validated mesh uploaded to the gpu.
#[derive(Debug)]
pub struct GpuMesh {
    pub positions: Buffer,
    pub coordinates: Buffer,
    pub joint_indices: Buffer,
    pub joint_weights: Buffer,
    pub indices: Buffer,
    pub submeshes: Vec<Range<u32>>,
}

impl GpuMesh {
    pub fn upload(device: &Device, mesh: &Mesh) -> Self {
        profiling::scope!("GpuMesh::upload");

        let vertex = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: BufferUsages::VERTEX,
            })
        };

        Self {
            positions: vertex("mesh positions", bytemuck::cast_slice(&mesh.vertex_positions)),
            coordinates: vertex("mesh coordinates", bytemuck::cast_slice(&mesh.vertex_texture_coordinates)),
            joint_indices: vertex("mesh joint indices", bytemuck::cast_slice(&mesh.vertex_joint_indices)),
            joint_weights: vertex("mesh joint weights", bytemuck::cast_slice(&mesh.vertex_joint_weights)),
            indices: device.create_buffer_init(&BufferInitDescriptor {
                label: Some("mesh indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: BufferUsages::INDEX,
            }),
            submeshes: mesh.submeshes.clone(),
        }
    }
}
