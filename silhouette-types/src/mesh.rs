use std::ops::Range;

use glam::{Vec2, Vec3, Vec4};
use thiserror::Error;

/// The maximum amount of vertices any one mesh can have.
pub const MAX_VERTEX_COUNT: u32 = (1 << 24) - 1;
/// The maximum amount of indices any one mesh can have.
pub const MAX_INDEX_COUNT: u32 = u32::MAX;

/// Error returned from mesh validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshValidationError {
    #[error("Mesh's {attribute} buffer has {actual} vertices but the position buffer has {expected}")]
    MismatchedVertexCount {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Mesh has {count} vertices when the vertex limit is {MAX_VERTEX_COUNT}")]
    ExceededMaxVertexCount { count: usize },
    #[error("Mesh has {count} indicies when maximum index count is {MAX_INDEX_COUNT}")]
    ExceededMaxIndexCount { count: usize },
    #[error("Mesh has {count} indices which is not a multiple of three. Meshes are always composed of triangles")]
    IndexCountNotMultipleOfThree { count: usize },
    #[error(
        "Index at position {index} has the value {value} which is out of bounds for vertex buffers of {max} length"
    )]
    IndexOutOfBounds { index: usize, value: u32, max: u32 },
    #[error("Submesh {submesh} covers indices {range:?} which is not a triangle range inside {count} indices")]
    InvalidSubmeshRange {
        submesh: usize,
        range: Range<u32>,
        count: usize,
    },
}

/// A mesh that may be used by many objects.
///
/// Meshes are in Structure of Array format and must have all the vertex
/// arrays be the same length. This is enforced by [`MeshBuilder`]. The index
/// buffer is split into one or more sub-surfaces (submeshes).
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertex_positions: Vec<Vec3>,
    pub vertex_texture_coordinates: Vec<Vec2>,
    pub vertex_joint_indices: Vec<[u16; 4]>,
    pub vertex_joint_weights: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Range<u32>>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertex_positions.len()
    }

    pub fn submesh_count(&self) -> u32 {
        self.submeshes.len() as u32
    }

    /// Index slice of the given submesh.
    pub fn submesh_indices(&self, submesh: u32) -> Option<&[u32]> {
        let range = self.submeshes.get(submesh as usize)?;
        self.indices.get(range.start as usize..range.end as usize)
    }

    /// Validates that all vertex attributes have the same length, that all
    /// indices are in bounds and that every submesh is a triangle range inside
    /// the index buffer.
    pub fn validate(&self) -> Result<(), MeshValidationError> {
        let expected = self.vertex_positions.len();

        for (attribute, actual) in [
            ("texture coordinate", self.vertex_texture_coordinates.len()),
            ("joint index", self.vertex_joint_indices.len()),
            ("joint weight", self.vertex_joint_weights.len()),
        ] {
            if actual != expected {
                return Err(MeshValidationError::MismatchedVertexCount {
                    attribute,
                    expected,
                    actual,
                });
            }
        }

        if expected > MAX_VERTEX_COUNT as usize {
            return Err(MeshValidationError::ExceededMaxVertexCount { count: expected });
        }

        let count = self.indices.len();
        if count > MAX_INDEX_COUNT as usize {
            return Err(MeshValidationError::ExceededMaxIndexCount { count });
        }

        if count % 3 != 0 {
            return Err(MeshValidationError::IndexCountNotMultipleOfThree { count });
        }

        if let Some((index, &value)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, value)| **value as usize >= expected)
        {
            return Err(MeshValidationError::IndexOutOfBounds {
                index,
                value,
                max: expected as u32,
            });
        }

        for (submesh, range) in self.submeshes.iter().enumerate() {
            let aligned = range.start % 3 == 0 && range.end % 3 == 0;
            if range.start > range.end || range.end as usize > count || !aligned {
                return Err(MeshValidationError::InvalidSubmeshRange {
                    submesh,
                    range: range.clone(),
                    count,
                });
            }
        }

        Ok(())
    }
}

/// Easy to use builder for a [`Mesh`] that deals with common operations for
/// you.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertex_positions: Vec<Vec3>,
    vertex_texture_coordinates: Option<Vec<Vec2>>,
    vertex_joint_indices: Option<Vec<[u16; 4]>>,
    vertex_joint_weights: Option<Vec<Vec4>>,
    indices: Option<Vec<u32>>,
    submeshes: Option<Vec<Range<u32>>>,
    flip_winding_order: bool,
}

impl MeshBuilder {
    /// Create a new [`MeshBuilder`] with a given set of positions.
    ///
    /// All vertices must have positions.
    pub fn new(vertex_positions: Vec<Vec3>) -> Self {
        Self {
            vertex_positions,
            ..Self::default()
        }
    }

    /// Add the texture coordinates used to sample the base texture.
    pub fn with_vertex_texture_coordinates(mut self, coords: Vec<Vec2>) -> Self {
        self.vertex_texture_coordinates = Some(coords);
        self
    }

    pub fn with_vertex_joint_indices(mut self, joint_indices: Vec<[u16; 4]>) -> Self {
        self.vertex_joint_indices = Some(joint_indices);
        self
    }

    pub fn with_vertex_joint_weights(mut self, joint_weights: Vec<Vec4>) -> Self {
        self.vertex_joint_weights = Some(joint_weights);
        self
    }

    /// Add indices to the given mesh. Without indices every three vertices
    /// form a triangle.
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Split the index buffer into submeshes. Without submeshes the whole index
    /// buffer is a single submesh.
    pub fn with_submeshes(mut self, submeshes: Vec<Range<u32>>) -> Self {
        self.submeshes = Some(submeshes);
        self
    }

    pub fn with_flip_winding_order(mut self) -> Self {
        self.flip_winding_order = true;
        self
    }

    /// Build a mesh, adding whatever components weren't provided.
    ///
    /// Missing texture coordinates are zero, missing skinning data binds every
    /// vertex fully to joint zero.
    pub fn build(self) -> Result<Mesh, MeshValidationError> {
        let vertex_count = self.vertex_positions.len();
        let indices = self.indices.unwrap_or_else(|| (0..vertex_count as u32).collect());
        let submeshes = self.submeshes.unwrap_or_else(|| vec![0..indices.len() as u32]);

        let mut mesh = Mesh {
            vertex_texture_coordinates: self
                .vertex_texture_coordinates
                .unwrap_or_else(|| vec![Vec2::ZERO; vertex_count]),
            vertex_joint_indices: self.vertex_joint_indices.unwrap_or_else(|| vec![[0; 4]; vertex_count]),
            vertex_joint_weights: self.vertex_joint_weights.unwrap_or_else(|| vec![Vec4::X; vertex_count]),
            vertex_positions: self.vertex_positions,
            indices,
            submeshes,
        };

        mesh.validate()?;

        if self.flip_winding_order {
            for triangle in mesh.indices.chunks_exact_mut(3) {
                triangle.swap(1, 2);
            }
        }

        Ok(mesh)
    }
}
