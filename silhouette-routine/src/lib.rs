#![warn(unsafe_op_in_unsafe_fn)]

//! wgpu implementation of the silhouette outline backend.
//!
//! [`WgpuBackend`] draws tagged objects into the outline buffer with
//! `outline_buffer.wgsl` and runs both full-screen passes of
//! `outline_composite.wgsl`. Shader sources are embedded in the binary and can
//! be overridden through the [`ShaderLibrary`].

mod backend;
pub mod bind;
mod interfaces;
mod mesh;
mod shaders;

pub use backend::*;
pub use interfaces::ShaderInterfaces;
pub use mesh::{GpuMesh, VERTEX_BUFFER_LAYOUTS};
pub use shaders::ShaderLibrary;
