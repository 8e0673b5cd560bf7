#![warn(unsafe_op_in_unsafe_fn)]

//! Selection outlines for real-time renderers.
//!
//! Tagged objects are drawn by an off-screen camera into an outline buffer
//! that encodes each object's color group. A full-screen composite then
//! detects the edges of those regions and blends colored lines and an optional
//! fill onto the host's frame.
//!
//! The host provides an [`OutlineBackend`]. [`SoftwareBackend`] renders on the
//! CPU and doubles as the reference for the shader contract; the
//! `silhouette-routine` crate provides a wgpu backend.

pub mod backend;
mod camera;
pub mod compose;
mod compositor;
mod dispatch;
mod error;
mod material;
mod pulse;
pub mod registry;
mod uniforms;
pub mod util;

pub use backend::{
    CompositePass, DrawCommand, DrawMaterialDescriptor, OutlineBackend, RenderTargetDescriptor, SoftwareBackend,
    OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER,
};
pub use camera::*;
pub use compositor::*;
pub use dispatch::*;
pub use error::*;
pub use material::*;
pub use pulse::*;
pub use registry::{ObjectId, ObjectRenderable, Renderable, SurfaceList, TagRegistry, TagSnapshot, TaggedObject};
pub use uniforms::*;

/// Reexport of the types crate.
pub use silhouette_types as types;
