use silhouette_types::{CameraHandle, MeshValidationError, RenderTargetHandle};
use thiserror::Error;

/// Errors surfaced by the outline pipeline.
///
/// Per-object problems are never surfaced here; they are skipped and counted in
/// the frame report instead.
#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("Required shader asset {name:?} is missing")]
    MissingAsset { name: String },
    #[error("No source camera is configured, attached or provided as default")]
    NoSourceCamera,
    #[error("Camera {0:?} is not known to the camera provider")]
    UnknownCamera(CameraHandle),
    #[error("Outline compositor is not active")]
    Inactive,
    #[error("Render target {0:?} is not known to the backend")]
    UnknownRenderTarget(RenderTargetHandle),
    #[error("Render target {0:?} is an imported host view and can not be read or written by the backend")]
    ImportedTarget(RenderTargetHandle),
    #[error("Reading back render target {0:?} failed")]
    ReadbackFailed(RenderTargetHandle),
    #[error("Mesh failed validation")]
    InvalidMesh(#[from] MeshValidationError),
}

pub type OutlineResult<T> = Result<T, OutlineError>;
