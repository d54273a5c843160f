//! Service error taxonomy
//!
//! Every storage, provisioning, and runtime fault is wrapped into one of
//! these variants with enough context to reconstruct the failing operation
//! without digging through logs.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A remote transfer (download or upload) failed.
    #[error("download error: {message} (key: {remote_key})")]
    Download { message: String, remote_key: String },

    /// An object listing failed.
    #[error("list error: {message} (bucket: {bucket}, prefix: {prefix})")]
    List {
        message: String,
        bucket: String,
        prefix: String,
    },

    /// A local file was missing before an upload was attempted.
    #[error("local file not found: {0}")]
    NotFound(PathBuf),

    /// No matching artifact, or the artifact failed extension validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Inference was attempted before a successful load.
    #[error("model is not loaded")]
    NotLoaded,

    /// Device-level load failure.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The model computation raised during inference.
    #[error("inference error: {0}")]
    Inference(String),
}

impl Error {
    /// Short machine-readable code used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Download { .. } => "DOWNLOAD_ERROR",
            Error::List { .. } => "LIST_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotLoaded => "NOT_LOADED",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Inference(_) => "INFERENCE_ERROR",
        }
    }
}
