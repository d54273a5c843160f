//! Model runtime module
//!
//! Provides per-model runtimes with:
//! - S3-provisioned, versioned checkpoints
//! - A bounded concurrency gate per model instance
//! - Blocking-pool dispatch for device-bound computation

pub mod encoder;
pub mod gate;
pub mod landmark;
pub mod runtime;
pub mod variant;

pub use encoder::FrameEncoder;
pub use gate::ConcurrencyGate;
pub use landmark::{FaceRegion, LandmarkExtractor};
pub use runtime::{ModelDescriptor, ModelRuntime, RuntimeStatus, VersionSelector};
pub use variant::ModelVariant;
