//! Artifact provisioning module

pub mod provisioner;

pub use provisioner::{ArtifactHandle, ArtifactLocation, ArtifactProvisioner, MODEL_EXTENSIONS};
