//! Service layer result types

use std::collections::HashMap;

use crate::engine::FaceRegion;

/// Outcome of an avatar creation call.
#[derive(Debug, Clone)]
pub struct CreateResult {
    pub avatar_id: String,
    /// Remote key of the stored media artifact.
    pub artifact: String,
    /// Face region detected in the uploaded media.
    pub region: FaceRegion,
    pub duration_ms: u64,
}

/// Per-model runtime snapshot.
#[derive(Debug, Clone)]
pub struct ModelStatus {
    pub state: String,
    pub in_flight: usize,
    pub limit: usize,
}

/// Service health snapshot.
#[derive(Debug, Clone)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub models: HashMap<String, ModelStatus>,
}
