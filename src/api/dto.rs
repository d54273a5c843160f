//! REST API request/response data transfer objects

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Error;

/// Readiness probe response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub models: HashMap<String, ModelStatusDto>,
}

#[derive(Debug, Serialize)]
pub struct ModelStatusDto {
    pub state: String,
    pub in_flight: usize,
    pub limit: usize,
}

/// Avatar creation response
#[derive(Debug, Serialize)]
pub struct CreateAvatarResponse {
    pub avatar_id: String,
    pub artifact: String,
    pub region: RegionDto,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct RegionDto {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Error response body. Each fault category carries its own context
/// fields; absent ones are omitted from the JSON.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: &str, code: &str) -> Self {
        Self {
            message: message.to_string(),
            code: code.to_string(),
            remote_key: None,
            bucket: None,
            prefix: None,
            path: None,
        }
    }

    pub fn from_error(err: &Error) -> Self {
        let mut body = Self::new(&err.to_string(), err.code());
        match err {
            Error::Download { remote_key, .. } => {
                body.remote_key = Some(remote_key.clone());
            }
            Error::List { bucket, prefix, .. } => {
                body.bucket = Some(bucket.clone());
                body.prefix = Some(prefix.clone());
            }
            Error::NotFound(path) => {
                body.path = Some(path.display().to_string());
            }
            _ => {}
        }
        body
    }
}
