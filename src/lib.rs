//! Avatar Preparation Service Library

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod provision;
pub mod service;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
