//! Service layer module

pub mod avatar_service;
pub mod types;

pub use avatar_service::AvatarService;
pub use types::*;
