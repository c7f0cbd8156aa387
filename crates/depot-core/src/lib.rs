//! Core types shared by the depot crates
//!
//! Holds the process-wide configuration and the access guard.

pub mod auth;
pub mod config;

// Re-exports
pub use auth::AccessGuard;
pub use config::{
    AuthConfig, DepotConfig, DownloadConfig, LatestPolicy, LimitsConfig, LogFormat,
    ObservabilityConfig, ServerConfig, StorageConfig,
};
