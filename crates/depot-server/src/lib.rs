//! HTTP surface for depot
//!
//! - `PUT /upload` stores a new version from a multipart body
//! - `GET /download` streams the latest version of an artifact
//! - `GET /health` and `GET /readiness` for probes
//!
//! Every other route answers `404`.

pub mod error;
pub mod rest;
pub mod state;
pub mod types;

pub use error::AppError;
pub use rest::create_router;
pub use state::{AppState, ServerSettings};
pub use types::*;
