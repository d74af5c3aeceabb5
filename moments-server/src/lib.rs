//! Moments Server Library - REST API components for Epic Moments
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use db::{Catalog, CatalogError, CreateStamp, CreateVideo, DeletePolicy, StampRow, VideoRow};
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_state};
pub use state::{AppState, StartupError};
pub use storage::{ObjectStore, StorageError, StoredObject};
