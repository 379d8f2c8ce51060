//! HTTP transport for the pipeline. This is the only
//! module that knows about axum - everything it calls into is transport-agnostic.

pub mod dto;
pub mod routes;

pub use routes::{router, AppState};
