//! Mesto API - request pipeline and authentication gate
//!
//! Every request passes through a fixed, ordered pipeline (rate limiting,
//! body decoding, request logging, authentication, payload validation)
//! before reaching the user and card handlers. All failures end in one error
//! tail that logs them and renders a uniform JSON error.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod pipeline;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, Result};
