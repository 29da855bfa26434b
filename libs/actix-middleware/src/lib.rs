//! # Actix Middleware Library
//!
//! Shared middleware components for the platform's Actix services.
//!
//! ## Modules
//! - `correlation_id`: request correlation id propagation

pub mod correlation_id;

pub use correlation_id::{get_correlation_id, CorrelationIdMiddleware};
