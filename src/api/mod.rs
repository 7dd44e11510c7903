//! HTTP API layer for Compliance Core.
//!
//! Provides REST endpoints for organizations, policy attestation,
//! incident reporting, training and compliance dashboards.

pub mod handlers;
mod routes;
mod types;

pub use routes::build_router;
