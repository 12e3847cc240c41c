//! Observability Module
//!
//! - `http_server` - axum server for metrics, health probes and book depth
//!
//! Health state itself lives in [`crate::shared::health`] so the orchestrator
//! can report into it.

pub mod http_server;

pub use http_server::ObservabilityServer;
