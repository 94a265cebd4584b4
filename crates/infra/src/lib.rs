//! # Pet Clinic Infrastructure
//!
//! I/O side of the pet clinic client.
//!
//! This crate contains:
//! - The resilient request executor and JSON API client
//! - The reqwest-backed HTTP transport
//! - Configuration loading from files and environment
//! - The per-session dependency container
//! - Tracing subscriber bootstrap
//!
//! ## Architecture
//! - Retry, circuit breaker and token state come from `petclinic-common`
//! - Error taxonomy and settings types come from `petclinic-domain`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod context;
pub mod http;
pub mod observability;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use api::{
    ApiClient, ApiError, ApiRequest, ApiResponse, ExecutionReport, ExecutorConfig,
    RequestExecutor, Transport,
};
pub use context::SessionContext;
pub use http::{HttpTransport, HttpTransportBuilder};
pub use observability::{init_tracing, LogFormat};
