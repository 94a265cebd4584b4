//! Resilient API access for the pet clinic backend
//!
//! - [`Transport`]: one classified attempt on the wire
//! - [`RequestExecutor`]: circuit breaker gate, bearer token, per-attempt
//!   timeout and retry loop around a transport
//! - [`ApiClient`]: typed JSON requests on top of the executor
//!
//! Every external call is bounded by a timeout and logged through
//! structured `tracing` fields.

pub mod client;
pub mod errors;
pub mod executor;
pub mod transport;

pub use client::ApiClient;
pub use errors::ApiError;
pub use executor::{ExecutionReport, ExecutorConfig, RequestExecutor};
pub use transport::{ApiRequest, ApiResponse, Transport};
