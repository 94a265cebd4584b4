//! # Pet Clinic Domain
//!
//! Pure types shared by the pet clinic client crates.
//!
//! This crate contains:
//! - The network error taxonomy ([`NetworkError`], [`ErrorKind`])
//! - The [`NetworkResult`] outcome union
//! - Configuration structures and their defaults
//!
//! ## Architecture
//! - No dependencies on other pet clinic crates
//! - No I/O, no async runtime

pub mod config;
pub mod constants;
pub mod errors;
pub mod result;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use result::NetworkResult;
