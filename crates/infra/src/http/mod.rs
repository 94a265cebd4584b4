//! HTTP transport built on reqwest

pub mod client;

pub use client::{classify_transport_error, HttpTransport, HttpTransportBuilder};
