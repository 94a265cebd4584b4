//! Configuration loading
//!
//! Loads [`ClientConfig`](petclinic_domain::ClientConfig) from a TOML or
//! JSON file and `PETCLINIC_*` environment variables.

pub mod loader;

pub use loader::{apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths};
