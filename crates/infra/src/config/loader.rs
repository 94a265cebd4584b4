//! Configuration loader
//!
//! Builds a [`ClientConfig`] from an optional file plus environment
//! overrides.
//!
//! ## Loading Strategy
//! 1. Probe for a config file (see [`probe_config_paths`])
//! 2. Parse it as TOML or JSON by extension, or start from defaults when
//!    none exists
//! 3. Apply `PETCLINIC_*` environment overrides on top
//!
//! ## Environment Variables
//! - `PETCLINIC_CONFIG`: explicit config file path
//! - `PETCLINIC_API_BASE_URL`: API base URL
//! - `PETCLINIC_API_TIMEOUT_MS`: per-attempt request timeout
//! - `PETCLINIC_CLEAR_TOKENS_ON_UNAUTHORIZED`: drop the session on 401
//!   (true/false)
//! - `PETCLINIC_RETRY_PRESET`: `none`, `conservative`, `default` or
//!   `aggressive`
//! - `PETCLINIC_BREAKER_FAILURE_THRESHOLD`: failures before opening
//! - `PETCLINIC_BREAKER_SUCCESS_THRESHOLD`: probe successes before closing
//! - `PETCLINIC_BREAKER_OPEN_TIMEOUT_MS`: cooldown before half-open
//! - `PETCLINIC_BREAKER_PROBE_TIMEOUT_MS`: stale half-open probe release
//! - `PETCLINIC_TOKEN_LIFETIME_SECS`: default access token lifetime
//!
//! ## File Locations
//! 1. `$PETCLINIC_CONFIG`
//! 2. `./petclinic.toml` or `./petclinic.json`
//! 3. `./config/petclinic.toml` or `./config/petclinic.json`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use petclinic_domain::{ClientConfig, PetClinicError, Result, RetryPreset, RetrySettings};

/// Load configuration from the first config file found plus environment
/// overrides. Missing files are not an error.
///
/// # Errors
/// Returns `PetClinicError::Config` if a file exists but cannot be parsed,
/// or an override has an invalid value.
pub fn load() -> Result<ClientConfig> {
    let base = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            ClientConfig::default()
        }
    };
    apply_env_overrides(base)
}

/// Defaults plus environment overrides, ignoring any config file.
///
/// # Errors
/// Returns `PetClinicError::Config` if an override has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    apply_env_overrides(ClientConfig::default())
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `PetClinicError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PetClinicError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            PetClinicError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PetClinicError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PetClinicError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PetClinicError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(PetClinicError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Overlay `PETCLINIC_*` variables onto `config`.
///
/// A retry preset override replaces any custom retry block from the file.
///
/// # Errors
/// Returns `PetClinicError::Config` for unparsable values.
pub fn apply_env_overrides(mut config: ClientConfig) -> Result<ClientConfig> {
    if let Ok(url) = std::env::var("PETCLINIC_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(timeout) = env_parse("PETCLINIC_API_TIMEOUT_MS")? {
        config.api.request_timeout_ms = timeout;
    }
    config.api.clear_tokens_on_unauthorized =
        env_bool("PETCLINIC_CLEAR_TOKENS_ON_UNAUTHORIZED", config.api.clear_tokens_on_unauthorized);

    if let Some(preset) = env_parse::<RetryPreset>("PETCLINIC_RETRY_PRESET")? {
        config.retry = RetrySettings::Preset(preset);
    }

    let breaker = &mut config.circuit_breaker;
    if let Some(threshold) = env_parse("PETCLINIC_BREAKER_FAILURE_THRESHOLD")? {
        breaker.failure_threshold = threshold;
    }
    if let Some(threshold) = env_parse("PETCLINIC_BREAKER_SUCCESS_THRESHOLD")? {
        breaker.success_threshold = threshold;
    }
    if let Some(timeout) = env_parse("PETCLINIC_BREAKER_OPEN_TIMEOUT_MS")? {
        breaker.open_timeout_ms = timeout;
    }
    if let Some(timeout) = env_parse("PETCLINIC_BREAKER_PROBE_TIMEOUT_MS")? {
        breaker.half_open_probe_timeout_ms = timeout;
    }

    if let Some(lifetime) = env_parse("PETCLINIC_TOKEN_LIFETIME_SECS")? {
        config.token.default_lifetime_seconds = lifetime;
    }

    Ok(config)
}

/// First existing config file, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("PETCLINIC_CONFIG") {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "PETCLINIC_CONFIG points to a missing file");
    }

    let cwd = std::env::current_dir().ok()?;
    [
        cwd.join("petclinic.toml"),
        cwd.join("petclinic.json"),
        cwd.join("config/petclinic.toml"),
        cwd.join("config/petclinic.json"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

/// Parse an optional environment variable.
///
/// # Errors
/// Returns `PetClinicError::Config` naming the variable when set but invalid.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PetClinicError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
