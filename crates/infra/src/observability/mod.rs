//! Tracing subscriber bootstrap
//!
//! Library code only emits `tracing` events. Binaries and integration
//! harnesses call [`init_tracing`] once to install a subscriber.

use petclinic_domain::{PetClinicError, Result};
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = PetClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "pretty" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(PetClinicError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_directives`
/// (e.g. `"petclinic_infra=info,petclinic_common=warn"`).
///
/// # Errors
/// Returns `PetClinicError::Config` if the directives are invalid or a
/// global subscriber is already installed.
pub fn init_tracing(default_directives: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives)
            .map_err(|e| PetClinicError::Config(format!("Invalid log directives: {e}")))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    installed.map_err(|e| PetClinicError::Config(format!("Failed to install tracing subscriber: {e}")))
}
