//! Logging setup for hosts embedding the simulation

use tempus_core::{TempusError, TempusResult};
use tracing_subscriber::EnvFilter;

/// Default filter: engine crates at info, everything else at warn
pub const DEFAULT_FILTER: &str = "warn,tempus_time=info,tempus_history=info,tempus_distortion=info,tempus_runtime=info";

/// Install a formatted subscriber with [`DEFAULT_FILTER`]; `RUST_LOG` overrides it
pub fn init() -> TempusResult<()> {
    init_with_filter(DEFAULT_FILTER)
}

/// Install a formatted subscriber with `default_filter` unless `RUST_LOG` is set
///
/// Fails if the filter does not parse or a global subscriber is already installed.
pub fn init_with_filter(default_filter: &str) -> TempusResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| TempusError::Config(format!("log filter: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TempusError::Config(format!("log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_with_filter("debug");
        assert!(init_with_filter("debug").is_err());
    }
}
