//! Subscriber installation and build metadata.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Level directive used when neither configuration nor `RUST_LOG` supplies one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global subscriber. `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    BUILD_SHA.get_or_init(|| config.build_sha.to_owned());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));
    let output = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Build SHA recorded by the first [`init_logging`] call, `dev` before that.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Level directive, e.g. `info` or `seedport_fsops=debug,info`.
    pub level: &'a str,
    /// Output encoding.
    pub format: LogFormat,
    /// Build identifier attached to the process span and health responses.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: option_env!("SEEDPORT_BUILD_SHA").unwrap_or("dev"),
        }
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

impl LogFormat {
    /// JSON for release builds, human-readable for debug builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_follows_build_profile() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::infer());
    }

    #[test]
    fn only_the_first_install_wins() {
        let config = LoggingConfig {
            level: "debug",
            format: LogFormat::Json,
            build_sha: "c0ffee",
        };
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_sha(), "c0ffee");
    }
}
