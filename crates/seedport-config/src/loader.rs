//! Environment parsing and validation for [`AppConfig`].
//!
//! # Design
//! - Every read goes through a lookup closure so tests never mutate the process environment.
//! - Empty values are treated as absent, matching how container runtimes pass unset variables.
//! - Validation failures name the variable and carry the rejected value.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, CompressionPolicy, DaemonSettings, EvictionSettings, ExportSettings, LogFormat,
    LoggingSettings,
};

const SECONDS_PER_HOUR: u64 = 60 * 60;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is present but invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let bind_addr = env.parse_or("SEEDPORT_BIND_ADDR", "invalid_socket_addr", || {
            SocketAddr::from_str(defaults::BIND_ADDR).map_err(|_| {
                ConfigError::invalid("SEEDPORT_BIND_ADDR", "invalid_default", defaults::BIND_ADDR)
            })
        })?;

        let daemon = load_daemon(&env)?;

        let content_root = env
            .get("SEEDPORT_CONTENT_ROOT")
            .map_or_else(|| PathBuf::from(defaults::CONTENT_ROOT), PathBuf::from);
        require_absolute("SEEDPORT_CONTENT_ROOT", &content_root)?;

        let eviction = load_eviction(&env)?;
        let export = load_export(&env)?;

        let logging = LoggingSettings {
            level: env
                .get("SEEDPORT_LOG_LEVEL")
                .unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
            format: env
                .get("SEEDPORT_LOG_FORMAT")
                .map(|value| LogFormat::from_str(&value))
                .transpose()?,
        };

        Ok(Self {
            bind_addr,
            daemon,
            content_root,
            eviction,
            export,
            api_key: env.get("SEEDPORT_API_KEY"),
            logging,
        })
    }
}

fn load_daemon<F>(env: &Lookup<F>) -> ConfigResult<DaemonSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_url = env
        .get("SEEDPORT_RPC_URL")
        .unwrap_or_else(|| defaults::RPC_URL.to_string());
    let rpc_url = Url::parse(&raw_url)
        .map_err(|_| ConfigError::invalid("SEEDPORT_RPC_URL", "invalid_url", &raw_url))?;
    if !matches!(rpc_url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "SEEDPORT_RPC_URL",
            "unsupported_scheme",
            &raw_url,
        ));
    }

    let username = env.get("SEEDPORT_RPC_USERNAME");
    let password = env.get("SEEDPORT_RPC_PASSWORD");
    if username.is_some() != password.is_some() {
        return Err(ConfigError::Inconsistent {
            field: "SEEDPORT_RPC_USERNAME",
            other: "SEEDPORT_RPC_PASSWORD",
            reason: "credentials_incomplete",
        });
    }

    let timeout_secs = env.parse_or("SEEDPORT_RPC_TIMEOUT_SECS", "invalid_integer", || {
        Ok(defaults::RPC_TIMEOUT_SECS)
    })?;
    if timeout_secs == 0 {
        return Err(ConfigError::invalid(
            "SEEDPORT_RPC_TIMEOUT_SECS",
            "must_be_positive",
            "0",
        ));
    }

    let state_dir = env.get("SEEDPORT_DAEMON_STATE_DIR").map(PathBuf::from);
    if let Some(dir) = &state_dir {
        require_absolute("SEEDPORT_DAEMON_STATE_DIR", dir)?;
    }

    Ok(DaemonSettings {
        rpc_url,
        username,
        password,
        timeout: Duration::from_secs(timeout_secs),
        state_dir,
    })
}

fn load_eviction<F>(env: &Lookup<F>) -> ConfigResult<EvictionSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let threshold_percent: f64 = env.parse_or(
        "SEEDPORT_EVICTION_THRESHOLD_PERCENT",
        "invalid_number",
        || Ok(defaults::EVICTION_THRESHOLD_PERCENT),
    )?;
    if !(threshold_percent > 0.0 && threshold_percent <= 100.0) {
        return Err(ConfigError::invalid(
            "SEEDPORT_EVICTION_THRESHOLD_PERCENT",
            "out_of_range",
            &threshold_percent.to_string(),
        ));
    }

    let retention_days: u64 = env.parse_or(
        "SEEDPORT_EVICTION_RETENTION_DAYS",
        "invalid_integer",
        || Ok(defaults::EVICTION_RETENTION_DAYS),
    )?;
    let interval_secs: u64 = env.parse_or(
        "SEEDPORT_EVICTION_INTERVAL_SECS",
        "invalid_integer",
        || Ok(defaults::EVICTION_INTERVAL_SECS),
    )?;
    if interval_secs == 0 {
        return Err(ConfigError::invalid(
            "SEEDPORT_EVICTION_INTERVAL_SECS",
            "must_be_positive",
            "0",
        ));
    }
    let grace_hours: u64 = env.parse_or(
        "SEEDPORT_ARTIFACT_GRACE_HOURS",
        "invalid_integer",
        || Ok(defaults::ARTIFACT_GRACE_HOURS),
    )?;

    Ok(EvictionSettings {
        threshold_percent,
        retention: Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY)),
        interval: Duration::from_secs(interval_secs),
        artifact_grace: Duration::from_secs(grace_hours.saturating_mul(SECONDS_PER_HOUR)),
    })
}

fn load_export<F>(env: &Lookup<F>) -> ConfigResult<ExportSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let min_completion: f64 = env.parse_or(
        "SEEDPORT_EXPORT_MIN_COMPLETION",
        "invalid_number",
        || Ok(defaults::EXPORT_MIN_COMPLETION),
    )?;
    if !(0.0..=1.0).contains(&min_completion) {
        return Err(ConfigError::invalid(
            "SEEDPORT_EXPORT_MIN_COMPLETION",
            "out_of_range",
            &min_completion.to_string(),
        ));
    }
    let compression = env
        .get("SEEDPORT_COMPRESSION")
        .map(|value| CompressionPolicy::from_str(&value))
        .transpose()?
        .unwrap_or_default();

    Ok(ExportSettings {
        min_completion,
        compression,
    })
}

fn require_absolute(field: &'static str, path: &std::path::Path) -> ConfigResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            "must_be_absolute",
            &path.to_string_lossy(),
        ))
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse_or<T, D>(
        &self,
        name: &'static str,
        reason: &'static str,
        default: D,
    ) -> ConfigResult<T>
    where
        T: FromStr,
        D: FnOnce() -> ConfigResult<T>,
    {
        match self.get(name) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| ConfigError::invalid(name, reason, &raw)),
            None => default(),
        }
    }
}
