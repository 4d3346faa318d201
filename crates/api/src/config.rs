use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use rigforge_pipeline::sweep::DEFAULT_SWEEP_INTERVAL;
use rigforge_pipeline::LifecycleConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Budget for draining background tasks on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL. Without it assets are kept in memory.
    pub database_url: Option<String>,
    /// Deadline given to rigging jobs that start without one.
    pub processing_timeout_secs: Option<u64>,
    /// Period of the deadline sweeper (default: `30`).
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                           | Default                 |
    /// |-----------------------------------|-------------------------|
    /// | `HOST`                            | `0.0.0.0`               |
    /// | `PORT`                            | `3000`                  |
    /// | `CORS_ORIGINS`                    | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`            | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`           | `30`                    |
    /// | `DATABASE_URL`                    | unset (memory store)    |
    /// | `RIGGING_PROCESSING_TIMEOUT_SECS` | unset (no deadline)     |
    /// | `RIGGING_SWEEP_INTERVAL_SECS`     | `30`                    |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&non_empty, "PORT", 3000)?;

        let cors_origins: Vec<String> = non_empty("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&non_empty, "REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs = parse_or(&non_empty, "SHUTDOWN_TIMEOUT_SECS", 30)?;
        let database_url = non_empty("DATABASE_URL");
        let processing_timeout_secs = parse_opt(&non_empty, "RIGGING_PROCESSING_TIMEOUT_SECS")?;
        let sweep_interval_secs = parse_or(
            &non_empty,
            "RIGGING_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL.as_secs(),
        )?;

        if processing_timeout_secs == Some(0) {
            anyhow::bail!("RIGGING_PROCESSING_TIMEOUT_SECS must be greater than zero");
        }
        if sweep_interval_secs == 0 {
            anyhow::bail!("RIGGING_SWEEP_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            processing_timeout_secs,
            sweep_interval_secs,
        })
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            processing_timeout: self.processing_timeout_secs.and_then(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
            }),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_opt<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{key} has an invalid value: {raw:?}"))
        })
        .transpose()
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
