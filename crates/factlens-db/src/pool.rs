//! Postgres pool for the result store and activity recorder.
//!
//! The pipeline touches the database at most twice per job (cache lookup and
//! result upsert), so the pool stays small.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use factlens_core::{Error, Result};

/// Default pool ceiling.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default wait for a free connection, in seconds.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `DB_MAX_CONNECTIONS` and
    /// `DB_ACQUIRE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PoolConfig::from_env`] with an arbitrary variable source.
    /// Unparseable values fall back to the default; the ceiling is at least one.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(n) = lookup("DB_MAX_CONNECTIONS").and_then(|v| v.trim().parse::<u32>().ok()) {
            config.max_connections = n.max(1);
        }
        if let Some(secs) =
            lookup("DB_ACQUIRE_TIMEOUT_SECS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Open a pool against `database_url`.
pub async fn connect_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        assert_eq!(PoolConfig::from_lookup(lookup_from(&[])), PoolConfig::default());
        assert_eq!(PoolConfig::default().max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_max_connections_override() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("DB_MAX_CONNECTIONS", "12"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "4"),
        ]));
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.acquire_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("DB_MAX_CONNECTIONS", "lots"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "-1"),
        ]));
        assert_eq!(config, PoolConfig::default());

        let config = PoolConfig::from_lookup(lookup_from(&[("DB_MAX_CONNECTIONS", "0")]));
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("DB_MAX_CONNECTIONS", "7");
        let config = PoolConfig::from_env();
        std::env::remove_var("DB_MAX_CONNECTIONS");
        assert_eq!(config.max_connections, 7);
    }
}
