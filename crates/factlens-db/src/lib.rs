//! # factlens-db
//!
//! PostgreSQL layer for factlens.
//!
//! This crate provides:
//! - Connection pool management
//! - The `video_analyses` result store (the pipeline's persistent cache)
//! - User activity / score recording
//! - In-memory stand-ins for DB-less runs and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use factlens_db::{Database, PoolConfig};
//! use factlens_core::{cache_key, ResultStore};
//!
//! let db = Database::connect("postgres://localhost/factlens", &PoolConfig::from_env()).await?;
//! let cached = db.results.lookup(&cache_key("https://youtu.be/abc")).await?;
//! ```

pub mod activity;
pub mod memory;
pub mod pool;
pub mod results;

// Re-export core types
pub use factlens_core::*;

pub use activity::{tree_state, PgActivityRecorder};
pub use memory::{
    ActivityEvent, MemoryActivityRecorder, MemoryResultStore, NoopActivityRecorder, StoredResult,
};
pub use pool::{connect_pool, PoolConfig};
pub use results::PgResultStore;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Persistent analysis cache.
    pub results: PgResultStore,
    /// Scoring activity.
    pub activity: PgActivityRecorder,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            results: PgResultStore::new(pool.clone()),
            activity: PgActivityRecorder::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` with the given pool sizing.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = connect_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
