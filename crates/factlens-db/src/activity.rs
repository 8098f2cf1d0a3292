//! Per-user scoring activity.
//!
//! Each completed analysis a signed-in user requests is logged in
//! `user_analyses`, and their running total in `user_scores` is bumped. The
//! stored `tree_state` is the growth stage the client renders for that score.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use factlens_core::{ActivityRecorder, Error, Result};

/// Growth stage for a running score.
pub fn tree_state(score: i64) -> &'static str {
    match score {
        s if s < 100 => "seedling",
        s if s < 500 => "sapling",
        s if s < 1000 => "healthy",
        _ => "blooming",
    }
}

#[derive(Clone)]
pub struct PgActivityRecorder {
    pool: Pool<Postgres>,
}

impl PgActivityRecorder {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRecorder for PgActivityRecorder {
    async fn record(&self, user_id: &str, analysis_id: &str, points: i32) -> Result<()> {
        let analysis_id = Uuid::parse_str(analysis_id)
            .map_err(|e| Error::InvalidInput(format!("Invalid analysis id: {}", e)))?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO user_analyses (user_id, analysis_id, points_earned)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(analysis_id)
        .bind(points)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let score: i64 = sqlx::query(
            "INSERT INTO user_scores (user_id, current_score, total_analyses, updated_at)
             VALUES ($1, $2, 1, NOW())
             ON CONFLICT (user_id) DO UPDATE SET
                 current_score = user_scores.current_score + EXCLUDED.current_score,
                 total_analyses = user_scores.total_analyses + 1,
                 updated_at = NOW()
             RETURNING current_score",
        )
        .bind(user_id)
        .bind(i64::from(points))
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?
        .try_get("current_score")
        .map_err(Error::Database)?;

        sqlx::query("UPDATE user_scores SET tree_state = $1 WHERE user_id = $2")
            .bind(tree_state(score))
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            db_table = "user_scores",
            user_id,
            score,
            "Recorded user analysis"
        );
        Ok(())
    }
}
