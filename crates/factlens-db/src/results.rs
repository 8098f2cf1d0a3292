//! PostgreSQL-backed result store.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use factlens_core::{
    AnalysisResult, BiasAnalysis, Claim, Error, Perspectives, Platform, Result, ResultStore,
};

/// Result store over the `video_analyses` table.
#[derive(Clone)]
pub struct PgResultStore {
    pool: Pool<Postgres>,
}

impl PgResultStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Result<AnalysisResult> {
        let platform: String = row.try_get("platform")?;
        let duration: Option<i64> = row.try_get("duration_seconds")?;
        let Json(claims): Json<Vec<Claim>> = row.try_get("claims")?;
        let Json(perspectives): Json<Perspectives> = row.try_get("perspectives")?;
        let Json(bias_analysis): Json<BiasAnalysis> = row.try_get("bias_analysis")?;

        Ok(AnalysisResult {
            title: row.try_get("title")?,
            platform: Platform::from(platform),
            duration_seconds: duration.and_then(|d| u64::try_from(d).ok()),
            summary: row.try_get("summary")?,
            transcript: row.try_get("transcript")?,
            claims,
            perspectives,
            bias_analysis,
            points_awarded: row.try_get("points_awarded")?,
        })
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn lookup(&self, key: &str) -> Result<Option<AnalysisResult>> {
        let row = sqlx::query(
            "SELECT title, platform, duration_seconds, summary, transcript, claims,
                    perspectives, bias_analysis, points_awarded
             FROM video_analyses WHERE url_hash = $1 LIMIT 1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            db_table = "video_analyses",
            hit = row.is_some(),
            "Result lookup"
        );

        row.map(Self::parse_row).transpose()
    }

    async fn upsert(&self, key: &str, raw_url: &str, result: &AnalysisResult) -> Result<String> {
        let duration = result
            .duration_seconds
            .map(|d| i64::try_from(d).unwrap_or(i64::MAX));

        let id: Uuid = sqlx::query(
            "INSERT INTO video_analyses
                 (id, url_hash, url, platform, title, duration_seconds, summary, transcript,
                  claims, perspectives, bias_analysis, points_awarded)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (url_hash) DO UPDATE SET
                 url = EXCLUDED.url,
                 platform = EXCLUDED.platform,
                 title = EXCLUDED.title,
                 duration_seconds = EXCLUDED.duration_seconds,
                 summary = EXCLUDED.summary,
                 transcript = EXCLUDED.transcript,
                 claims = EXCLUDED.claims,
                 perspectives = EXCLUDED.perspectives,
                 bias_analysis = EXCLUDED.bias_analysis,
                 points_awarded = EXCLUDED.points_awarded,
                 updated_at = NOW()
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(key)
        .bind(raw_url)
        .bind(result.platform.as_str())
        .bind(&result.title)
        .bind(duration)
        .bind(&result.summary)
        .bind(&result.transcript)
        .bind(Json(&result.claims))
        .bind(Json(&result.perspectives))
        .bind(Json(&result.bias_analysis))
        .bind(result.points_awarded)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?
        .try_get("id")
        .map_err(|e| Error::Persistence(e.to_string()))?;

        debug!(
            subsystem = "database",
            db_table = "video_analyses",
            analysis_id = %id,
            "Result upserted"
        );

        Ok(id.to_string())
    }
}
