//! Integration tests for the PostgreSQL result store and activity recorder.
//!
//! Test Pattern:
//! - Requires `DATABASE_URL`; every test skips gracefully when it is unset
//! - Schema is applied from the workspace migrations before each test
//! - Keys are random so parallel tests never touch the same rows

use factlens_core::{
    cache_key, ActivityRecorder, AnalysisResult, BiasLean, Claim, ClaimType, Platform, ResultStore,
    Verdict,
};
use factlens_db::{tree_state, Database, PoolConfig};
use sqlx::Row;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../../migrations/20261016000000_video_analyses.sql");

async fn setup_db() -> Option<Database> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let db = Database::connect(&url, &PoolConfig::default())
        .await
        .expect("Failed to connect to test database");
    sqlx::raw_sql(SCHEMA)
        .execute(&db.pool)
        .await
        .expect("Failed to apply schema");
    Some(db)
}

macro_rules! require_db {
    () => {
        match setup_db().await {
            Some(db) => db,
            None => {
                eprintln!("Skipping: DATABASE_URL not set");
                return;
            }
        }
    };
}

fn sample_result(title: &str) -> AnalysisResult {
    AnalysisResult {
        title: title.to_string(),
        platform: Platform::Youtube,
        duration_seconds: Some(120),
        summary: "A short clip about budgets.".to_string(),
        transcript: "Taxes doubled last year.".to_string(),
        claims: vec![Claim {
            claim: "Taxes doubled last year".to_string(),
            claim_type: ClaimType::Spoken,
            timestamp: Some("0:04".to_string()),
            verdict: Verdict::False,
            confidence: 0.9,
            explanation: "Rates rose 2%.".to_string(),
            evidence_for: vec![],
            evidence_against: vec!["Treasury data".to_string()],
            sources: vec![],
        }],
        points_awarded: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lookup_returns_upserted_result() {
    let db = require_db!();
    let url = format!("https://youtu.be/{}", Uuid::new_v4());
    let key = cache_key(&url);

    assert!(db.results.lookup(&key).await.unwrap().is_none());

    let mut result = sample_result("Budget speech");
    result.bias_analysis.overall_bias = BiasLean::LeanRight;
    let id = db.results.upsert(&key, &url, &result).await.unwrap();
    assert!(Uuid::parse_str(&id).is_ok());

    let cached = db.results.lookup(&key).await.unwrap().unwrap();
    assert_eq!(cached, result);
}

#[tokio::test]
async fn test_upsert_same_key_keeps_row_id() {
    let db = require_db!();
    let url = format!("https://youtu.be/{}", Uuid::new_v4());
    let key = cache_key(&url);

    let first = db
        .results
        .upsert(&key, &url, &sample_result("first"))
        .await
        .unwrap();
    let second = db
        .results
        .upsert(&key, &url, &sample_result("second"))
        .await
        .unwrap();

    assert_eq!(first, second);
    let cached = db.results.lookup(&key).await.unwrap().unwrap();
    assert_eq!(cached.title, "second");
}

#[tokio::test]
async fn test_activity_accumulates_score() {
    let db = require_db!();
    let url = format!("https://youtu.be/{}", Uuid::new_v4());
    let key = cache_key(&url);
    let analysis_id = db
        .results
        .upsert(&key, &url, &sample_result("scored"))
        .await
        .unwrap();
    let user_id = Uuid::new_v4().to_string();

    db.activity.record(&user_id, &analysis_id, 10).await.unwrap();
    db.activity.record(&user_id, &analysis_id, 5).await.unwrap();

    let row = sqlx::query(
        "SELECT current_score, total_analyses, tree_state FROM user_scores WHERE user_id = $1",
    )
    .bind(&user_id)
    .fetch_one(&db.pool)
    .await
    .unwrap();

    let score: i64 = row.get("current_score");
    let total: i32 = row.get("total_analyses");
    let state: String = row.get("tree_state");
    assert_eq!(score, 15);
    assert_eq!(total, 2);
    assert_eq!(state, tree_state(15));
}

#[tokio::test]
async fn test_activity_rejects_malformed_analysis_id() {
    let db = require_db!();
    let err = db
        .activity
        .record("user", "not-a-uuid", 5)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid analysis id"));
}
