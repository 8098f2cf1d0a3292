//! In-process store implementations.
//!
//! Used when no `DATABASE_URL` is configured and by tests that need to
//! observe what the pipeline persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use factlens_core::{ActivityRecorder, AnalysisResult, Error, Result, ResultStore};

/// A persisted result together with the URL it was produced for.
#[derive(Debug, Clone)]
pub struct StoredResult {
    pub id: String,
    pub url: String,
    pub result: AnalysisResult,
}

/// Result store held in memory for the life of the process.
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    entries: Arc<RwLock<HashMap<String, StoredResult>>>,
    upserts: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail with a persistence error.
    pub fn with_failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    /// Seed a result directly, bypassing the pipeline.
    pub async fn insert(&self, key: &str, url: &str, result: AnalysisResult) {
        let stored = StoredResult {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            result,
        };
        self.entries.write().await.insert(key.to_string(), stored);
    }

    pub async fn get(&self, key: &str) -> Option<StoredResult> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of upsert calls that reached the store, including failed ones.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn lookup(&self, key: &str) -> Result<Option<AnalysisResult>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|stored| stored.result.clone()))
    }

    async fn upsert(&self, key: &str, raw_url: &str, result: &AnalysisResult) -> Result<String> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence("store is read-only".to_string()));
        }

        let mut entries = self.entries.write().await;
        let id = entries
            .get(key)
            .map(|existing| existing.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        entries.insert(
            key.to_string(),
            StoredResult {
                id: id.clone(),
                url: raw_url.to_string(),
                result: result.clone(),
            },
        );
        Ok(id)
    }
}

/// One recorded activity event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub user_id: String,
    pub analysis_id: String,
    pub points: i32,
}

/// Activity recorder that keeps events in memory.
#[derive(Clone, Default)]
pub struct MemoryActivityRecorder {
    events: Arc<RwLock<Vec<ActivityEvent>>>,
}

impl MemoryActivityRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ActivityEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl ActivityRecorder for MemoryActivityRecorder {
    async fn record(&self, user_id: &str, analysis_id: &str, points: i32) -> Result<()> {
        self.events.write().await.push(ActivityEvent {
            user_id: user_id.to_string(),
            analysis_id: analysis_id.to_string(),
            points,
        });
        Ok(())
    }
}

/// Activity recorder that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivityRecorder;

#[async_trait]
impl ActivityRecorder for NoopActivityRecorder {
    async fn record(&self, _user_id: &str, _analysis_id: &str, _points: i32) -> Result<()> {
        Ok(())
    }
}
