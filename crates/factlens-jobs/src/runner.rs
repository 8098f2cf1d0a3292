//! Pipeline runner: admission control plus the per-job stage sequence.
//!
//! `submit` answers quickly: it consults the result store, admits the job
//! against the concurrency ceiling and spawns the pipeline body. The body
//! runs probe, acquire, analyze, assemble and persist in order, then moves
//! the job to its terminal state.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use factlens_core::{
    cache_key, detect_platform, validate_url, ActivityRecorder, AnalysisClient, AnalysisResult,
    AnalyzeRequest, Error, Job, JobState, MediaAcquirer, Result, ResultStore, Submission,
};

use crate::config::PipelineConfig;
use crate::table::{JobTable, JobTicket};
use crate::workspace::JobWorkspace;

/// Named step of the pipeline body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Probe,
    Acquire,
    Analyze,
    Assemble,
    Persist,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Probe => "probe",
            PipelineStage::Acquire => "acquire",
            PipelineStage::Analyze => "analyze",
            PipelineStage::Assemble => "assemble",
            PipelineStage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted by the pipeline runner.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A submission was answered from the result store.
    CacheHit { job_id: Uuid },
    /// A job was admitted and its pipeline spawned.
    JobAdmitted { job_id: Uuid },
    /// A submission was refused because the ceiling was reached.
    JobRejected { active: usize },
    /// A pipeline stage started.
    StageStarted { job_id: Uuid, stage: PipelineStage },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, duration_ms: u64 },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        stage: PipelineStage,
        error: String,
    },
}

impl PipelineEvent {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            PipelineEvent::CacheHit { job_id }
            | PipelineEvent::JobAdmitted { job_id }
            | PipelineEvent::StageStarted { job_id, .. }
            | PipelineEvent::JobCompleted { job_id, .. }
            | PipelineEvent::JobFailed { job_id, .. } => Some(*job_id),
            PipelineEvent::JobRejected { .. } => None,
        }
    }

    /// Whether this event ends a job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::CacheHit { .. }
                | PipelineEvent::JobCompleted { .. }
                | PipelineEvent::JobFailed { .. }
        )
    }
}

/// A stage error, rendered as the job's failure message.
#[derive(Debug)]
struct StageFailure {
    stage: PipelineStage,
    error: Error,
}

impl StageFailure {
    fn new(stage: PipelineStage, error: Error) -> Self {
        Self { stage, error }
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.error)
    }
}

struct RunnerInner {
    config: PipelineConfig,
    jobs: JobTable,
    acquirer: Arc<dyn MediaAcquirer>,
    analyzer: Arc<dyn AnalysisClient>,
    store: Arc<dyn ResultStore>,
    activity: Arc<dyn ActivityRecorder>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

/// Accepts submissions and drives admitted jobs to completion.
///
/// Cheap to clone; clones share the job table and collaborators.
#[derive(Clone)]
pub struct PipelineRunner {
    inner: Arc<RunnerInner>,
}

impl PipelineRunner {
    pub fn new(
        config: PipelineConfig,
        acquirer: Arc<dyn MediaAcquirer>,
        analyzer: Arc<dyn AnalysisClient>,
        store: Arc<dyn ResultStore>,
        activity: Arc<dyn ActivityRecorder>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(RunnerInner {
                config,
                jobs: JobTable::new(),
                acquirer,
                analyzer,
                store,
                activity,
                event_tx,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn jobs(&self) -> &JobTable {
        &self.inner.jobs
    }

    /// Snapshot of a job.
    pub fn job(&self, id: &Uuid) -> Option<Job> {
        self.inner.jobs.get(id)
    }

    /// Get a receiver for pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Accept a submission.
    ///
    /// Returns COMPLETE immediately on a result-store hit, regardless of the
    /// ceiling. Otherwise the job is admitted as PROCESSING and its pipeline
    /// spawned, or the call fails with [`Error::Capacity`] and no job entry
    /// is created.
    pub async fn submit(&self, request: AnalyzeRequest) -> Result<Submission> {
        let inner = &self.inner;
        validate_url(&request.url)?;
        let url = request.url.trim().to_string();
        let key = cache_key(&url);
        let user_id = request.user_id.filter(|u| !u.trim().is_empty());

        match inner.store.lookup(&key).await {
            Ok(Some(result)) => {
                let job_id = inner.jobs.insert_complete(&url, result);
                info!(job_id = %job_id, url = %url, "Result store hit");
                inner.emit(PipelineEvent::CacheHit { job_id });
                return Ok(Submission {
                    job_id,
                    status: JobState::Complete,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url = %url, error = %e, "Result store lookup failed, treating as miss");
            }
        }

        if let Some(retention) = inner.config.job_retention {
            let pruned = inner.jobs.prune_finished(retention);
            if pruned > 0 {
                debug!(pruned, "Pruned finished jobs");
            }
        }

        let ticket = match inner.jobs.try_admit(&url, inner.config.max_concurrent_jobs) {
            Ok(ticket) => ticket,
            Err(e) => {
                if let Error::Capacity { active, ceiling } = &e {
                    warn!(url = %url, active, ceiling, "Submission rejected");
                    inner.emit(PipelineEvent::JobRejected { active: *active });
                }
                return Err(e);
            }
        };

        let job_id = ticket.job_id();
        info!(job_id = %job_id, url = %url, "Job admitted");
        inner.emit(PipelineEvent::JobAdmitted { job_id });

        let worker = Arc::clone(inner);
        tokio::spawn(async move {
            worker.execute(ticket, url, key, user_id).await;
        });

        Ok(Submission {
            job_id,
            status: JobState::Processing,
        })
    }
}

impl RunnerInner {
    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn enter(&self, job_id: Uuid, stage: PipelineStage) {
        debug!(job_id = %job_id, stage = stage.as_str(), "Stage started");
        self.emit(PipelineEvent::StageStarted { job_id, stage });
    }

    /// Pipeline body for one admitted job. Always finishes the ticket.
    #[instrument(skip_all, fields(job_id = %ticket.job_id()))]
    async fn execute(
        self: Arc<Self>,
        ticket: JobTicket,
        url: String,
        key: String,
        user_id: Option<String>,
    ) {
        let job_id = ticket.job_id();
        let start = Instant::now();

        match self.produce(job_id, &url).await {
            Ok(result) => {
                self.enter(job_id, PipelineStage::Persist);
                self.persist(job_id, &url, &key, &result, user_id).await;

                let claims = result.claims.len();
                ticket.complete(result);
                let duration_ms = start.elapsed().as_millis() as u64;
                info!(job_id = %job_id, claims, duration_ms, "Job completed");
                self.emit(PipelineEvent::JobCompleted {
                    job_id,
                    duration_ms,
                });
            }
            Err(failure) => {
                let message = failure.to_string();
                error!(
                    job_id = %job_id,
                    stage = failure.stage.as_str(),
                    error = %failure.error,
                    "Job failed"
                );
                ticket.fail(message.clone());
                self.emit(PipelineEvent::JobFailed {
                    job_id,
                    stage: failure.stage,
                    error: message,
                });
            }
        }
    }

    /// Probe through assemble. The working directory exists only while
    /// media is acquired and analyzed.
    async fn produce(
        &self,
        job_id: Uuid,
        url: &str,
    ) -> std::result::Result<AnalysisResult, StageFailure> {
        self.enter(job_id, PipelineStage::Probe);
        let info = self
            .acquirer
            .probe(url)
            .await
            .map_err(|e| StageFailure::new(PipelineStage::Probe, e))?;

        let max = self.config.max_duration_secs;
        if info.duration_secs > max {
            return Err(StageFailure::new(
                PipelineStage::Probe,
                Error::Validation(format!(
                    "Video too long ({}s). Max is {}s.",
                    info.duration_secs, max
                )),
            ));
        }

        self.enter(job_id, PipelineStage::Acquire);
        let workspace = JobWorkspace::create_async(&self.config.temp_dir, job_id)
            .await
            .map_err(|e| StageFailure::new(PipelineStage::Acquire, e))?;
        let analyzed = self.acquire_and_analyze(job_id, url, workspace.path()).await;
        self.cleanup(job_id, workspace).await;
        let mut result = analyzed?;

        self.enter(job_id, PipelineStage::Assemble);
        result.merge_media_info(detect_platform(url), &info);
        result.sanitize();
        Ok(result)
    }

    async fn acquire_and_analyze(
        &self,
        job_id: Uuid,
        url: &str,
        work_dir: &Path,
    ) -> std::result::Result<AnalysisResult, StageFailure> {
        let media = self
            .acquirer
            .acquire(url, work_dir)
            .await
            .map_err(|e| StageFailure::new(PipelineStage::Acquire, e))?;

        self.enter(job_id, PipelineStage::Analyze);
        self.analyzer
            .analyze(&media.audio, &media.keyframes)
            .await
            .map_err(|e| StageFailure::new(PipelineStage::Analyze, e))
    }

    async fn cleanup(&self, job_id: Uuid, workspace: JobWorkspace) {
        let path = workspace.path().to_path_buf();
        match tokio::task::spawn_blocking(move || workspace.close()).await {
            Ok(Ok(())) => debug!(job_id = %job_id, "Removed working directory"),
            Ok(Err(e)) => warn!(
                job_id = %job_id,
                path = %path.display(),
                error = %e,
                "Failed to remove working directory"
            ),
            Err(e) => warn!(job_id = %job_id, error = %e, "Cleanup task failed"),
        }
    }

    /// Write the result to the store and, for signed-in users, record the
    /// activity in the background. Failures are logged only.
    async fn persist(
        &self,
        job_id: Uuid,
        url: &str,
        key: &str,
        result: &AnalysisResult,
        user_id: Option<String>,
    ) {
        let analysis_id = match self.store.upsert(key, url, result).await {
            Ok(id) => id,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to persist result");
                return;
            }
        };
        debug!(job_id = %job_id, analysis_id = %analysis_id, "Result persisted");

        let Some(user_id) = user_id else {
            return;
        };
        let activity = Arc::clone(&self.activity);
        let points = result.points_awarded;
        tokio::spawn(async move {
            if let Err(e) = activity.record(&user_id, &analysis_id, points).await {
                warn!(
                    user_id = %user_id,
                    analysis_id = %analysis_id,
                    error = %e,
                    "Failed to record user activity"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_message() {
        let failure = StageFailure::new(
            PipelineStage::Probe,
            Error::Validation("Video too long (900s). Max is 600s.".to_string()),
        );
        assert_eq!(
            failure.to_string(),
            "probe stage failed: Validation error: Video too long (900s). Max is 600s."
        );
    }

    #[test]
    fn test_event_job_id() {
        let id = Uuid::new_v4();
        assert_eq!(PipelineEvent::JobAdmitted { job_id: id }.job_id(), Some(id));
        assert_eq!(PipelineEvent::JobRejected { active: 3 }.job_id(), None);
        assert!(PipelineEvent::CacheHit { job_id: id }.is_terminal());
        assert!(!PipelineEvent::StageStarted {
            job_id: id,
            stage: PipelineStage::Probe
        }
        .is_terminal());
    }
}
