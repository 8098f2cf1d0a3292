//! In-process job table and admission control.
//!
//! Every submission gets an entry here; the HTTP status endpoint reads from
//! it. The admission decision (count active jobs, compare against the
//! ceiling, insert) happens under a single write lock so concurrent
//! submitters can never overshoot the ceiling.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use factlens_core::{AnalysisResult, Error, Job, JobState, Result};

/// Shared map of job id to job. Cheap to clone.
#[derive(Clone, Default)]
pub struct JobTable {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Job>> {
        // A panic while holding the lock cannot leave a half-written entry:
        // every critical section is a single insert or field update.
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a job that was answered from the result store.
    ///
    /// Cache hits never count against the ceiling.
    pub fn insert_complete(&self, url: &str, result: AnalysisResult) -> Uuid {
        let job = Job::completed(url, result);
        let id = job.id;
        self.write().insert(id, job);
        id
    }

    /// Admit a new job if fewer than `ceiling` jobs are active.
    ///
    /// On success the entry is inserted as PROCESSING and a ticket is
    /// returned; the ticket is the only way to move the job to a terminal
    /// state. On rejection nothing is inserted.
    pub fn try_admit(&self, url: &str, ceiling: usize) -> Result<JobTicket> {
        let mut jobs = self.write();
        let active = jobs.values().filter(|j| j.state.is_active()).count();
        if active >= ceiling {
            debug!(active, ceiling, "Admission rejected");
            return Err(Error::Capacity { active, ceiling });
        }

        let mut job = Job::pending(url);
        job.state = JobState::Processing;
        job.started_at = Some(job.created_at);
        let id = job.id;
        jobs.insert(id, job);

        Ok(JobTicket {
            id,
            table: self.clone(),
            finished: false,
        })
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Jobs currently counted against the ceiling.
    pub fn active_count(&self) -> usize {
        self.read().values().filter(|j| j.state.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Evict terminal jobs that finished more than `older_than` ago.
    ///
    /// Returns the number of evicted entries. Active jobs are never touched.
    pub fn prune_finished(&self, older_than: Duration) -> usize {
        let Ok(older_than) = chrono::Duration::from_std(older_than) else {
            return 0;
        };
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.state.is_terminal() && job.finished_at.is_some_and(|t| t <= cutoff))
        });
        before - jobs.len()
    }

    fn finish(&self, id: Uuid, outcome: std::result::Result<AnalysisResult, String>) {
        let mut jobs = self.write();
        let Some(job) = jobs.get_mut(&id) else {
            warn!(job_id = %id, "Finished job missing from table");
            return;
        };
        job.finished_at = Some(Utc::now());
        match outcome {
            Ok(result) => {
                job.state = JobState::Complete;
                job.result = Some(result);
                job.error = None;
            }
            Err(message) => {
                job.state = JobState::Failed;
                job.result = None;
                job.error = Some(message);
            }
        }
    }
}

/// Exclusive right to finish one admitted job.
///
/// Dropping a ticket without calling [`complete`](Self::complete) or
/// [`fail`](Self::fail) marks the job FAILED, so a panicking or cancelled
/// pipeline task never leaves its entry stuck in PROCESSING.
pub struct JobTicket {
    id: Uuid,
    table: JobTable,
    finished: bool,
}

impl JobTicket {
    pub fn job_id(&self) -> Uuid {
        self.id
    }

    pub fn complete(mut self, result: AnalysisResult) {
        self.finished = true;
        self.table.finish(self.id, Ok(result));
    }

    pub fn fail(mut self, message: impl Into<String>) {
        self.finished = true;
        self.table.finish(self.id, Err(message.into()));
    }
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        if !self.finished {
            warn!(job_id = %self.id, "Job abandoned before finishing");
            self.table
                .finish(self.id, Err("Job was interrupted".to_string()));
        }
    }
}

impl std::fmt::Debug for JobTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTicket")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}
