use crate::{
    catalog::TraitId,
    error::{Result, VirtuGeneError},
    prediction::{
        JobSnapshot, JobState, JobWatcher, PredictionJob, PredictionPipeline, PredictionReport,
        PredictionRequest,
    },
    sample_library::SequenceSource,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub fingerprint: String,
    /// True when the submission joined an already active job.
    pub deduplicated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub progress: u8,
    pub report: Option<PredictionReport>,
    pub error: Option<VirtuGeneError>,
}

impl JobStatus {
    fn new(job_id: &str, snapshot: JobSnapshot) -> Self {
        Self {
            job_id: job_id.to_string(),
            state: snapshot.state,
            progress: snapshot.progress,
            report: snapshot.report,
            error: snapshot.error,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<String, Arc<PredictionJob>>,
    /// fingerprint -> id of the newest job with that fingerprint
    by_fingerprint: HashMap<String, String>,
}

impl RegistryState {
    fn remove(&mut self, job_id: &str) -> Option<Arc<PredictionJob>> {
        let job = self.jobs.remove(job_id)?;
        if self.by_fingerprint.get(job.fingerprint()).map(String::as_str) == Some(job_id) {
            self.by_fingerprint.remove(job.fingerprint());
        }
        Some(job)
    }

    fn is_expired(job: &PredictionJob, retention: Duration) -> bool {
        job.finished_for().is_some_and(|age| age >= retention)
    }

    fn evict_expired(&mut self, retention: Duration) -> usize {
        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, job)| Self::is_expired(job, retention))
            .map(|(id, _)| id.to_owned())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "evicted expired prediction jobs");
        }
        expired.len()
    }
}

/// Owns every prediction job and guarantees at most one active job per
/// fingerprint.
pub struct JobRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
    source: Arc<dyn SequenceSource>,
    pipeline: PredictionPipeline,
    retention: Duration,
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.len())
            .field("retention", &self.retention)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl JobRegistry {
    pub fn new(
        source: Arc<dyn SequenceSource>,
        pipeline: PredictionPipeline,
        retention: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
            source,
            pipeline,
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates the request and starts a job for it, or joins the active job
    /// with the same fingerprint. Expired jobs are dropped on every call, so the
    /// registry stays bounded without a sweeper. Must be called from within a
    /// tokio runtime.
    pub fn submit(&self, species1: &str, species2: &str, trait_label: &str) -> Result<JobHandle> {
        let trait_id = TraitId::from_label(trait_label)?;
        let request = PredictionRequest {
            sample_a: self.source.resolve(species1)?,
            sample_b: self.source.resolve(species2)?,
            trait_id,
        };
        let fingerprint = request.fingerprint();
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| VirtuGeneError::Internal {
            message: format!("no async runtime to run prediction jobs: {e}"),
        })?;

        let mut state = self.lock();
        state.evict_expired(self.retention);
        let active = state
            .by_fingerprint
            .get(&fingerprint)
            .and_then(|id| state.jobs.get(id))
            .filter(|job| !job.is_terminal());
        if let Some(job) = active {
            info!(job_id = job.id(), %fingerprint, "joined active prediction job");
            return Ok(JobHandle {
                job_id: job.id().to_string(),
                fingerprint,
                deduplicated: true,
            });
        }

        let job_id = format!("job-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Arc::new(PredictionJob::new(job_id.clone(), request));
        state.jobs.insert(job_id.clone(), Arc::clone(&job));
        state
            .by_fingerprint
            .insert(fingerprint.clone(), job_id.clone());
        drop(state);

        info!(
            %job_id,
            %fingerprint,
            species1 = %job.request().sample_a.name,
            species2 = %job.request().sample_b.name,
            trait_name = %trait_id,
            "submitted prediction job"
        );
        let pipeline = self.pipeline.clone();
        runtime.spawn(async move { pipeline.run(job).await });

        Ok(JobHandle {
            job_id,
            fingerprint,
            deduplicated: false,
        })
    }

    /// Looks up a job, evicting it first if its retention window has passed.
    fn job(&self, job_id: &str) -> Result<Arc<PredictionJob>> {
        let mut state = self.lock();
        let expired = state
            .jobs
            .get(job_id)
            .map(|job| RegistryState::is_expired(job, self.retention));
        match expired {
            Some(false) => state.jobs.get(job_id).cloned().ok_or_else(|| not_found(job_id)),
            Some(true) => {
                state.remove(job_id);
                debug!(job_id, "evicted expired prediction job");
                Err(not_found(job_id))
            }
            None => Err(not_found(job_id)),
        }
    }

    /// Requests cancellation. Cancelling a terminal job is a no-op.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.job(job_id)?;
        if job.is_terminal() {
            debug!(job_id, state = %job.state(), "cancel ignored for finished job");
        } else {
            info!(job_id, "cancellation requested");
            job.cancel();
        }
        Ok(())
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatus> {
        let job = self.job(job_id)?;
        Ok(JobStatus::new(job_id, job.snapshot()))
    }

    pub fn watch(&self, job_id: &str) -> Result<JobWatcher> {
        Ok(self.job(job_id)?.watch())
    }

    /// Returns the status; a terminal job is removed once its result has been
    /// handed out.
    pub fn consume(&self, job_id: &str) -> Result<JobStatus> {
        let job = self.job(job_id)?;
        let snapshot = job.snapshot();
        if snapshot.state.is_terminal() {
            self.lock().remove(job_id);
            debug!(job_id, "consumed prediction job");
        }
        Ok(JobStatus::new(job_id, snapshot))
    }

    /// Drops terminal jobs older than the retention window; returns how many
    /// were removed.
    pub fn evict_expired(&self) -> usize {
        self.lock().evict_expired(self.retention)
    }

    /// Periodically evicts expired jobs until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.evict_expired();
                    }
                    None => break,
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .jobs
            .values()
            .filter(|job| !job.is_terminal())
            .count()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

fn not_found(job_id: &str) -> VirtuGeneError {
    VirtuGeneError::JobNotFound {
        job_id: job_id.to_string(),
    }
}
