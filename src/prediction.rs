//! Prediction jobs and the staged pipeline that drives them.
//!
//! A job moves through `Pending -> AnalyzingA -> AnalyzingB -> Scoring ->
//! Finalizing -> Completed`, or ends early in `Cancelled` or `Failed`. Every
//! transition is published on a `watch` channel, so an observer attaching at
//! any point sees the current snapshot first and the terminal snapshot last.

use crate::{
    catalog::TraitId,
    error::{Result, VirtuGeneError},
    features::FeatureScanner,
    gc_contents::round_one_decimal,
    sample_library::SpeciesSample,
    trait_scorer::{AnalysisFacts, SideEffectClass, StabilityClass, TraitScore, TraitScorer},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::sync::{Notify, watch};
use tracing::{Instrument, debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    AnalyzingA,
    AnalyzingB,
    Scoring,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub trait_name: String,
    pub species1: String,
    pub species2: String,
    /// Signed percentage change in expression level.
    pub expression_delta: f64,
    pub stability: StabilityClass,
    pub side_effects: SideEffectClass,
    pub viability: u8,
    /// Ordered, without duplicates.
    pub markers: Vec<String>,
    pub narrative: String,
}

impl PredictionReport {
    pub fn assemble(request: &PredictionRequest, score: TraitScore) -> Self {
        let expression_delta = round_one_decimal(score.expression_delta);
        let viability = score.viability.min(100);
        let markers: Vec<String> = score.markers.into_iter().unique().collect();
        let trait_name = request.trait_id.label().to_string();

        let direction = if expression_delta > 0.0 {
            format!("raise expression by {expression_delta:.1}%")
        } else if expression_delta < 0.0 {
            format!("lower expression by {:.1}%", -expression_delta)
        } else {
            "leave expression unchanged".to_string()
        };
        let mut narrative = format!(
            "Transferring {trait_name} from {} into {} is predicted to {direction}, \
             with {} stability and {} side effects. Viability score: {viability}/100.",
            request.sample_a.name,
            request.sample_b.name,
            score.stability.to_string().to_lowercase(),
            score.side_effects.to_string().to_lowercase(),
        );
        if !markers.is_empty() {
            narrative.push_str(&format!(" Supporting markers: {}.", markers.join(", ")));
        }

        Self {
            trait_name,
            species1: request.sample_a.name.to_owned(),
            species2: request.sample_b.name.to_owned(),
            expression_delta,
            stability: score.stability,
            side_effects: score.side_effects,
            viability,
            markers,
            narrative,
        }
    }
}

/// What an observer sees of a job at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub state: JobState,
    pub progress: u8,
    pub report: Option<PredictionReport>,
    pub error: Option<VirtuGeneError>,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self {
            state: JobState::Pending,
            progress: 0,
            report: None,
            error: None,
        }
    }
}

/// Deterministic identifier of a request, used for deduplication.
pub fn fingerprint(species1: &str, species2: &str, trait_id: TraitId) -> String {
    let mut hasher = Sha1::new();
    hasher.update(species1.as_bytes());
    hasher.update([0x1f]);
    hasher.update(species2.as_bytes());
    hasher.update([0x1f]);
    hasher.update(trait_id.label().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredictionRequest {
    pub sample_a: SpeciesSample,
    pub sample_b: SpeciesSample,
    pub trait_id: TraitId,
}

impl PredictionRequest {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.sample_a.name, &self.sample_b.name, self.trait_id)
    }
}

#[derive(Debug)]
pub struct PredictionJob {
    id: String,
    fingerprint: String,
    request: PredictionRequest,
    cancelled: AtomicBool,
    cancel_notify: Notify,
    snapshot: watch::Sender<JobSnapshot>,
    finished_at: OnceLock<Instant>,
}

impl PredictionJob {
    pub fn new(id: String, request: PredictionRequest) -> Self {
        let (snapshot, _) = watch::channel(JobSnapshot::default());
        Self {
            id,
            fingerprint: request.fingerprint(),
            request,
            cancelled: AtomicBool::new(false),
            cancel_notify: Notify::new(),
            snapshot,
            finished_at: OnceLock::new(),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline(always)]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn request(&self) -> &PredictionRequest {
        &self.request
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> JobState {
        self.snapshot.borrow().state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Time since the job reached a terminal state.
    pub fn finished_for(&self) -> Option<Duration> {
        self.finished_at.get().map(Instant::elapsed)
    }

    pub fn watch(&self) -> JobWatcher {
        JobWatcher::new(self.snapshot.subscribe())
    }

    /// Requests cancellation. Has no effect once the job is terminal.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel_notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancel_requested(&self) {
        while !self.is_cancelled() {
            self.cancel_notify.notified().await;
        }
    }

    /// Applies `update` unless the job is already terminal. Progress never
    /// moves backwards.
    fn publish(&self, update: impl FnOnce(&mut JobSnapshot)) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.state.is_terminal() {
                return false;
            }
            let progress = snapshot.progress;
            update(snapshot);
            snapshot.progress = snapshot.progress.max(progress);
            if snapshot.state.is_terminal() {
                self.finished_at.get_or_init(Instant::now);
            }
            true
        })
    }

    fn advance(&self, state: JobState, progress: u8) {
        debug!(%state, progress, "stage transition");
        self.publish(|snapshot| {
            snapshot.state = state;
            snapshot.progress = progress;
        });
    }

    fn complete(&self, report: PredictionReport) {
        self.publish(|snapshot| {
            snapshot.state = JobState::Completed;
            snapshot.progress = 100;
            snapshot.report = Some(report);
        });
    }

    fn fail(&self, error: VirtuGeneError) {
        self.publish(|snapshot| {
            snapshot.state = JobState::Failed;
            snapshot.error = Some(error);
        });
    }

    fn mark_cancelled(&self) {
        self.publish(|snapshot| snapshot.state = JobState::Cancelled);
    }
}

/// A subscription to one job's snapshots.
#[derive(Debug)]
pub struct JobWatcher {
    receiver: watch::Receiver<JobSnapshot>,
    started: bool,
    finished: bool,
}

impl JobWatcher {
    fn new(receiver: watch::Receiver<JobSnapshot>) -> Self {
        Self {
            receiver,
            started: false,
            finished: false,
        }
    }

    pub fn current(&self) -> JobSnapshot {
        self.receiver.borrow().clone()
    }

    /// The current snapshot on the first call, then each newer one. Returns
    /// `None` after the terminal snapshot has been delivered.
    pub async fn next(&mut self) -> Option<JobSnapshot> {
        if self.finished {
            return None;
        }
        if self.started && self.receiver.changed().await.is_err() {
            self.finished = true;
            return None;
        }
        self.started = true;
        let snapshot = self.receiver.borrow_and_update().clone();
        if snapshot.state.is_terminal() {
            self.finished = true;
        }
        Some(snapshot)
    }

    /// Waits for the terminal snapshot.
    pub async fn finished(mut self) -> JobSnapshot {
        let mut last = self.current();
        while let Some(snapshot) = self.next().await {
            last = snapshot;
        }
        last
    }
}

#[derive(Clone)]
pub struct PredictionPipeline {
    scanner: Arc<FeatureScanner>,
    scorer: Arc<dyn TraitScorer>,
    scorer_timeout: Duration,
}

impl fmt::Debug for PredictionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionPipeline")
            .field("scorer_timeout", &self.scorer_timeout)
            .finish_non_exhaustive()
    }
}

impl PredictionPipeline {
    pub fn new(
        scanner: Arc<FeatureScanner>,
        scorer: Arc<dyn TraitScorer>,
        scorer_timeout: Duration,
    ) -> Self {
        Self {
            scanner,
            scorer,
            scorer_timeout,
        }
    }

    /// Drives `job` to a terminal state.
    pub async fn run(&self, job: Arc<PredictionJob>) {
        let span = tracing::info_span!(
            "prediction",
            job_id = %job.id(),
            fingerprint = %job.fingerprint()
        );
        async {
            match self.execute(&job).await {
                Ok(Some(report)) => {
                    job.complete(report);
                    info!("prediction completed");
                }
                Ok(None) => {
                    job.mark_cancelled();
                    warn!("prediction cancelled");
                }
                Err(e) => {
                    warn!(error = %e, "prediction failed");
                    job.fail(e);
                }
            }
        }
        .instrument(span)
        .await
    }

    /// `Ok(None)` means the job observed its cancellation flag.
    async fn execute(&self, job: &PredictionJob) -> Result<Option<PredictionReport>> {
        let request = job.request();

        if job.is_cancelled() {
            return Ok(None);
        }
        job.advance(JobState::AnalyzingA, 10);
        let facts_a = self.analyze(request.sample_a.clone()).await?;
        job.advance(JobState::AnalyzingA, 25);

        if job.is_cancelled() {
            return Ok(None);
        }
        job.advance(JobState::AnalyzingB, 45);
        let facts_b = self.analyze(request.sample_b.clone()).await?;
        job.advance(JobState::AnalyzingB, 65);

        if job.is_cancelled() {
            return Ok(None);
        }
        job.advance(JobState::Scoring, 80);
        let scoring = tokio::time::timeout(
            self.scorer_timeout,
            self.scorer.score(&facts_a, &facts_b, request.trait_id),
        );
        let score = tokio::select! {
            biased;
            _ = job.cancel_requested() => return Ok(None),
            outcome = scoring => match outcome {
                Ok(score) => score?,
                Err(_) => {
                    return Err(VirtuGeneError::ScoringUnavailable {
                        reason: format!(
                            "scorer did not respond within {} ms",
                            self.scorer_timeout.as_millis()
                        ),
                    });
                }
            },
        };
        job.advance(JobState::Scoring, 95);

        if job.is_cancelled() {
            return Ok(None);
        }
        job.advance(JobState::Finalizing, 95);
        Ok(Some(PredictionReport::assemble(request, score)))
    }

    async fn analyze(&self, sample: SpeciesSample) -> Result<AnalysisFacts> {
        let scanner = Arc::clone(&self.scanner);
        tokio::task::spawn_blocking(move || AnalysisFacts::analyze(&sample, &scanner))
            .await
            .map_err(|e| VirtuGeneError::Internal {
                message: format!("analysis task failed: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dna_sequence::Sequence, trait_scorer::{HeuristicTraitScorer, ScoreFuture}};
    use tokio::sync::Semaphore;

    fn sample(name: &str, seq: &str) -> SpeciesSample {
        SpeciesSample {
            name: name.to_string(),
            sequence: Sequence::parse(seq).unwrap(),
        }
    }

    fn request() -> PredictionRequest {
        PredictionRequest {
            sample_a: sample("Homo sapiens", "ATGAAATAAGAATTC"),
            sample_b: sample("Mus musculus", "ATGGGGCCCTGAGAATTC"),
            trait_id: TraitId::DiseaseResistance,
        }
    }

    fn pipeline(scorer: Arc<dyn TraitScorer>, timeout: Duration) -> PredictionPipeline {
        PredictionPipeline::new(Arc::new(FeatureScanner::default()), scorer, timeout)
    }

    struct FailingScorer;

    impl TraitScorer for FailingScorer {
        fn score<'a>(&'a self, _: &'a AnalysisFacts, _: &'a AnalysisFacts, _: TraitId) -> ScoreFuture<'a> {
            Box::pin(async {
                Err(VirtuGeneError::ScoringUnavailable {
                    reason: "model offline".to_string(),
                })
            })
        }
    }

    /// Waits for a permit before delegating to the heuristic scorer.
    struct GatedScorer(Arc<Semaphore>);

    impl TraitScorer for GatedScorer {
        fn score<'a>(&'a self, a: &'a AnalysisFacts, b: &'a AnalysisFacts, t: TraitId) -> ScoreFuture<'a> {
            Box::pin(async move {
                let _permit = self.0.acquire().await.map_err(|e| VirtuGeneError::Internal {
                    message: e.to_string(),
                })?;
                Ok(HeuristicTraitScorer::evaluate(a, b, t))
            })
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint("Homo sapiens", "Mus musculus", TraitId::DiseaseResistance);
        let b = fingerprint("Homo sapiens", "Mus musculus", TraitId::DiseaseResistance);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert_ne!(a, fingerprint("Mus musculus", "Homo sapiens", TraitId::DiseaseResistance));
        assert_ne!(a, fingerprint("Homo sapiens", "Mus musculus", TraitId::GrowthRate));
        assert_eq!(request().fingerprint(), a);
    }

    #[test]
    fn test_report_dedups_markers() {
        let score = TraitScore {
            expression_delta: -12.345,
            stability: StabilityClass::Medium,
            side_effects: SideEffectClass::Minimal,
            viability: 180,
            markers: vec!["EcoRI".into(), "ORF-Hs-f0:0-9".into(), "EcoRI".into()],
        };
        let report = PredictionReport::assemble(&request(), score);
        assert_eq!(report.trait_name, "Disease Resistance");
        assert_eq!(report.expression_delta, -12.3);
        assert_eq!(report.viability, 100);
        assert_eq!(report.markers, vec!["EcoRI", "ORF-Hs-f0:0-9"]);
        assert!(report.narrative.contains("lower expression by 12.3%"));
        assert!(report.narrative.contains("medium stability"));
    }

    #[test]
    fn test_publish_is_monotonic_and_final() {
        let job = PredictionJob::new("job-1".into(), request());
        job.advance(JobState::AnalyzingA, 25);
        job.advance(JobState::AnalyzingA, 10);
        assert_eq!(job.snapshot().progress, 25);

        job.mark_cancelled();
        assert!(job.finished_for().is_some());
        job.advance(JobState::Scoring, 80);
        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Cancelled);
        assert_eq!(snapshot.progress, 25);
    }

    #[tokio::test]
    async fn test_pipeline_completes() {
        let job = Arc::new(PredictionJob::new("job-1".into(), request()));
        let mut watcher = job.watch();
        pipeline(Arc::new(HeuristicTraitScorer), Duration::from_secs(5))
            .run(Arc::clone(&job))
            .await;

        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Completed);
        assert_eq!(snapshot.progress, 100);
        let report = snapshot.report.unwrap();
        assert_eq!(report.species1, "Homo sapiens");
        assert!(report.markers.contains(&"EcoRI".to_string()));

        // Attached before the run, drained after it: only the final value remains.
        let first = watcher.next().await.unwrap();
        assert_eq!(first.state, JobState::Completed);
        assert!(watcher.next().await.is_none());
    }

    #[tokio::test]
    async fn test_scorer_failure_keeps_progress() {
        let job = Arc::new(PredictionJob::new("job-2".into(), request()));
        pipeline(Arc::new(FailingScorer), Duration::from_secs(5))
            .run(Arc::clone(&job))
            .await;
        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.progress, 80);
        assert_eq!(
            snapshot.error,
            Some(VirtuGeneError::ScoringUnavailable {
                reason: "model offline".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_scorer_timeout() {
        let gate = Arc::new(Semaphore::new(0));
        let job = Arc::new(PredictionJob::new("job-3".into(), request()));
        pipeline(Arc::new(GatedScorer(gate)), Duration::from_millis(20))
            .run(Arc::clone(&job))
            .await;
        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Failed);
        assert!(matches!(
            snapshot.error,
            Some(VirtuGeneError::ScoringUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let job = Arc::new(PredictionJob::new("job-4".into(), request()));
        job.cancel();
        pipeline(Arc::new(HeuristicTraitScorer), Duration::from_secs(5))
            .run(Arc::clone(&job))
            .await;
        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Cancelled);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.report.is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_scoring() {
        let gate = Arc::new(Semaphore::new(0));
        let job = Arc::new(PredictionJob::new("job-5".into(), request()));
        let runner = pipeline(Arc::new(GatedScorer(gate)), Duration::from_secs(30));
        let task = tokio::spawn({
            let job = Arc::clone(&job);
            async move { runner.run(job).await }
        });

        let mut watcher = job.watch();
        while let Some(snapshot) = watcher.next().await {
            if snapshot.state == JobState::Scoring {
                break;
            }
        }
        job.cancel();
        task.await.unwrap();

        let snapshot = job.snapshot();
        assert_eq!(snapshot.state, JobState::Cancelled);
        assert_eq!(snapshot.progress, 80);
    }

    #[test]
    fn test_cancel_between_analysis_stages() {
        // One blocking thread, held busy, keeps the first analysis queued
        // until the cancel has been issued.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(1)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let (release, held) = std::sync::mpsc::channel::<()>();
            let mut release = Some(release);
            let blocker = tokio::task::spawn_blocking(move || held.recv());

            let job = Arc::new(PredictionJob::new("job-6".into(), request()));
            let runner = pipeline(Arc::new(HeuristicTraitScorer), Duration::from_secs(5));
            let task = tokio::spawn({
                let job = Arc::clone(&job);
                async move { runner.run(job).await }
            });

            let mut watcher = job.watch();
            let mut states = vec![];
            while let Some(snapshot) = watcher.next().await {
                states.push(snapshot.state);
                if snapshot.state == JobState::AnalyzingA {
                    if let Some(release) = release.take() {
                        job.cancel();
                        release.send(()).unwrap();
                    }
                }
            }
            task.await.unwrap();
            blocker.await.unwrap().unwrap();

            assert!(states.contains(&JobState::AnalyzingA));
            assert!(!states.contains(&JobState::AnalyzingB));
            assert!(!states.contains(&JobState::Scoring));
            assert_eq!(states.last(), Some(&JobState::Cancelled));
            let snapshot = job.snapshot();
            assert_eq!(snapshot.state, JobState::Cancelled);
            assert_eq!(snapshot.progress, 25);
            assert!(snapshot.report.is_none());
        });
    }
}
