use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use virtugene::{
    VirtuGeneError,
    catalog::TraitId,
    engine::{EngineParameters, GenomicEngine},
    job_registry::JobRegistry,
    prediction::{JobSnapshot, JobState},
    trait_scorer::{AnalysisFacts, HeuristicTraitScorer, ScoreFuture, TraitScorer},
};

/// Holds every scoring call until a permit is released.
struct GatedScorer(Arc<Semaphore>);

impl TraitScorer for GatedScorer {
    fn score<'a>(
        &'a self,
        facts_a: &'a AnalysisFacts,
        facts_b: &'a AnalysisFacts,
        trait_id: TraitId,
    ) -> ScoreFuture<'a> {
        Box::pin(async move {
            let _permit = self
                .0
                .acquire()
                .await
                .map_err(|e| VirtuGeneError::ScoringUnavailable {
                    reason: e.to_string(),
                })?;
            Ok(HeuristicTraitScorer::evaluate(facts_a, facts_b, trait_id))
        })
    }
}

fn registry(scorer: Arc<dyn TraitScorer>, parameters: EngineParameters) -> Arc<JobRegistry> {
    GenomicEngine::from_parameters(parameters)
        .unwrap()
        .prediction_registry(scorer)
        .unwrap()
}

fn small_samples() -> EngineParameters {
    EngineParameters {
        sample_min_len: 90,
        sample_max_len: 240,
        ..EngineParameters::default()
    }
}

async fn collect(registry: &JobRegistry, job_id: &str) -> Vec<JobSnapshot> {
    let mut watcher = registry.watch(job_id).unwrap();
    let mut seen = vec![];
    while let Some(snapshot) = watcher.next().await {
        seen.push(snapshot);
    }
    seen
}

fn assert_well_formed(seen: &[JobSnapshot]) {
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0].progress <= w[1].progress));
    let terminal: Vec<_> = seen.iter().filter(|s| s.state.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert!(seen.last().unwrap().state.is_terminal());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_is_monotonic_for_every_observer() {
    let gate = Arc::new(Semaphore::new(0));
    let registry = registry(Arc::new(GatedScorer(Arc::clone(&gate))), small_samples());
    let handle = registry
        .submit("Drosophila melanogaster", "Caenorhabditis elegans", "Longevity")
        .unwrap();

    let early = tokio::spawn({
        let registry = Arc::clone(&registry);
        let job_id = handle.job_id.clone();
        async move { collect(&registry, &job_id).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.add_permits(1);

    let early = early.await.unwrap();
    assert_well_formed(&early);
    let last = early.last().unwrap();
    assert_eq!(last.state, JobState::Completed);
    assert_eq!(last.progress, 100);

    // A late observer still receives the final snapshot.
    let late = collect(&registry, &handle.job_id).await;
    assert_eq!(late.len(), 1);
    assert_eq!(late[0], *last);
}

#[tokio::test]
async fn identical_requests_share_one_job() {
    let gate = Arc::new(Semaphore::new(0));
    let registry = registry(Arc::new(GatedScorer(Arc::clone(&gate))), small_samples());

    let first = registry
        .submit("Homo sapiens", "Mus musculus", "Disease Resistance")
        .unwrap();
    let second = registry
        .submit("Homo sapiens", "Mus musculus", "Disease Resistance")
        .unwrap();
    assert_eq!(first.job_id, second.job_id);
    assert_eq!(first.fingerprint, second.fingerprint);

    let other = registry
        .submit("Homo sapiens", "Mus musculus", "Growth Rate")
        .unwrap();
    assert_ne!(other.job_id, first.job_id);
    assert_eq!(registry.active_count(), 2);

    gate.add_permits(2);
    let seen = collect(&registry, &first.job_id).await;
    assert_well_formed(&seen);
    let report = seen.last().unwrap().report.clone().unwrap();
    assert_eq!(report.trait_name, "Disease Resistance");
    assert_eq!(report.species2, "Mus musculus");
    assert!(report.viability <= 100);
    let mut markers = report.markers.clone();
    markers.dedup();
    assert_eq!(markers.len(), report.markers.len());
}

#[tokio::test]
async fn evicted_jobs_are_replaced_by_new_ones() {
    let parameters = EngineParameters {
        retention_secs: 0,
        ..small_samples()
    };
    let registry = registry(Arc::new(HeuristicTraitScorer), parameters);
    let first = registry
        .submit("Zea mays", "Oryza sativa", "Growth Rate")
        .unwrap();
    assert_well_formed(&collect(&registry, &first.job_id).await);

    assert!(matches!(
        registry.status(&first.job_id),
        Err(VirtuGeneError::JobNotFound { .. })
    ));
    let second = registry
        .submit("Zea mays", "Oryza sativa", "Growth Rate")
        .unwrap();
    assert_ne!(first.job_id, second.job_id);
}

#[tokio::test]
async fn cancelling_a_finished_job_is_a_noop() {
    let registry = registry(Arc::new(HeuristicTraitScorer), small_samples());
    let handle = registry
        .submit("Escherichia coli", "Pseudomonas aeruginosa", "Metabolic Efficiency")
        .unwrap();
    collect(&registry, &handle.job_id).await;

    let before = registry.status(&handle.job_id).unwrap();
    registry.cancel(&handle.job_id).unwrap();
    registry.cancel(&handle.job_id).unwrap();
    assert_eq!(registry.status(&handle.job_id).unwrap(), before);
    assert_eq!(before.state, JobState::Completed);
}

#[tokio::test]
async fn slow_scorer_fails_with_scoring_unavailable() {
    let parameters = EngineParameters {
        scorer_timeout_ms: 10,
        ..small_samples()
    };
    let registry = registry(Arc::new(GatedScorer(Arc::new(Semaphore::new(0)))), parameters);
    let handle = registry
        .submit("Solanum lycopersicum", "Brassica oleracea", "Stress Tolerance")
        .unwrap();
    let seen = collect(&registry, &handle.job_id).await;
    assert_well_formed(&seen);

    let status = registry.status(&handle.job_id).unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.progress, 80);
    let error = status.error.unwrap();
    assert!(error.is_retryable());
    assert!(matches!(error, VirtuGeneError::ScoringUnavailable { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_submissions_create_a_single_job() {
    let gate = Arc::new(Semaphore::new(0));
    let registry = registry(Arc::new(GatedScorer(Arc::clone(&gate))), small_samples());

    let submitters: Vec<_> = (0..32)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.submit("Arabidopsis thaliana", "Zea mays", "Stress Tolerance")
            })
        })
        .collect();
    let mut handles = vec![];
    for submitter in submitters {
        handles.push(submitter.await.unwrap().unwrap());
    }

    let job_ids: std::collections::HashSet<_> = handles.iter().map(|h| h.job_id.clone()).collect();
    assert_eq!(job_ids.len(), 1);
    assert_eq!(handles.iter().filter(|h| !h.deduplicated).count(), 1);
    assert_eq!(registry.active_count(), 1);
    assert_eq!(registry.len(), 1);

    gate.add_permits(1);
    let seen = collect(&registry, &handles[0].job_id).await;
    assert_well_formed(&seen);
    assert_eq!(seen.last().unwrap().state, JobState::Completed);
}
