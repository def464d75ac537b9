use crate::{
    AMINO_ACIDS, ENZYMES,
    catalog::{ExpressionHost, Species, TraitId},
    codon_optimizer::{self, OptimizationSummary},
    dna_sequence::Sequence,
    enzymes,
    error::{Result, VirtuGeneError},
    features::{FeatureScanner, FeatureSet, ScanOptions},
    gc_contents::{CompositionStats, DEFAULT_GC_WINDOW, GcContents, GcRegion},
    job_registry::JobRegistry,
    prediction::PredictionPipeline,
    sample_library::{SampleLibrary, SequenceSource},
    trait_scorer::TraitScorer,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;

pub type OpId = String;
pub type RunId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParameters {
    /// How long finished prediction jobs stay queryable.
    pub retention_secs: u64,
    pub scorer_timeout_ms: u64,
    /// ORFs with fewer codons (start and stop included) are dropped.
    pub min_orf_codons: usize,
    pub sample_min_len: usize,
    pub sample_max_len: usize,
    pub gc_window: usize,
    pub sweep_interval_secs: u64,
    /// JSON restriction table replacing the built-in one.
    pub restriction_table: Option<String>,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            retention_secs: 600,
            scorer_timeout_ms: 30_000,
            min_orf_codons: 0,
            sample_min_len: 300,
            sample_max_len: 1000,
            gc_window: DEFAULT_GC_WINDOW,
            sweep_interval_secs: 30,
            restriction_table: None,
        }
    }
}

impl EngineParameters {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| VirtuGeneError::Io {
            message: format!("Could not read parameter file '{path}': {e}"),
        })?;
        let ret: Self = serde_json::from_str(&text).map_err(|e| VirtuGeneError::Config {
            message: format!("Could not parse parameter JSON '{path}': {e}"),
        })?;
        ret.validate()?;
        Ok(ret)
    }

    pub fn save_to_path(&self, path: &str) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| VirtuGeneError::Io {
            message: format!("Could not write parameter file '{path}': {e}"),
        })
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.sample_min_len == 0 {
            Some("sample_min_len must be >= 1".to_string())
        } else if self.sample_min_len > self.sample_max_len {
            Some(format!(
                "sample_min_len ({}) exceeds sample_max_len ({})",
                self.sample_min_len, self.sample_max_len
            ))
        } else if self.gc_window == 0 {
            Some("gc_window must be >= 1".to_string())
        } else if self.scorer_timeout_ms == 0 {
            Some("scorer_timeout_ms must be >= 1".to_string())
        } else if self.sweep_interval_secs == 0 {
            Some("sweep_interval_secs must be >= 1".to_string())
        } else {
            None
        };
        match problem {
            Some(message) => Err(VirtuGeneError::Config { message }),
            None => Ok(()),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.scorer_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    Analyze {
        sequence: String,
    },
    ScanFeatures {
        sequence: String,
    },
    OptimizeCodons {
        sequence: String,
        host: String,
    },
    GenerateRandom {
        min_len: usize,
        max_len: usize,
        seed: Option<u64>,
    },
    ReverseComplement {
        sequence: String,
    },
    ExportFasta {
        sequence: String,
        id: String,
        description: Option<String>,
    },
    GcProfile {
        sequence: String,
        window: Option<usize>,
    },
    SetParameter {
        name: String,
        value: serde_json::Value,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Analyze { .. } => "Analyze",
            Operation::ScanFeatures { .. } => "ScanFeatures",
            Operation::OptimizeCodons { .. } => "OptimizeCodons",
            Operation::GenerateRandom { .. } => "GenerateRandom",
            Operation::ReverseComplement { .. } => "ReverseComplement",
            Operation::ExportFasta { .. } => "ExportFasta",
            Operation::GcProfile { .. } => "GcProfile",
            Operation::SetParameter { .. } => "SetParameter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub run_id: RunId,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpOutput {
    Composition(CompositionStats),
    Features(FeatureSet),
    Sequence {
        sequence: String,
        length: usize,
    },
    Optimized {
        sequence: String,
        summary: OptimizationSummary,
    },
    Fasta {
        text: String,
    },
    GcProfile {
        window: usize,
        regions: Vec<GcRegion>,
    },
    Parameters(EngineParameters),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult {
    pub op_id: OpId,
    pub output: OpOutput,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub run_id: RunId,
    pub op: Operation,
    pub result: OpResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub protocol_version: String,
    pub supported_operations: Vec<String>,
    pub expression_hosts: Vec<String>,
    pub species: Vec<String>,
    pub traits: Vec<String>,
    pub restriction_enzymes: Vec<String>,
}

pub trait Engine {
    fn apply(&mut self, op: Operation) -> Result<OpResult>;
    fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>>;
    fn parameters(&self) -> &EngineParameters;
}

/// Synchronous sequence operations plus the factory for prediction jobs.
#[derive(Debug, Clone)]
pub struct GenomicEngine {
    parameters: EngineParameters,
    scanner: Arc<FeatureScanner>,
    journal: Vec<OperationRecord>,
    op_counter: u64,
}

impl Default for GenomicEngine {
    fn default() -> Self {
        Self {
            parameters: EngineParameters::default(),
            scanner: Arc::new(FeatureScanner::default()),
            journal: vec![],
            op_counter: 0,
        }
    }
}

impl GenomicEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: EngineParameters) -> Result<Self> {
        parameters.validate()?;
        let scanner = Arc::new(Self::build_scanner(&parameters)?);
        Ok(Self {
            parameters,
            scanner,
            ..Self::default()
        })
    }

    fn build_scanner(parameters: &EngineParameters) -> Result<FeatureScanner> {
        let restriction_enzymes = match &parameters.restriction_table {
            Some(path) => enzymes::load_restriction_enzymes_from_path(path).map_err(|e| {
                VirtuGeneError::Config {
                    message: format!("Could not load restriction table '{path}': {e}"),
                }
            })?,
            None => ENZYMES.restriction_enzymes().to_vec(),
        };
        Ok(FeatureScanner::new(
            restriction_enzymes,
            ScanOptions {
                min_orf_codons: parameters.min_orf_codons,
            },
        ))
    }

    /// Lists the enzymes of the active scanner, which may come from a custom
    /// `restriction_table`.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            protocol_version: "v1".to_string(),
            supported_operations: [
                "Analyze",
                "ScanFeatures",
                "OptimizeCodons",
                "GenerateRandom",
                "ReverseComplement",
                "ExportFasta",
                "GcProfile",
                "SetParameter",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            expression_hosts: ExpressionHost::ALL.iter().map(|h| h.to_string()).collect(),
            species: Species::ALL.iter().map(|s| s.display_label()).collect(),
            traits: TraitId::ALL.iter().map(|t| t.to_string()).collect(),
            restriction_enzymes: self
                .scanner
                .restriction_enzymes()
                .iter()
                .map(|re| re.name.to_owned())
                .collect(),
        }
    }

    pub fn scanner(&self) -> &FeatureScanner {
        &self.scanner
    }

    pub fn operation_log(&self) -> &[OperationRecord] {
        &self.journal
    }

    /// A registry running predictions with this engine's scanner and
    /// parameters, resolving species through a fresh [`SampleLibrary`].
    pub fn prediction_registry(&self, scorer: Arc<dyn TraitScorer>) -> Result<Arc<JobRegistry>> {
        let library = SampleLibrary::new(
            self.parameters.sample_min_len,
            self.parameters.sample_max_len,
        )?;
        Ok(self.prediction_registry_with_source(Arc::new(library), scorer))
    }

    pub fn prediction_registry_with_source(
        &self,
        source: Arc<dyn SequenceSource>,
        scorer: Arc<dyn TraitScorer>,
    ) -> Arc<JobRegistry> {
        let pipeline = PredictionPipeline::new(
            Arc::clone(&self.scanner),
            scorer,
            self.parameters.scorer_timeout(),
        );
        Arc::new(JobRegistry::new(source, pipeline, self.parameters.retention()))
    }

    fn next_op_id(&mut self) -> OpId {
        self.op_counter += 1;
        format!("op-{}", self.op_counter)
    }

    fn set_parameter(&mut self, name: &str, value: serde_json::Value) -> Result<EngineParameters> {
        let mut raw = serde_json::to_value(&self.parameters)?;
        let fields = raw.as_object_mut().ok_or_else(|| VirtuGeneError::Internal {
            message: "parameters did not serialize to an object".to_string(),
        })?;
        if !fields.contains_key(name) {
            return Err(VirtuGeneError::Config {
                message: format!("Unknown parameter '{name}'"),
            });
        }
        fields.insert(name.to_string(), value);
        let updated: EngineParameters = serde_json::from_value(raw)?;
        updated.validate()?;
        let scanner = Self::build_scanner(&updated)?;
        self.scanner = Arc::new(scanner);
        self.parameters = updated;
        Ok(self.parameters.clone())
    }

    fn apply_internal(&mut self, op: Operation) -> Result<OpResult> {
        let mut messages = vec![];
        let output = match op {
            Operation::Analyze { sequence } => {
                OpOutput::Composition(CompositionStats::analyze(&Sequence::parse(&sequence)?))
            }
            Operation::ScanFeatures { sequence } => {
                let features = self.scanner.scan(&Sequence::parse(&sequence)?);
                messages.push(format!(
                    "{} ORFs, {} restriction sites",
                    features.orf_count(),
                    features.restriction_site_count()
                ));
                OpOutput::Features(features)
            }
            Operation::OptimizeCodons { sequence, host } => {
                let host = ExpressionHost::from_label(&host)?;
                let (optimized, summary) =
                    codon_optimizer::optimize_with(&AMINO_ACIDS, &Sequence::parse(&sequence)?, host)?;
                messages.push(format!(
                    "Replaced {} of {} codons for {host}",
                    summary.substituted, summary.codons
                ));
                OpOutput::Optimized {
                    sequence: optimized.into(),
                    summary,
                }
            }
            Operation::GenerateRandom {
                min_len,
                max_len,
                seed,
            } => {
                let sequence = match seed {
                    Some(seed) => {
                        Sequence::generate_random(min_len, max_len, &mut StdRng::seed_from_u64(seed))?
                    }
                    None => Sequence::generate_random(min_len, max_len, &mut rand::thread_rng())?,
                };
                OpOutput::Sequence {
                    length: sequence.len(),
                    sequence: sequence.into(),
                }
            }
            Operation::ReverseComplement { sequence } => {
                let rc = Sequence::parse(&sequence)?.reverse_complement();
                OpOutput::Sequence {
                    length: rc.len(),
                    sequence: rc.into(),
                }
            }
            Operation::ExportFasta {
                sequence,
                id,
                description,
            } => OpOutput::Fasta {
                text: Sequence::parse(&sequence)?.to_fasta_string(&id, description.as_deref())?,
            },
            Operation::GcProfile { sequence, window } => {
                let window = window.unwrap_or(self.parameters.gc_window);
                if window == 0 {
                    return Err(VirtuGeneError::Config {
                        message: "GC window must be >= 1".to_string(),
                    });
                }
                let profile = GcContents::new_from_sequence(&Sequence::parse(&sequence)?, window);
                OpOutput::GcProfile {
                    window,
                    regions: profile.regions().to_vec(),
                }
            }
            Operation::SetParameter { name, value } => {
                let parameters = self.set_parameter(&name, value)?;
                messages.push(format!("Set parameter '{name}'"));
                OpOutput::Parameters(parameters)
            }
        };
        Ok(OpResult {
            op_id: self.next_op_id(),
            output,
            messages,
        })
    }
}

impl Engine for GenomicEngine {
    fn apply(&mut self, op: Operation) -> Result<OpResult> {
        self.apply_workflow(Workflow {
            run_id: "interactive".to_string(),
            ops: vec![op],
        })?
        .pop()
        .ok_or_else(|| VirtuGeneError::Internal {
            message: "operation produced no result".to_string(),
        })
    }

    fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>> {
        let mut results = Vec::with_capacity(wf.ops.len());
        for op in wf.ops {
            debug!(run_id = %wf.run_id, op = op.name(), "applying operation");
            let result = self.apply_internal(op.clone())?;
            self.journal.push(OperationRecord {
                run_id: wf.run_id.clone(),
                op,
                result: result.clone(),
            });
            results.push(result);
        }
        Ok(results)
    }

    fn parameters(&self) -> &EngineParameters {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features::Feature, prediction::JobState, trait_scorer::HeuristicTraitScorer};
    use tempfile::TempDir;

    #[test]
    fn test_parameters_roundtrip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        let path = path.to_str().unwrap();
        let params = EngineParameters {
            retention_secs: 5,
            min_orf_codons: 4,
            ..EngineParameters::default()
        };
        params.save_to_path(path).unwrap();
        assert_eq!(EngineParameters::load_from_path(path).unwrap(), params);
    }

    #[test]
    fn test_parameters_defaults_and_validation() {
        let params: EngineParameters = serde_json::from_str(r#"{"gc_window": 50}"#).unwrap();
        assert_eq!(params.gc_window, 50);
        assert_eq!(params.retention(), Duration::from_secs(600));
        assert_eq!(params.scorer_timeout(), Duration::from_secs(30));

        let bad = EngineParameters {
            sample_min_len: 10,
            sample_max_len: 5,
            ..EngineParameters::default()
        };
        assert!(matches!(bad.validate(), Err(VirtuGeneError::Config { .. })));
        assert!(GenomicEngine::from_parameters(bad).is_err());
    }

    #[test]
    fn test_missing_parameter_file() {
        assert!(matches!(
            EngineParameters::load_from_path("/nonexistent/virtugene.json"),
            Err(VirtuGeneError::Io { .. })
        ));
    }

    #[test]
    fn test_analyze_operation() {
        let mut engine = GenomicEngine::new();
        let res = engine
            .apply(Operation::Analyze {
                sequence: "atg aaa taa".to_string(),
            })
            .unwrap();
        assert_eq!(res.op_id, "op-1");
        match res.output {
            OpOutput::Composition(stats) => {
                assert_eq!(stats.length, 9);
                assert_eq!(stats.gc_percent, 11.1);
                assert_eq!(stats.at_percent, 88.9);
            }
            other => panic!("unexpected output {other:?}"),
        }
        assert_eq!(engine.operation_log().len(), 1);
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let mut engine = GenomicEngine::new();
        let err = engine
            .apply(Operation::ScanFeatures {
                sequence: "ATGXAA".to_string(),
            })
            .unwrap_err();
        assert_eq!(
            err,
            VirtuGeneError::InvalidAlphabet {
                character: 'X',
                position: 3
            }
        );
        assert!(engine.operation_log().is_empty());
    }

    #[test]
    fn test_workflow() {
        let mut engine = GenomicEngine::new();
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[
                {"OptimizeCodons": {"sequence": "TTACTTCGA", "host": "E. coli"}},
                {"ReverseComplement": {"sequence": "ATGC"}},
                {"GenerateRandom": {"min_len": 12, "max_len": 12, "seed": 7}},
                {"ExportFasta": {"sequence": "ATGAAATAA", "id": "orf1", "description": null}}
            ]"#,
        )
        .unwrap();
        let results = engine
            .apply_workflow(Workflow {
                run_id: "run-1".to_string(),
                ops,
            })
            .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0].output,
            OpOutput::Optimized {
                sequence: "CTGCTGCGC".to_string(),
                summary: OptimizationSummary {
                    host: ExpressionHost::EscherichiaColi,
                    codons: 3,
                    substituted: 3,
                }
            }
        );
        assert_eq!(
            results[1].output,
            OpOutput::Sequence {
                sequence: "GCAT".to_string(),
                length: 4
            }
        );
        assert!(matches!(&results[2].output, OpOutput::Sequence { length: 12, .. }));
        assert_eq!(
            results[3].output,
            OpOutput::Fasta {
                text: ">orf1\nATGAAATAA\n".to_string()
            }
        );
        assert!(engine.operation_log().iter().all(|r| r.run_id == "run-1"));
    }

    #[test]
    fn test_set_parameter_rebuilds_scanner() {
        let mut engine = GenomicEngine::new();
        let seq = "ATGTAAATGAAACCCTAA".to_string();
        let count_orfs = |engine: &mut GenomicEngine| match engine
            .apply(Operation::ScanFeatures {
                sequence: seq.clone(),
            })
            .unwrap()
            .output
        {
            OpOutput::Features(features) => features
                .iter()
                .filter(|f| matches!(f, Feature::Orf { .. }))
                .count(),
            _ => 0,
        };
        assert_eq!(count_orfs(&mut engine), 2);

        engine
            .apply(Operation::SetParameter {
                name: "min_orf_codons".to_string(),
                value: serde_json::json!(3),
            })
            .unwrap();
        assert_eq!(engine.parameters().min_orf_codons, 3);
        assert_eq!(count_orfs(&mut engine), 1);

        assert!(engine
            .apply(Operation::SetParameter {
                name: "gc_window".to_string(),
                value: serde_json::json!(0),
            })
            .is_err());
        assert!(engine
            .apply(Operation::SetParameter {
                name: "warp_factor".to_string(),
                value: serde_json::json!(9),
            })
            .is_err());
        assert_eq!(engine.parameters().gc_window, DEFAULT_GC_WINDOW);
    }

    #[test]
    fn test_gc_profile() {
        let mut engine = GenomicEngine::new();
        let res = engine
            .apply(Operation::GcProfile {
                sequence: "GGGGAAAA".to_string(),
                window: Some(4),
            })
            .unwrap();
        match res.output {
            OpOutput::GcProfile { window, regions } => {
                assert_eq!(window, 4);
                assert_eq!(regions.len(), 2);
                assert_eq!(regions[0].gc(), 1.0);
                assert_eq!(regions[1].gc(), 0.0);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_capabilities() {
        let caps = GenomicEngine::new().capabilities();
        assert_eq!(caps.supported_operations.len(), 8);
        assert_eq!(caps.species.len(), 16);
        assert_eq!(caps.traits.len(), 10);
        assert_eq!(caps.restriction_enzymes.len(), 18);
        assert!(caps.restriction_enzymes.contains(&"EcoRI".to_string()));
    }

    #[test]
    fn test_capabilities_follow_custom_enzyme_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enzymes.json");
        std::fs::write(
            &path,
            r#"[{"type":"restriction","name":"BsaI","sequence":"GGTCTC","cut":1,"overlap":4}]"#,
        )
        .unwrap();
        let engine = GenomicEngine::from_parameters(EngineParameters {
            restriction_table: Some(path.to_str().unwrap().to_string()),
            ..EngineParameters::default()
        })
        .unwrap();
        assert_eq!(engine.capabilities().restriction_enzymes, vec!["BsaI".to_string()]);
    }

    #[tokio::test]
    async fn test_prediction_registry() {
        let params = EngineParameters {
            sample_min_len: 60,
            sample_max_len: 90,
            ..EngineParameters::default()
        };
        let engine = GenomicEngine::from_parameters(params).unwrap();
        let registry = engine
            .prediction_registry(Arc::new(HeuristicTraitScorer))
            .unwrap();
        assert_eq!(registry.retention(), Duration::from_secs(600));
        let handle = registry
            .submit("Arabidopsis thaliana", "Oryza sativa", "Stress Tolerance")
            .unwrap();
        let snapshot = registry.watch(&handle.job_id).unwrap().finished().await;
        assert_eq!(snapshot.state, JobState::Completed);
        let report = snapshot.report.unwrap();
        assert_eq!(report.species1, "Arabidopsis thaliana");
        assert_eq!(report.trait_name, "Stress Tolerance");
    }
}
