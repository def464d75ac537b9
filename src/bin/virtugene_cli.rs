//! Command line front end for the VirtuGene engine.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::{fs, path::PathBuf, sync::Arc};
use tracing::{info, warn};
use virtugene::{
    catalog::{ExpressionHost, Species, TraitId},
    codon_optimizer,
    dna_sequence::Sequence,
    engine::{Engine, EngineParameters, GenomicEngine, Operation, Workflow},
    features::FeatureSet,
    gc_contents::CompositionStats,
    logging::{LogConfig, LogFormat, init_logging},
    prediction::JobState,
    trait_scorer::HeuristicTraitScorer,
};

#[derive(Parser)]
#[command(
    name = "virtugene_cli",
    version,
    about = "Sequence analysis, codon optimisation and trait-transfer predictions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Engine parameter file (JSON).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format: pretty, compact or json.
    #[arg(long = "log-format", default_value = "pretty", global = true)]
    log_format: LogFormat,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Supported operations, hosts, species and traits.
    Capabilities,
    /// Species, traits and expression hosts known to the engine.
    Catalog,
    /// Apply one operation given as JSON (or @file.json).
    Op { json: String },
    /// Apply a workflow given as JSON (or @file.json).
    Workflow { json: String },
    /// Composition and features of a sequence (inline or @file, FASTA accepted).
    Analyze { sequence: String },
    /// Rewrite a sequence with the host's preferred codons.
    Optimize {
        sequence: String,
        #[arg(long, default_value = "E. coli")]
        host: String,
    },
    /// Generate a random sequence.
    Random {
        #[arg(long, default_value_t = 300)]
        min: usize,
        #[arg(long, default_value_t = 1000)]
        max: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Print as a FASTA record with this id.
        #[arg(long, value_name = "ID")]
        fasta: Option<String>,
    },
    /// Predict the effect of transferring a trait between two species.
    Predict {
        #[arg(long)]
        species1: String,
        #[arg(long)]
        species2: String,
        #[arg(long = "trait")]
        trait_name: String,
        /// Do not stream progress to stderr.
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Serialize)]
struct Catalog {
    species: Vec<String>,
    traits: Vec<String>,
    expression_hosts: Vec<String>,
}

#[derive(Serialize)]
struct Analysis {
    length: usize,
    composition: CompositionStats,
    features: FeatureSet,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

/// Inline text, or the contents of a file when prefixed with `@`.
fn load_text_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Could not read file '{path}'"))
        }
        None => Ok(value.to_string()),
    }
}

fn load_sequence_arg(value: &str) -> Result<Sequence> {
    let text = load_text_arg(value)?;
    if text.trim_start().starts_with('>') {
        let (id, sequence) = Sequence::read_fasta(text.as_bytes())?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("FASTA input contains no records"))?;
        info!(%id, length = sequence.len(), "read FASTA record");
        Ok(sequence)
    } else {
        Ok(Sequence::parse(&text)?)
    }
}

fn load_parameters(path: Option<&PathBuf>) -> Result<EngineParameters> {
    match path {
        Some(path) => {
            let path = path.to_string_lossy();
            Ok(EngineParameters::load_from_path(&path)?)
        }
        None => Ok(EngineParameters::default()),
    }
}

async fn predict(
    engine: &GenomicEngine,
    species1: &str,
    species2: &str,
    trait_name: &str,
    quiet: bool,
) -> Result<bool> {
    let registry = engine.prediction_registry(Arc::new(HeuristicTraitScorer))?;
    let sweeper = registry.spawn_sweeper(engine.parameters().sweep_interval());
    let handle = registry.submit(species1, species2, trait_name)?;
    let mut watcher = registry.watch(&handle.job_id)?;

    let mut last = watcher.current();
    while let Some(snapshot) = watcher.next().await {
        if !quiet {
            eprintln!("[{:>3}%] {}", snapshot.progress, snapshot.state);
        }
        last = snapshot;
    }
    sweeper.abort();

    match (last.state, last.report, last.error) {
        (JobState::Completed, Some(report), _) => {
            print_json(&report)?;
            Ok(true)
        }
        (state, _, error) => {
            let cause = error.map(|e| e.to_string()).unwrap_or_default();
            warn!(job_id = %handle.job_id, %state, %cause, "prediction did not complete");
            eprintln!("Prediction {state}: {cause}");
            Ok(false)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let parameters = load_parameters(cli.config.as_ref())?;
    let mut engine = GenomicEngine::from_parameters(parameters)?;

    match cli.command {
        Command::Capabilities => print_json(&engine.capabilities())?,
        Command::Catalog => print_json(&Catalog {
            species: Species::ALL.iter().map(|s| s.display_label()).collect(),
            traits: TraitId::ALL.iter().map(|t| t.to_string()).collect(),
            expression_hosts: ExpressionHost::ALL.iter().map(|h| h.to_string()).collect(),
        })?,
        Command::Op { json } => {
            let op: Operation = serde_json::from_str(&load_text_arg(&json)?)
                .context("Invalid operation JSON")?;
            print_json(&engine.apply(op)?)?;
        }
        Command::Workflow { json } => {
            let wf: Workflow = serde_json::from_str(&load_text_arg(&json)?)
                .context("Invalid workflow JSON")?;
            print_json(&engine.apply_workflow(wf)?)?;
        }
        Command::Analyze { sequence } => {
            let sequence = load_sequence_arg(&sequence)?;
            print_json(&Analysis {
                length: sequence.len(),
                composition: CompositionStats::analyze(&sequence),
                features: engine.scanner().scan(&sequence),
            })?;
        }
        Command::Optimize { sequence, host } => {
            let sequence = load_sequence_arg(&sequence)?;
            let host = ExpressionHost::from_label(&host)?;
            let optimized = codon_optimizer::optimize(&sequence, host)?;
            println!("{optimized}");
        }
        Command::Random {
            min,
            max,
            seed,
            fasta,
        } => {
            let sequence = match seed {
                Some(seed) => Sequence::generate_random(min, max, &mut StdRng::seed_from_u64(seed))?,
                None => Sequence::generate_random(min, max, &mut rand::thread_rng())?,
            };
            match fasta {
                Some(id) => print!("{}", sequence.to_fasta_string(&id, None)?),
                None => println!("{sequence}"),
            }
        }
        Command::Predict {
            species1,
            species2,
            trait_name,
            quiet,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Could not start async runtime")?;
            return runtime.block_on(predict(&engine, &species1, &species2, &trait_name, quiet));
        }
    }
    Ok(true)
}

fn main() {
    let cli = Cli::parse();
    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_log_file(cli.log_file.clone());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
