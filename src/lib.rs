use amino_acids::AminoAcids;
use enzymes::Enzymes;
use lazy_static::lazy_static;

pub mod amino_acids;
pub mod catalog;
pub mod codon_optimizer;
pub mod dna_sequence;
pub mod engine;
pub mod enzymes;
pub mod error;
pub mod features;
pub mod gc_contents;
pub mod iupac_code;
pub mod job_registry;
pub mod logging;
pub mod open_reading_frame;
pub mod prediction;
pub mod restriction_enzyme;
pub mod sample_library;
pub mod trait_scorer;

pub use error::{ErrorCode, Result, VirtuGeneError};

lazy_static! {
    // Built-in restriction enzymes
    pub static ref ENZYMES: Enzymes = Enzymes::builtin().unwrap_or_else(|e| {
        tracing::error!("Could not load built-in restriction enzymes: {e}");
        Enzymes::default()
    });

    // Genetic code and per-host codon preferences
    pub static ref AMINO_ACIDS: AminoAcids = AminoAcids::load().unwrap_or_else(|e| {
        tracing::error!("Could not load codon catalog: {e}");
        AminoAcids::default()
    });
}
