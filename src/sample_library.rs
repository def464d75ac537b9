//! Resolution of species names to sequences for the prediction pipeline.
//!
//! File import and remote database fetches live outside this crate; they plug
//! in by implementing [`SequenceSource`] or by inserting sequences into a
//! [`SampleLibrary`].

use crate::{
    catalog::Species,
    dna_sequence::Sequence,
    error::{Result, VirtuGeneError},
};
use rand::{SeedableRng, rngs::StdRng};
use sha1::{Digest, Sha1};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeciesSample {
    /// Canonical species name, used for fingerprinting and reports.
    pub name: String,
    pub sequence: Sequence,
}

pub trait SequenceSource: Send + Sync {
    fn resolve(&self, name: &str) -> Result<SpeciesSample>;
}

fn library_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Stable 64-bit seed from a species name.
pub fn seed_for_name(name: &str) -> u64 {
    Sha1::digest(name.as_bytes())
        .iter()
        .take(8)
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

#[derive(Debug)]
pub struct SampleLibrary {
    custom: RwLock<HashMap<String, SpeciesSample>>,
    min_len: usize,
    max_len: usize,
}

impl SampleLibrary {
    pub fn new(min_len: usize, max_len: usize) -> Result<Self> {
        if min_len == 0 || min_len > max_len {
            return Err(VirtuGeneError::InvalidLengthRange {
                min: min_len,
                max: max_len,
            });
        }
        Ok(Self {
            custom: RwLock::new(HashMap::new()),
            min_len,
            max_len,
        })
    }

    /// Registers an explicit sequence; it takes precedence over the
    /// generated catalog sample of the same name.
    pub fn insert(&self, name: &str, sequence: Sequence) {
        let canonical = Species::from_label(name)
            .map(|sp| sp.scientific_name().to_string())
            .unwrap_or_else(|_| name.trim().to_string());
        let sample = SpeciesSample {
            name: canonical.clone(),
            sequence,
        };
        self.custom
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(library_key(&canonical), sample);
    }

    pub fn len(&self) -> usize {
        self.custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn catalog_sample(&self, species: Species) -> Result<SpeciesSample> {
        let name = species.scientific_name();
        let mut rng = StdRng::seed_from_u64(seed_for_name(name));
        Ok(SpeciesSample {
            name: name.to_string(),
            sequence: Sequence::generate_random(self.min_len, self.max_len, &mut rng)?,
        })
    }
}

impl SequenceSource for SampleLibrary {
    fn resolve(&self, name: &str) -> Result<SpeciesSample> {
        let species = Species::from_label(name).ok();
        let key = species
            .map(|sp| library_key(sp.scientific_name()))
            .unwrap_or_else(|| library_key(name));
        if let Some(sample) = self
            .custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(sample.clone());
        }
        match species {
            Some(species) => self.catalog_sample(species),
            None => Err(VirtuGeneError::UnknownSpecies {
                name: name.to_string(),
            }),
        }
    }
}
