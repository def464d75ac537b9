//! Structural features of a sequence: codons, open reading frames and
//! restriction sites, merged into one stably ordered [`FeatureSet`].

use crate::{
    ENZYMES,
    dna_sequence::Sequence,
    open_reading_frame::{CODON_SIZE, CodonKind, OpenReadingFrame},
    restriction_enzyme::RestrictionEnzyme,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Feature {
    Orf {
        start: usize,
        end: usize,
        frame: u8,
    },
    StartCodon {
        position: usize,
    },
    StopCodon {
        position: usize,
    },
    RestrictionSite {
        name: String,
        position: usize,
        length: usize,
    },
}

impl Feature {
    pub fn position(&self) -> usize {
        match self {
            Feature::Orf { start, .. } => *start,
            Feature::StartCodon { position }
            | Feature::StopCodon { position }
            | Feature::RestrictionSite { position, .. } => *position,
        }
    }

    /// Exclusive end offset of the feature's span.
    pub fn end(&self) -> usize {
        match self {
            Feature::Orf { end, .. } => *end,
            Feature::StartCodon { position } | Feature::StopCodon { position } => {
                position + CODON_SIZE
            }
            Feature::RestrictionSite {
                position, length, ..
            } => position + length,
        }
    }

    /// Tie-break order at equal positions.
    fn priority(&self) -> u8 {
        match self {
            Feature::Orf { .. } => 0,
            Feature::StartCodon { .. } => 1,
            Feature::StopCodon { .. } => 2,
            Feature::RestrictionSite { .. } => 3,
        }
    }

    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.position()
            .cmp(&other.position())
            .then_with(|| self.priority().cmp(&other.priority()))
            .then_with(|| self.end().cmp(&other.end()))
            .then_with(|| match (self, other) {
                (
                    Feature::RestrictionSite { name: a, .. },
                    Feature::RestrictionSite { name: b, .. },
                ) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(mut features: Vec<Feature>) -> Self {
        features.sort_by(Feature::stable_cmp);
        Self { features }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn orfs(&self) -> impl Iterator<Item = &Feature> {
        self.iter().filter(|f| matches!(f, Feature::Orf { .. }))
    }

    pub fn orf_count(&self) -> usize {
        self.orfs().count()
    }

    pub fn start_codon_count(&self) -> usize {
        self.iter()
            .filter(|f| matches!(f, Feature::StartCodon { .. }))
            .count()
    }

    pub fn stop_codon_count(&self) -> usize {
        self.iter()
            .filter(|f| matches!(f, Feature::StopCodon { .. }))
            .count()
    }

    pub fn restriction_site_count(&self) -> usize {
        self.iter()
            .filter(|f| matches!(f, Feature::RestrictionSite { .. }))
            .count()
    }

    /// Sorted, de-duplicated names of enzymes that cut at least once.
    pub fn restriction_enzyme_names(&self) -> Vec<String> {
        self.iter()
            .filter_map(|f| match f {
                Feature::RestrictionSite { name, .. } => Some(name.to_owned()),
                _ => None,
            })
            .sorted()
            .dedup()
            .collect()
    }

    /// Longest ORF; the earliest one wins ties.
    pub fn longest_orf(&self) -> Option<&Feature> {
        let mut best: Option<&Feature> = None;
        for orf in self.orfs() {
            let span = orf.end() - orf.position();
            if best.is_none_or(|b| span > b.end() - b.position()) {
                best = Some(orf);
            }
        }
        best
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    pub min_orf_codons: usize,
}

#[derive(Clone, Debug)]
pub struct FeatureScanner {
    restriction_enzymes: Vec<RestrictionEnzyme>,
    options: ScanOptions,
}

impl Default for FeatureScanner {
    fn default() -> Self {
        Self::new(ENZYMES.restriction_enzymes().to_vec(), ScanOptions::default())
    }
}

impl FeatureScanner {
    pub fn new(restriction_enzymes: Vec<RestrictionEnzyme>, options: ScanOptions) -> Self {
        Self {
            restriction_enzymes,
            options,
        }
    }

    pub fn restriction_enzymes(&self) -> &[RestrictionEnzyme] {
        &self.restriction_enzymes
    }

    pub fn scan(&self, seq: &Sequence) -> FeatureSet {
        let frames = OpenReadingFrame::scan_frames(seq.as_bytes(), self.options.min_orf_codons);

        let mut features: Vec<Feature> = frames
            .orfs
            .iter()
            .map(|orf| Feature::Orf {
                start: orf.from(),
                end: orf.to(),
                frame: orf.frame(),
            })
            .collect();

        features.extend(frames.codons.iter().map(|hit| match hit.kind {
            CodonKind::Start => Feature::StartCodon {
                position: hit.position,
            },
            CodonKind::Stop => Feature::StopCodon {
                position: hit.position,
            },
        }));

        features.extend(
            self.restriction_enzymes
                .iter()
                .flat_map(|re| re.get_sites(seq))
                .map(|site| Feature::RestrictionSite {
                    name: site.enzyme,
                    position: site.offset,
                    length: site.length,
                }),
        );

        FeatureSet::new(features)
    }
}

/// Scans with the built-in restriction table and default options.
pub fn scan(seq: &Sequence) -> FeatureSet {
    FeatureScanner::default().scan(seq)
}
