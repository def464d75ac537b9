//! The trait-scoring capability consumed by the prediction pipeline.
//!
//! Real scorers are remote or model-backed services injected by the caller.
//! [`HeuristicTraitScorer`] derives a score from sequence facts alone and is
//! what the command line tool uses when nothing else is configured.

use crate::{
    catalog::TraitId,
    error::Result,
    features::{Feature, FeatureScanner, FeatureSet},
    gc_contents::{CompositionStats, round_one_decimal},
    sample_library::SpeciesSample,
};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, pin::Pin};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StabilityClass {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SideEffectClass {
    None,
    Minimal,
    Moderate,
    Severe,
}

impl fmt::Display for StabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for SideEffectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Verified facts about one species' sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFacts {
    pub species: String,
    pub composition: CompositionStats,
    pub features: FeatureSet,
}

impl AnalysisFacts {
    /// Composition and feature scanning are independent and run side by side.
    pub fn analyze(sample: &SpeciesSample, scanner: &FeatureScanner) -> Self {
        let (composition, features) = rayon::join(
            || CompositionStats::analyze(&sample.sequence),
            || scanner.scan(&sample.sequence),
        );
        Self {
            species: sample.name.to_owned(),
            composition,
            features,
        }
    }

    pub fn length(&self) -> usize {
        self.composition.length
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    /// Signed percentage change in expression.
    pub expression_delta: f64,
    pub stability: StabilityClass,
    pub side_effects: SideEffectClass,
    /// Values above 100 are clamped when the report is built.
    pub viability: u8,
    pub markers: Vec<String>,
}

pub type ScoreFuture<'a> = Pin<Box<dyn Future<Output = Result<TraitScore>> + Send + 'a>>;

/// Maps the facts of two sequences and a trait to a score.
///
/// Implementations may be slow or fail; failures should be reported as
/// `VirtuGeneError::ScoringUnavailable`.
pub trait TraitScorer: Send + Sync {
    fn score<'a>(
        &'a self,
        facts_a: &'a AnalysisFacts,
        facts_b: &'a AnalysisFacts,
        trait_id: TraitId,
    ) -> ScoreFuture<'a>;
}

#[derive(Clone, Debug, Default)]
pub struct HeuristicTraitScorer;

impl HeuristicTraitScorer {
    fn trait_weight(trait_id: TraitId) -> f64 {
        match trait_id {
            TraitId::DiseaseResistance => 1.2,
            TraitId::GrowthRate => 1.0,
            TraitId::StressTolerance => 1.1,
            TraitId::MetabolicEfficiency => 0.9,
            TraitId::Longevity => 0.6,
            TraitId::CognitiveFunction => 0.5,
            TraitId::PhysicalStrength => 0.8,
            TraitId::SensoryPerception => 0.7,
            TraitId::ReproductiveSuccess => 1.0,
            TraitId::EnvironmentalAdaptation => 1.3,
        }
    }

    /// Fraction of the sequence covered by ORFs, overlaps counted once per ORF.
    fn coding_density(facts: &AnalysisFacts) -> f64 {
        let covered: usize = facts.features.orfs().map(|f| f.end() - f.position()).sum();
        (covered as f64 / facts.length().max(1) as f64).min(1.0)
    }

    fn orf_marker(facts: &AnalysisFacts) -> Option<String> {
        let prefix: String = facts
            .species
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .collect();
        match facts.features.longest_orf()? {
            Feature::Orf { start, end, frame } => {
                Some(format!("ORF-{prefix}-f{frame}:{start}-{end}"))
            }
            _ => None,
        }
    }

    pub fn evaluate(facts_a: &AnalysisFacts, facts_b: &AnalysisFacts, trait_id: TraitId) -> TraitScore {
        let gc_gap = (facts_a.composition.gc_percent - facts_b.composition.gc_percent).abs();
        let density = Self::coding_density(facts_a) + Self::coding_density(facts_b);
        let expression_delta =
            round_one_decimal(density * 50.0 * Self::trait_weight(trait_id) - gc_gap);

        let stability = if gc_gap < 5.0 {
            StabilityClass::High
        } else if gc_gap < 15.0 {
            StabilityClass::Medium
        } else {
            StabilityClass::Low
        };

        let sites = facts_a.features.restriction_site_count() + facts_b.features.restriction_site_count();
        let total_len = (facts_a.length() + facts_b.length()).max(1);
        let sites_per_kb = sites as f64 * 1000.0 / total_len as f64;
        let (side_effects, penalty) = if sites_per_kb < 1.0 {
            (SideEffectClass::None, 0.0)
        } else if sites_per_kb < 4.0 {
            (SideEffectClass::Minimal, 5.0)
        } else if sites_per_kb < 8.0 {
            (SideEffectClass::Moderate, 15.0)
        } else {
            (SideEffectClass::Severe, 30.0)
        };
        let viability = (100.0 - gc_gap * 2.0 - penalty).round().clamp(0.0, 100.0) as u8;

        let shared_a = facts_a.features.restriction_enzyme_names();
        let shared_b = facts_b.features.restriction_enzyme_names();
        let mut markers: Vec<String> = shared_a
            .into_iter()
            .filter(|name| shared_b.contains(name))
            .collect();
        markers.extend(Self::orf_marker(facts_a));
        markers.extend(Self::orf_marker(facts_b));

        TraitScore {
            expression_delta,
            stability,
            side_effects,
            viability,
            markers,
        }
    }
}

impl TraitScorer for HeuristicTraitScorer {
    fn score<'a>(
        &'a self,
        facts_a: &'a AnalysisFacts,
        facts_b: &'a AnalysisFacts,
        trait_id: TraitId,
    ) -> ScoreFuture<'a> {
        Box::pin(async move { Ok(Self::evaluate(facts_a, facts_b, trait_id)) })
    }
}
