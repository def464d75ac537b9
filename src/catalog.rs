//! Fixed option lists: catalog species, predictable traits and codon
//! optimisation hosts.

use crate::error::{Result, VirtuGeneError};
use serde::{Deserialize, Serialize};
use std::fmt;

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    HomoSapiens,
    PanTroglodytes,
    MusMusculus,
    DrosophilaMelanogaster,
    CaenorhabditisElegans,
    ArabidopsisThaliana,
    OryzaSativa,
    ZeaMays,
    EscherichiaColi,
    SaccharomycesCerevisiae,
    DanioRerio,
    XenopusLaevis,
    BacillusSubtilis,
    PseudomonasAeruginosa,
    SolanumLycopersicum,
    BrassicaOleracea,
}

impl Species {
    pub const ALL: [Species; 16] = [
        Species::HomoSapiens,
        Species::PanTroglodytes,
        Species::MusMusculus,
        Species::DrosophilaMelanogaster,
        Species::CaenorhabditisElegans,
        Species::ArabidopsisThaliana,
        Species::OryzaSativa,
        Species::ZeaMays,
        Species::EscherichiaColi,
        Species::SaccharomycesCerevisiae,
        Species::DanioRerio,
        Species::XenopusLaevis,
        Species::BacillusSubtilis,
        Species::PseudomonasAeruginosa,
        Species::SolanumLycopersicum,
        Species::BrassicaOleracea,
    ];

    pub fn scientific_name(&self) -> &'static str {
        match self {
            Species::HomoSapiens => "Homo sapiens",
            Species::PanTroglodytes => "Pan troglodytes",
            Species::MusMusculus => "Mus musculus",
            Species::DrosophilaMelanogaster => "Drosophila melanogaster",
            Species::CaenorhabditisElegans => "Caenorhabditis elegans",
            Species::ArabidopsisThaliana => "Arabidopsis thaliana",
            Species::OryzaSativa => "Oryza sativa",
            Species::ZeaMays => "Zea mays",
            Species::EscherichiaColi => "Escherichia coli",
            Species::SaccharomycesCerevisiae => "Saccharomyces cerevisiae",
            Species::DanioRerio => "Danio rerio",
            Species::XenopusLaevis => "Xenopus laevis",
            Species::BacillusSubtilis => "Bacillus subtilis",
            Species::PseudomonasAeruginosa => "Pseudomonas aeruginosa",
            Species::SolanumLycopersicum => "Solanum lycopersicum",
            Species::BrassicaOleracea => "Brassica oleracea",
        }
    }

    pub fn common_name(&self) -> &'static str {
        match self {
            Species::HomoSapiens => "Human",
            Species::PanTroglodytes => "Chimpanzee",
            Species::MusMusculus => "Mouse",
            Species::DrosophilaMelanogaster => "Fruit fly",
            Species::CaenorhabditisElegans => "Nematode",
            Species::ArabidopsisThaliana => "Thale cress",
            Species::OryzaSativa => "Rice",
            Species::ZeaMays => "Corn",
            Species::EscherichiaColi => "E. coli",
            Species::SaccharomycesCerevisiae => "Baker's yeast",
            Species::DanioRerio => "Zebrafish",
            Species::XenopusLaevis => "African clawed frog",
            Species::BacillusSubtilis => "Hay bacillus",
            Species::PseudomonasAeruginosa => "Pseudomonas",
            Species::SolanumLycopersicum => "Tomato",
            Species::BrassicaOleracea => "Wild cabbage",
        }
    }

    /// "Homo sapiens (Human)"
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.scientific_name(), self.common_name())
    }

    /// Accepts the scientific name or the "Scientific (Common)" label,
    /// case-insensitively.
    pub fn from_label(label: &str) -> Result<Self> {
        let wanted = normalize_label(label);
        Self::ALL
            .iter()
            .find(|sp| {
                normalize_label(sp.scientific_name()) == wanted
                    || normalize_label(&sp.display_label()) == wanted
            })
            .copied()
            .ok_or_else(|| VirtuGeneError::UnknownSpecies {
                name: label.to_string(),
            })
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scientific_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraitId {
    DiseaseResistance,
    GrowthRate,
    StressTolerance,
    MetabolicEfficiency,
    Longevity,
    CognitiveFunction,
    PhysicalStrength,
    SensoryPerception,
    ReproductiveSuccess,
    EnvironmentalAdaptation,
}

impl TraitId {
    pub const ALL: [TraitId; 10] = [
        TraitId::DiseaseResistance,
        TraitId::GrowthRate,
        TraitId::StressTolerance,
        TraitId::MetabolicEfficiency,
        TraitId::Longevity,
        TraitId::CognitiveFunction,
        TraitId::PhysicalStrength,
        TraitId::SensoryPerception,
        TraitId::ReproductiveSuccess,
        TraitId::EnvironmentalAdaptation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TraitId::DiseaseResistance => "Disease Resistance",
            TraitId::GrowthRate => "Growth Rate",
            TraitId::StressTolerance => "Stress Tolerance",
            TraitId::MetabolicEfficiency => "Metabolic Efficiency",
            TraitId::Longevity => "Longevity",
            TraitId::CognitiveFunction => "Cognitive Function",
            TraitId::PhysicalStrength => "Physical Strength",
            TraitId::SensoryPerception => "Sensory Perception",
            TraitId::ReproductiveSuccess => "Reproductive Success",
            TraitId::EnvironmentalAdaptation => "Environmental Adaptation",
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        let wanted = normalize_label(label);
        Self::ALL
            .iter()
            .find(|t| normalize_label(t.label()) == wanted)
            .copied()
            .ok_or_else(|| VirtuGeneError::UnknownTrait {
                name: label.to_string(),
            })
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Codon optimisation target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExpressionHost {
    EscherichiaColi,
    SaccharomycesCerevisiae,
    HomoSapiens,
    ArabidopsisThaliana,
}

impl ExpressionHost {
    pub const ALL: [ExpressionHost; 4] = [
        ExpressionHost::EscherichiaColi,
        ExpressionHost::SaccharomycesCerevisiae,
        ExpressionHost::HomoSapiens,
        ExpressionHost::ArabidopsisThaliana,
    ];

    /// Column header used in the codon catalog.
    pub fn organism(&self) -> &'static str {
        match self {
            ExpressionHost::EscherichiaColi => "Escherichia coli",
            ExpressionHost::SaccharomycesCerevisiae => "Saccharomyces cerevisiae",
            ExpressionHost::HomoSapiens => "Homo sapiens",
            ExpressionHost::ArabidopsisThaliana => "Arabidopsis thaliana",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ExpressionHost::EscherichiaColi => &["e. coli", "ecoli", "e.coli"],
            ExpressionHost::SaccharomycesCerevisiae => &["yeast", "s. cerevisiae"],
            ExpressionHost::HomoSapiens => &["mammalian", "human", "h. sapiens"],
            ExpressionHost::ArabidopsisThaliana => &["arabidopsis", "plant", "a. thaliana"],
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        let wanted = normalize_label(label);
        Self::ALL
            .iter()
            .find(|host| {
                normalize_label(host.organism()) == wanted
                    || host.aliases().iter().any(|alias| *alias == wanted)
            })
            .copied()
            .ok_or_else(|| VirtuGeneError::UnknownHost {
                name: label.to_string(),
            })
    }
}

impl fmt::Display for ExpressionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.organism())
    }
}
