use crate::restriction_enzyme::RestrictionEnzyme;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

const BUILTIN_ENZYMES_JSON: &str = include_str!("../assets/enzymes.json");

/// One row of an enzyme table; only restriction enzymes are understood.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum EnzymeRow {
    Restriction(RestrictionEnzyme),
}

#[derive(Clone, Debug, Default)]
pub struct Enzymes {
    restriction_enzymes: Vec<RestrictionEnzyme>,
}

impl Enzymes {
    pub fn from_json_text(json_text: &str) -> Result<Self> {
        let rows: Vec<EnzymeRow> =
            serde_json::from_str(json_text).context("Enzyme table is not a list of known enzyme rows")?;
        let restriction_enzymes = rows
            .into_iter()
            .map(|EnzymeRow::Restriction(mut re)| {
                if !re.is_valid_motif() {
                    return Err(anyhow!(
                        "Restriction enzyme '{}' has invalid motif '{}'",
                        re.name,
                        re.sequence
                    ));
                }
                re.check_palindromic();
                Ok(re)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            restriction_enzymes,
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json_text(BUILTIN_ENZYMES_JSON)
    }

    pub fn restriction_enzymes(&self) -> &[RestrictionEnzyme] {
        &self.restriction_enzymes
    }

    pub fn names(&self) -> Vec<String> {
        self.restriction_enzymes
            .iter()
            .map(|re| re.name.to_owned())
            .collect()
    }

    pub fn longest_motif(&self) -> usize {
        self.restriction_enzymes
            .iter()
            .map(|re| re.sequence.len())
            .max()
            .unwrap_or(0)
    }
}

pub fn load_restriction_enzymes_from_path(path: &str) -> Result<Vec<RestrictionEnzyme>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Could not read '{path}'"))?;
    Ok(Enzymes::from_json_text(&text)?.restriction_enzymes)
}
