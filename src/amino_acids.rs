use crate::catalog::ExpressionHost;
use anyhow::{Result, anyhow};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CODON_CATALOG_CSV: &str = include_str!("../assets/codon_catalog.csv");

/// Standard genetic code, codons ordered TCAG at each position.
const STANDARD_CODE: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

pub const STOP: char = '*';

#[inline(always)]
fn tcag_index(base: u8) -> Option<usize> {
    match base {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

/// One-letter amino acid for a codon, `*` for stop; `None` for anything
/// that is not three plain bases.
pub fn translate_codon(codon: &[u8]) -> Option<char> {
    let [a, b, c] = codon else {
        return None;
    };
    let idx = tcag_index(*a)? * 16 + tcag_index(*b)? * 4 + tcag_index(*c)?;
    Some(STANDARD_CODE[idx] as char)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AminoAcid {
    pub aa: char,
    pub tla: String,
    pub host_codons: HashMap<ExpressionHost, String>,
}

#[derive(Clone, Debug, Default)]
pub struct AminoAcids {
    aas: HashMap<char, AminoAcid>,
}

impl AminoAcids {
    pub fn load() -> Result<Self> {
        Self::from_csv_text(CODON_CATALOG_CSV)
    }

    /// Parses a catalog with columns `aa,tla,<organism>...`, one preferred
    /// codon per organism column.
    pub fn from_csv_text(csv_text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv_text.as_bytes());
        let hosts = rdr
            .headers()?
            .iter()
            .skip(2)
            .map(|organism| {
                ExpressionHost::ALL
                    .into_iter()
                    .find(|host| host.organism() == organism)
                    .ok_or(anyhow!("Unknown organism column '{organism}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ret = Self::default();
        for record in rdr.records() {
            let record = record?;
            let mut fields = record.iter();
            let aa = fields
                .next()
                .and_then(|s| s.chars().next())
                .ok_or(anyhow!("Missing amino acid letter in {record:?}"))?;
            let tla = fields
                .next()
                .ok_or(anyhow!("Missing three-letter code for '{aa}'"))?
                .to_string();
            let mut host_codons = HashMap::new();
            for (codon, host) in fields.zip(hosts.iter()) {
                let codon = codon.trim().to_ascii_uppercase();
                if translate_codon(codon.as_bytes()) != Some(aa) {
                    return Err(anyhow!(
                        "Codon '{codon}' for {host} does not encode '{aa}'"
                    ));
                }
                host_codons.insert(*host, codon);
            }
            ret.aas.insert(
                aa,
                AminoAcid {
                    aa,
                    tla,
                    host_codons,
                },
            );
        }
        Ok(ret)
    }

    pub fn get(&self, aa: char) -> Option<&AminoAcid> {
        self.aas.get(&aa)
    }

    pub fn len(&self) -> usize {
        self.aas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aas.is_empty()
    }

    pub fn preferred_codon(&self, aa: char, host: ExpressionHost) -> Option<&str> {
        self.get(aa)?.host_codons.get(&host).map(String::as_str)
    }
}
