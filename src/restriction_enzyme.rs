use serde::{Deserialize, Serialize};

use crate::{dna_sequence::Sequence, iupac_code::IupacCode};

/// A recognition motif, possibly with IUPAC ambiguity codes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestrictionEnzyme {
    pub name: String,
    pub sequence: String,
    pub note: Option<String>,
    pub cut: isize,
    pub overlap: isize,
    #[serde(skip_serializing, default)]
    is_palindromic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionEnzymeSite {
    pub offset: usize,
    pub length: usize,
    pub enzyme: String,
}

impl RestrictionEnzyme {
    pub fn new(name: &str, sequence: &str, cut: isize, overlap: isize) -> Self {
        let mut ret = Self {
            name: name.to_string(),
            sequence: sequence.to_ascii_uppercase(),
            note: None,
            cut,
            overlap,
            is_palindromic: false,
        };
        ret.check_palindromic();
        ret
    }

    pub fn check_palindromic(&mut self) {
        self.sequence = self.sequence.to_ascii_uppercase();
        self.is_palindromic = self.motif() == self.motif_rc();
    }

    pub fn is_palindromic(&self) -> bool {
        self.is_palindromic
    }

    pub fn is_valid_motif(&self) -> bool {
        !self.sequence.is_empty() && self.sequence.bytes().all(IupacCode::is_valid_letter)
    }

    fn motif(&self) -> Vec<IupacCode> {
        self.sequence.bytes().map(IupacCode::from_letter).collect()
    }

    fn motif_rc(&self) -> Vec<IupacCode> {
        self.sequence
            .bytes()
            .rev()
            .map(|b| IupacCode::from_letter(b).complement())
            .collect()
    }

    /// Every start offset where the motif matches; overlapping matches count.
    pub fn get_sites(&self, seq: &Sequence) -> Vec<RestrictionEnzymeSite> {
        let motif = self.motif();
        let forward = seq.as_bytes();
        if motif.is_empty() || motif.len() > forward.len() {
            return vec![];
        }
        forward
            .windows(motif.len())
            .enumerate()
            .filter(|(_, window)| {
                window
                    .iter()
                    .zip(motif.iter())
                    .all(|(&base, code)| code.matches(base))
            })
            .map(|(offset, _)| RestrictionEnzymeSite {
                offset,
                length: motif.len(),
                enzyme: self.name.to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &str) -> Sequence {
        Sequence::parse(s).unwrap()
    }

    #[test]
    fn test_restriction_enzyme() {
        let re = RestrictionEnzyme::new("EcoRI", "GAATTC", 1, 4);
        assert!(re.is_palindromic());
        let sites = re.get_sites(&seq("GAATTC"));
        assert_eq!(
            sites,
            vec![RestrictionEnzymeSite {
                offset: 0,
                length: 6,
                enzyme: "EcoRI".to_string()
            }]
        );
    }

    #[test]
    fn test_restriction_enzyme_sites() {
        let re = RestrictionEnzyme::new("EcoRI", "GAATTC", 1, 4);
        let sites = re.get_sites(&seq("GAATTCGAATTC"));
        let offsets: Vec<usize> = sites.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 6]);
    }

    #[test]
    fn test_overlapping_sites() {
        // GCGC repeats: every other offset matches.
        let re = RestrictionEnzyme::new("HhaI", "GCGC", 3, -2);
        let sites = re.get_sites(&seq("GCGCGCGC"));
        let offsets: Vec<usize> = sites.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[test]
    fn test_degenerate_motif() {
        let re = RestrictionEnzyme::new("HinfI", "GANTC", 1, 3);
        assert!(re.is_palindromic());
        let sites = re.get_sites(&seq("GAATCTTGACTC"));
        let offsets: Vec<usize> = sites.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 7]);
    }

    #[test]
    fn test_non_palindromic() {
        let re = RestrictionEnzyme::new("BsaI", "GGTCTC", 1, 4);
        assert!(!re.is_palindromic());
        assert!(re.is_valid_motif());
        assert!(!RestrictionEnzyme::new("Bad", "GAXTC", 0, 0).is_valid_motif());
    }

    #[test]
    fn test_motif_longer_than_sequence() {
        let re = RestrictionEnzyme::new("NotI", "GCGGCCGC", 2, 4);
        assert!(re.get_sites(&seq("GCGG")).is_empty());
    }
}
