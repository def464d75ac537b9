use crate::error::{Result, VirtuGeneError};
use crate::iupac_code::IupacCode;
use bio::io::fasta;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{Read, Write},
    ops::Range,
};

pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Validated, immutable nucleotide sequence over {A,C,G,T}.
///
/// Edits never mutate a `Sequence`; they produce a new one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sequence {
    seq: String,
}

impl Sequence {
    /// Normalizes case, strips whitespace and validates the alphabet.
    ///
    /// Error positions are offsets into the whitespace-stripped input.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut seq = String::with_capacity(raw.len());
        for c in raw.chars().filter(|c| !c.is_whitespace()) {
            let upper = c.to_ascii_uppercase();
            if !IupacCode::is_unambiguous_base(upper) {
                return Err(VirtuGeneError::InvalidAlphabet {
                    character: c,
                    position: seq.len(),
                });
            }
            seq.push(upper);
        }
        if seq.is_empty() {
            return Err(VirtuGeneError::EmptyInput);
        }
        Ok(Self { seq })
    }

    /// Uniform random bases, length uniform in `[min_len, max_len]`.
    pub fn generate_random<R: Rng + ?Sized>(
        min_len: usize,
        max_len: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if min_len == 0 || min_len > max_len {
            return Err(VirtuGeneError::InvalidLengthRange {
                min: min_len,
                max: max_len,
            });
        }
        let len = rng.gen_range(min_len..=max_len);
        let seq = (0..len)
            .map(|_| BASES[rng.gen_range(0..BASES.len())] as char)
            .collect();
        Ok(Self { seq })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Always false for a constructed sequence; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.seq
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.seq.as_bytes()
    }

    /// Complete frame-0 codons; a trailing partial codon is skipped.
    pub fn codons(&self) -> impl Iterator<Item = &[u8]> {
        self.as_bytes().chunks_exact(3)
    }

    pub fn subsequence(&self, range: Range<usize>) -> Option<Sequence> {
        if range.start >= range.end {
            return None;
        }
        self.seq.get(range).map(|s| Sequence { seq: s.to_string() })
    }

    pub fn reverse_complement(&self) -> Sequence {
        let seq = self
            .as_bytes()
            .iter()
            .rev()
            .map(|&b| IupacCode::letter_complement(b) as char)
            .collect();
        Sequence { seq }
    }

    pub fn write_fasta<W: Write>(
        &self,
        writer: W,
        id: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let mut writer = fasta::Writer::new(writer);
        writer.write(id, description, self.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_fasta_string(&self, id: &str, description: Option<&str>) -> Result<String> {
        let mut buffer = Vec::with_capacity(self.len() + id.len() + 2);
        self.write_fasta(&mut buffer, id, description)?;
        String::from_utf8(buffer).map_err(|e| VirtuGeneError::Internal {
            message: format!("FASTA output is not UTF-8: {e}"),
        })
    }

    /// Reads every record of a FASTA stream, validating each sequence.
    pub fn read_fasta<R: Read>(reader: R) -> Result<Vec<(String, Sequence)>> {
        fasta::Reader::new(reader)
            .records()
            .map(|record| {
                let record = record?;
                let text = String::from_utf8_lossy(record.seq());
                Ok((record.id().to_string(), Sequence::parse(&text)?))
            })
            .collect()
    }

    /// Builds a sequence from bytes already known to be uppercase ACGT.
    pub(crate) fn from_validated(bytes: Vec<u8>) -> Result<Self> {
        let seq = String::from_utf8(bytes).map_err(|e| VirtuGeneError::Internal {
            message: format!("non-ASCII sequence data: {e}"),
        })?;
        Self::parse(&seq)
    }
}

impl TryFrom<String> for Sequence {
    type Error = VirtuGeneError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Sequence> for String {
    fn from(value: Sequence) -> Self {
        value.seq
    }
}

impl std::str::FromStr for Sequence {
    type Err = VirtuGeneError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seq)
    }
}
