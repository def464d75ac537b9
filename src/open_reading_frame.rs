use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const CODON_SIZE: usize = 3;
pub const START_CODON: &[u8] = b"ATG";
pub const STOP_CODONS: [&[u8]; 3] = [b"TAA", b"TAG", b"TGA"];

#[inline(always)]
pub fn is_start_codon(codon: &[u8]) -> bool {
    codon == START_CODON
}

#[inline(always)]
pub fn is_stop_codon(codon: &[u8]) -> bool {
    STOP_CODONS.iter().any(|stop| *stop == codon)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodonKind {
    Start,
    Stop,
}

/// A start or stop codon found in one of the three forward frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodonHit {
    pub position: usize,
    pub frame: u8,
    pub kind: CodonKind,
}

/// Half-open span `[from, to)` from a start codon through its in-frame stop codon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReadingFrame {
    from: usize,
    to: usize,
    frame: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameScan {
    pub codons: Vec<CodonHit>,
    pub orfs: Vec<OpenReadingFrame>,
}

impl OpenReadingFrame {
    pub fn new(from: usize, to: usize, frame: u8) -> Self {
        OpenReadingFrame { from, to, frame }
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    /// Codons including the start and the stop codon.
    pub fn codon_count(&self) -> usize {
        (self.to - self.from) / CODON_SIZE
    }

    pub fn find_orfs(sequence: &[u8], min_codons: usize) -> Vec<OpenReadingFrame> {
        Self::scan_frames(sequence, min_codons).orfs
    }

    /// Scans frames 0, 1 and 2 in parallel. Codon hits and ORFs are each
    /// sorted by position.
    pub fn scan_frames(sequence: &[u8], min_codons: usize) -> FrameScan {
        let per_frame: Vec<FrameScan> = [0u8, 1, 2]
            .par_iter()
            .map(|frame| Self::scan_frame(sequence, *frame, min_codons))
            .collect();

        let mut ret = FrameScan::default();
        for scan in per_frame {
            ret.codons.extend(scan.codons);
            ret.orfs.extend(scan.orfs);
        }
        ret.codons.sort_by_key(|hit| hit.position);
        ret.orfs.sort_by_key(|orf| (orf.from, orf.to));
        ret
    }

    fn scan_frame(sequence: &[u8], frame: u8, min_codons: usize) -> FrameScan {
        let mut ret = FrameScan::default();
        let mut open_starts: Vec<usize> = vec![];
        let mut position = frame as usize;

        while position + CODON_SIZE <= sequence.len() {
            let codon = &sequence[position..position + CODON_SIZE];
            if is_start_codon(codon) {
                ret.codons.push(CodonHit {
                    position,
                    frame,
                    kind: CodonKind::Start,
                });
                open_starts.push(position);
            } else if is_stop_codon(codon) {
                ret.codons.push(CodonHit {
                    position,
                    frame,
                    kind: CodonKind::Stop,
                });
                let to = position + CODON_SIZE;
                // Every start since the previous in-frame stop terminates here.
                for from in open_starts.drain(..) {
                    let orf = OpenReadingFrame::new(from, to, frame);
                    if orf.codon_count() >= min_codons {
                        ret.orfs.push(orf);
                    }
                }
            }
            position += CODON_SIZE;
        }
        // Starts still open here have no downstream stop and yield no ORF.
        ret
    }
}
