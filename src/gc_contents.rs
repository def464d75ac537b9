use crate::dna_sequence::{BASES, Sequence};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GC_WINDOW: usize = 100;

/// Rounds to one decimal place, halves away from zero.
#[inline(always)]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `count / total` as a percentage rounded half away from zero to one decimal.
/// Works in whole tenths so exact halves such as 23/80 never drift below .5.
#[inline(always)]
pub fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let (count, total) = (count as u64, total as u64);
    let tenths = (count * 2000 + total) / (2 * total);
    tenths as f64 / 10.0
}

#[inline(always)]
fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseCounts {
    pub a: usize,
    pub c: usize,
    pub g: usize,
    pub t: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasePercentages {
    pub a: f64,
    pub c: f64,
    pub g: f64,
    pub t: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimerCount {
    pub dimer: String,
    pub count: usize,
}

/// Compositional statistics of one sequence. A pure function of its input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositionStats {
    pub length: usize,
    pub counts: BaseCounts,
    pub gc_percent: f64,
    pub at_percent: f64,
    pub base_percent: BasePercentages,
    /// Overlapping dinucleotide counts, AA..TT in lexicographic order.
    pub dimers: Vec<DimerCount>,
}

impl CompositionStats {
    pub fn analyze(seq: &Sequence) -> Self {
        let mut counts = [0usize; 4];
        let mut dimers = [0usize; 16];
        let mut previous: Option<usize> = None;
        for &base in seq.as_bytes() {
            let Some(idx) = base_index(base) else {
                previous = None;
                continue;
            };
            counts[idx] += 1;
            if let Some(prev) = previous {
                dimers[prev * 4 + idx] += 1;
            }
            previous = Some(idx);
        }

        let length = seq.len();
        let [a, c, g, t] = counts;
        Self {
            length,
            counts: BaseCounts { a, c, g, t },
            gc_percent: percent(g + c, length),
            at_percent: percent(a + t, length),
            base_percent: BasePercentages {
                a: percent(a, length),
                c: percent(c, length),
                g: percent(g, length),
                t: percent(t, length),
            },
            dimers: dimers
                .iter()
                .enumerate()
                .map(|(i, &count)| DimerCount {
                    dimer: String::from_utf8_lossy(&[BASES[i / 4], BASES[i % 4]]).into_owned(),
                    count,
                })
                .collect(),
        }
    }

    pub fn gc_count(&self) -> usize {
        self.counts.g + self.counts.c
    }

    pub fn dimer(&self, dimer: &str) -> Option<usize> {
        self.dimers
            .iter()
            .find(|d| d.dimer.eq_ignore_ascii_case(dimer))
            .map(|d| d.count)
    }
}

pub fn analyze(seq: &Sequence) -> CompositionStats {
    CompositionStats::analyze(seq)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GcRegion {
    from: usize,
    to: usize,
    gc: f32,
}

impl GcRegion {
    #[inline(always)]
    pub fn from(&self) -> usize {
        self.from
    }

    #[inline(always)]
    pub fn to(&self) -> usize {
        self.to
    }

    #[inline(always)]
    pub fn gc(&self) -> f32 {
        self.gc
    }
}

/// GC fraction over consecutive, non-overlapping windows.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GcContents {
    regions: Vec<GcRegion>,
}

impl GcContents {
    pub fn new_from_sequence(sequence: &Sequence, window: usize) -> Self {
        let sequence = sequence.as_bytes();
        let mut ret = Self::default();
        let section_size = sequence.len().min(window.max(1));
        let mut pos = 0;
        while pos < sequence.len() {
            let to = sequence.len().min(pos + section_size);
            let gc = Self::calculate_gc(&sequence[pos..to]);
            ret.regions.push(GcRegion { from: pos, to, gc });
            pos += section_size;
        }
        ret
    }

    #[inline(always)]
    pub fn regions(&self) -> &[GcRegion] {
        &self.regions
    }

    #[inline(always)]
    fn calculate_gc(sequence: &[u8]) -> f32 {
        let gc = sequence
            .iter()
            .filter(|&&c| c == b'G' || c == b'C')
            .count() as f32;
        gc / sequence.len() as f32
    }
}
