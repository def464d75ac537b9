use crate::{
    AMINO_ACIDS,
    amino_acids::{AminoAcids, translate_codon},
    catalog::ExpressionHost,
    dna_sequence::Sequence,
    error::{Result, VirtuGeneError},
    open_reading_frame::CODON_SIZE,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub host: ExpressionHost,
    pub codons: usize,
    pub substituted: usize,
}

/// Rewrites each codon to the host's preferred synonymous codon.
///
/// Length and reading frame are never changed; codons without a catalog
/// entry pass through as they are.
pub fn optimize(seq: &Sequence, host: ExpressionHost) -> Result<Sequence> {
    optimize_with(&AMINO_ACIDS, seq, host).map(|(optimized, _)| optimized)
}

pub fn optimize_with(
    catalog: &AminoAcids,
    seq: &Sequence,
    host: ExpressionHost,
) -> Result<(Sequence, OptimizationSummary)> {
    if seq.len() % CODON_SIZE != 0 {
        return Err(VirtuGeneError::FrameError { length: seq.len() });
    }

    let mut out = Vec::with_capacity(seq.len());
    let mut substituted = 0;
    for codon in seq.codons() {
        let preferred = translate_codon(codon)
            .and_then(|aa| catalog.preferred_codon(aa, host))
            .map(str::as_bytes);
        match preferred {
            Some(preferred) if preferred.len() == CODON_SIZE => {
                if preferred != codon {
                    substituted += 1;
                }
                out.extend_from_slice(preferred);
            }
            _ => out.extend_from_slice(codon),
        }
    }

    let summary = OptimizationSummary {
        host,
        codons: seq.len() / CODON_SIZE,
        substituted,
    };
    Ok((Sequence::from_validated(out)?, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &str) -> Sequence {
        Sequence::parse(s).unwrap()
    }

    fn protein(s: &Sequence) -> String {
        s.codons().filter_map(translate_codon).collect()
    }

    #[test]
    fn test_frame_error() {
        assert_eq!(
            optimize(&seq("ATGA"), ExpressionHost::EscherichiaColi),
            Err(VirtuGeneError::FrameError { length: 4 })
        );
    }

    #[test]
    fn test_orf_example_all_hosts() {
        let input = seq("ATGAAATAA");
        for host in ExpressionHost::ALL {
            let out = optimize(&input, host).unwrap();
            assert_eq!(out.len(), 9);
            assert_eq!(protein(&out), "MK*");
        }
    }

    #[test]
    fn test_substitutions() {
        // Leu Leu Arg: TTA CTT CGA
        let input = seq("TTACTTCGA");
        let (out, summary) =
            optimize_with(&AMINO_ACIDS, &input, ExpressionHost::EscherichiaColi).unwrap();
        assert_eq!(out.as_str(), "CTGCTGCGC");
        assert_eq!(summary.codons, 3);
        assert_eq!(summary.substituted, 3);

        let yeast = optimize(&input, ExpressionHost::SaccharomycesCerevisiae).unwrap();
        assert_eq!(yeast.as_str(), "TTGTTGAGA");
    }

    #[test]
    fn test_idempotent() {
        let input = seq("GCTAGATTTCCCTGA");
        let once = optimize(&input, ExpressionHost::HomoSapiens).unwrap();
        let twice = optimize(&once, ExpressionHost::HomoSapiens).unwrap();
        assert_eq!(once, twice);
        assert_eq!(protein(&once), protein(&input));
    }

    #[test]
    fn test_unknown_codons_pass_through() {
        let empty = AminoAcids::default();
        let input = seq("TTACTTCGA");
        let (out, summary) =
            optimize_with(&empty, &input, ExpressionHost::EscherichiaColi).unwrap();
        assert_eq!(out, input);
        assert_eq!(summary.substituted, 0);
    }
}
