/// Bits per base, in the order A, C, G, T.
const A: u8 = 0b0001;
const C: u8 = 0b0010;
const G: u8 = 0b0100;
const T: u8 = 0b1000;

const IUPAC_LETTERS: [(u8, u8); 15] = [
    (b'A', A),
    (b'C', C),
    (b'G', G),
    (b'T', T),
    (b'R', A | G),
    (b'Y', C | T),
    (b'S', C | G),
    (b'W', A | T),
    (b'K', G | T),
    (b'M', A | C),
    (b'B', C | G | T),
    (b'D', A | G | T),
    (b'H', A | C | T),
    (b'V', A | C | G),
    (b'N', A | C | G | T),
];

/// Set of bases a recognition-motif letter stands for. Sequences are plain
/// ACGT; ambiguity codes only occur in motifs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IupacCode(u8);

impl IupacCode {
    /// Unknown letters map to the empty set.
    #[inline(always)]
    pub fn from_letter(letter: u8) -> Self {
        let letter = letter.to_ascii_uppercase();
        IUPAC_LETTERS
            .iter()
            .find(|(l, _)| *l == letter)
            .map_or(Self(0), |(_, bits)| Self(*bits))
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub fn matches(self, base: u8) -> bool {
        self.0 & Self::from_letter(base).0 != 0
    }

    #[inline(always)]
    pub fn is_valid_letter(letter: u8) -> bool {
        !Self::from_letter(letter).is_empty()
    }

    /// Exactly one of A, C, G, T (already uppercased).
    #[inline(always)]
    pub fn is_unambiguous_base(letter: char) -> bool {
        matches!(letter, 'A' | 'C' | 'G' | 'T')
    }

    /// A<->T and C<->G sit at mirrored bit positions, so complementing is a
    /// 4-bit reversal.
    #[inline(always)]
    pub fn complement(self) -> Self {
        Self(self.0.reverse_bits() >> 4)
    }

    /// Complement of a plain base; anything else becomes `N`.
    #[inline(always)]
    pub fn letter_complement(letter: u8) -> u8 {
        match letter.to_ascii_uppercase() {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            _ => b'N',
        }
    }
}
