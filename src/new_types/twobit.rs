use std::fmt;

/// Twobits may be unexpected: A: 0x0, C: 0x1, T: 0x2, G: 0x3. This follows
/// from ascii `(b >> 1) & 3`, lower case included, and complementing is `^ 2`.
#[derive(Copy, Clone, PartialEq, Eq, new)]
pub struct TwoBit(u8);

const DECODE: [u8; 4] = [b'A', b'C', b'T', b'G'];

impl TwoBit {
    /// Only A, C, G and T (either case) have a twobit; N and IUPAC codes do not.
    pub(crate) fn from_base(b: u8) -> Option<TwoBit> {
        match b {
            b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't' => Some(TwoBit((b >> 1) & 3)),
            _ => None,
        }
    }
    pub(crate) fn from_code(code: u64) -> TwoBit {
        TwoBit((code & 3) as u8)
    }
    pub(crate) fn as_u64(&self) -> u64 {
        u64::from(self.0)
    }
    pub(crate) fn as_base(&self) -> u8 {
        DECODE[self.0 as usize]
    }
}

/// Complement of a single base; case is kept. Anything but ACGT becomes N.
pub(crate) fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        _ => b'N',
    }
}

impl fmt::Debug for TwoBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_base() as char, self.0)
    }
}
