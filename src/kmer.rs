use crate::error::KmixError;
use crate::new_types::twobit::{complement, TwoBit};
use anyhow::{ensure, Result};
use num::FromPrimitive;
use num_traits::PrimInt;
use std::mem::size_of;

/// Longest k-mer that fits a u64 code.
pub const MAX_KMERLEN: usize = size_of::<u64>() * 4;

pub trait RevCmp<T: PrimInt + FromPrimitive> {
    fn revcmp(self, kmerlen: usize) -> T;
}

/// create bitmask. e.g. dvm::<u32>(0xf0  0xff) => 0xf0_f0_f0_f0
#[inline]
fn dvm<T: PrimInt + FromPrimitive>(numerator: u32, divisor: u32) -> T {
    let base = T::max_value() / T::from_u32(divisor).unwrap();
    T::from_u32(numerator).unwrap() * base
}

macro_rules! implement_revcmp { ($($ty:ty),*) => ($(
	/// give twobit reverse complent for given kmerlen
	impl RevCmp<$ty> for $ty {
		#[inline]
		fn revcmp(self, kmerlen: usize) -> $ty {
			let mut seq = self.swap_bytes() ^ dvm::<$ty>(2, 3);
			seq = ((seq & dvm::<$ty>(0xf0, 0xff)) >> 4) | ((seq & dvm::<$ty>(0xf, 0xff)) << 4);
			seq = ((seq & dvm::<$ty>(0xc, 0xf)) >> 2) | ((seq & dvm::<$ty>(0x3, 0xf)) << 2);
			seq >> (size_of::<$ty>() * 8 - kmerlen * 2)
		}
	}
	)*)
}

implement_revcmp!(u8, u16, u32, u64, u128, usize);

/// Pack a sequence of at most `MAX_KMERLEN` bases, first base in the top bits.
/// Bases other than ACGT are rejected, whatever their case.
pub fn seq_to_code(seq: &[u8]) -> Result<u64> {
    ensure!(
        seq.len() <= MAX_KMERLEN,
        "k-mer of length {} does not fit, at most {} bases",
        seq.len(),
        MAX_KMERLEN
    );
    seq.iter().try_fold(0_u64, |code, &b| {
        TwoBit::from_base(b)
            .map(|b2| (code << 2) | b2.as_u64())
            .ok_or_else(|| {
                anyhow::Error::from(KmixError::InvalidBase {
                    base: b as char,
                    seq: String::from_utf8_lossy(seq).into_owned(),
                })
            })
    })
}

/// Exact inverse of `seq_to_code`, in upper case.
pub fn code_to_seq(code: u64, kmerlen: usize) -> String {
    (0..kmerlen)
        .rev()
        .map(|i| TwoBit::from_code(code >> (i * 2)).as_base() as char)
        .collect()
}

/// The smaller of code and its reverse complement, and whether that flipped.
/// A palindrome is its own canonical form, not flipped.
pub fn canonical(code: u64, kmerlen: usize) -> (u64, bool) {
    let rc = code.revcmp(kmerlen);
    if rc < code {
        (rc, true)
    } else {
        (code, false)
    }
}

/// Key under which a k-mer is indexed: its code when stranded, else canonical.
pub fn seq_to_key(seq: &[u8], kmerlen: usize, stranded: bool) -> Result<u64> {
    if seq.len() != kmerlen {
        return Err(KmixError::KmerLength {
            seq: String::from_utf8_lossy(seq).into_owned(),
            len: seq.len(),
            expected: kmerlen,
        }
        .into());
    }
    let code = seq_to_code(seq)?;
    Ok(if stranded {
        code
    } else {
        canonical(code, kmerlen).0
    })
}

/// Reverse complement a sequence in place.
pub fn revcmp_seq(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = complement(*b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn random_seq(len: usize) -> Vec<u8> {
        let mut rng = thread_rng();
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    #[test]
    fn known_codes() {
        assert_eq!(seq_to_code(b"AA").unwrap(), 0);
        assert_eq!(seq_to_code(b"AT").unwrap(), 0b0010);
        assert_eq!(seq_to_code(b"TC").unwrap(), 0b1001);
        assert_eq!(seq_to_code(b"GA").unwrap(), 0b1100);
        assert_eq!(seq_to_code(b"tc").unwrap(), 0b1001);
        assert_eq!(0b1001_u64.revcmp(2), 0b1100);
        // palindromes
        assert_eq!(0b0010_u64.revcmp(2), 0b0010);
        assert_eq!(canonical(seq_to_code(b"CG").unwrap(), 2), (0b0111, false));
        assert_eq!(canonical(0b1100, 2), (0b1001, true));
    }
    #[test]
    fn round_trip() {
        let mut rng = thread_rng();
        for _ in 0..100 {
            let kmerlen = rng.gen_range(1..=MAX_KMERLEN);
            let seq = random_seq(kmerlen);
            let code = seq_to_code(&seq).unwrap();
            assert_eq!(code_to_seq(code, kmerlen).as_bytes(), &seq[..]);
        }
    }
    #[test]
    fn revcmp_involution() {
        let mut rng = thread_rng();
        for _ in 0..100 {
            let kmerlen = rng.gen_range(1..=MAX_KMERLEN);
            let mut seq = random_seq(kmerlen);
            let code = seq_to_code(&seq).unwrap();
            let rc = code.revcmp(kmerlen);
            assert_eq!(rc.revcmp(kmerlen), code);

            revcmp_seq(&mut seq);
            assert_eq!(seq_to_code(&seq).unwrap(), rc);
            assert_eq!(canonical(code, kmerlen).0, canonical(rc, kmerlen).0);
            assert_eq!(
                seq_to_key(&seq, kmerlen, false).unwrap(),
                canonical(code, kmerlen).0
            );
        }
    }
    #[test]
    fn stranded_key_is_code() {
        let seq = b"GATTACA";
        let code = seq_to_code(seq).unwrap();
        assert_eq!(seq_to_key(seq, 7, true).unwrap(), code);
        assert_eq!(
            seq_to_key(b"TGTAATC", 7, false).unwrap(),
            seq_to_key(seq, 7, false).unwrap()
        );
    }
    #[test]
    fn rejects_invalid() {
        let err = seq_to_code(b"ACNT").unwrap_err();
        assert_eq!(
            err.downcast_ref::<KmixError>(),
            Some(&KmixError::InvalidBase {
                base: 'N',
                seq: "ACNT".to_string()
            })
        );
        let err = seq_to_key(b"ACG", 4, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KmixError>(),
            Some(KmixError::KmerLength { len: 3, expected: 4, .. })
        ));
        assert!(seq_to_code(&random_seq(MAX_KMERLEN + 1)).is_err());
    }
    #[test]
    fn revcmp_keeps_case() {
        let mut seq = b"AAcgT".to_vec();
        revcmp_seq(&mut seq);
        assert_eq!(&seq, b"AcgTT");
    }
}
