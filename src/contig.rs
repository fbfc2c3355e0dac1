use crate::error::KmixError;
use crate::kmer::revcmp_seq;
use crate::new_types::offset::Offset;
use anyhow::Result;
use smallvec::{smallvec, SmallVec};
use std::mem;

/// A sequence under assembly. Grows at either end by absorbing another
/// contig, whose sequence and members are moved in; the absorbed one is left
/// empty and marked used.
#[derive(Debug, Clone, PartialEq)]
pub struct Contig {
    seq: Vec<u8>,
    head: Offset, // offset of the k-mer at the start of seq
    rear: Offset, // and at its end
    rep_val: f32,
    members: SmallVec<[Offset; 2]>, // in order along seq
    used: bool,
}

impl Contig {
    pub fn new(seq: Vec<u8>, pos: Offset, rep_val: f32) -> Self {
        Contig {
            seq,
            head: pos,
            rear: pos,
            rep_val,
            members: smallvec![pos],
            used: false,
        }
    }
    pub fn seq(&self) -> &[u8] {
        &self.seq
    }
    pub fn rep_val(&self) -> f32 {
        self.rep_val
    }
    pub fn members(&self) -> &[Offset] {
        &self.members
    }
    pub fn nb_kmer(&self) -> usize {
        self.members.len()
    }
    pub fn is_used(&self) -> bool {
        self.used
    }
    /// The head k-mer, or the rear one if the contig is to be read reversed.
    pub fn head_pos(&self, need_rc: bool) -> Offset {
        if need_rc {
            self.rear
        } else {
            self.head
        }
    }
    pub fn rear_pos(&self, need_rc: bool) -> Offset {
        if need_rc {
            self.head
        } else {
            self.rear
        }
    }

    fn check_overlap(&self, other: &Contig, ovlp: usize) -> Result<()> {
        let len = self.seq.len().min(other.seq.len());
        if ovlp > len {
            return Err(KmixError::ExtensionOverlap { ovlp, len }.into());
        }
        Ok(())
    }

    /// Take `other`'s (reversed) sequence and members and return them.
    fn drain(other: &mut Contig, need_rc: bool) -> (Vec<u8>, SmallVec<[Offset; 2]>) {
        let mut seq = mem::take(&mut other.seq);
        let mut members = mem::take(&mut other.members);
        if need_rc {
            revcmp_seq(&mut seq);
            members.reverse();
        }
        other.used = true;
        (seq, members)
    }

    /// Prepend `left`, which overlaps this contig's head by `ovlp` bases.
    pub fn left_extend(&mut self, left: &mut Contig, need_left_rc: bool, ovlp: usize) -> Result<()> {
        self.check_overlap(left, ovlp)?;
        self.head = left.head_pos(need_left_rc);
        let (mut seq, mut members) = Contig::drain(left, need_left_rc);
        debug_assert!(seq[seq.len() - ovlp..].eq_ignore_ascii_case(&self.seq[..ovlp]));

        seq.extend_from_slice(&self.seq[ovlp..]);
        self.seq = seq;
        members.extend(self.members.drain(..));
        self.members = members;
        Ok(())
    }

    /// Append `right`, which overlaps this contig's rear by `ovlp` bases.
    pub fn right_extend(&mut self, right: &mut Contig, need_right_rc: bool, ovlp: usize) -> Result<()> {
        self.check_overlap(right, ovlp)?;
        self.rear = right.rear_pos(need_right_rc);
        let (seq, members) = Contig::drain(right, need_right_rc);
        debug_assert!(seq[..ovlp].eq_ignore_ascii_case(&self.seq[self.seq.len() - ovlp..]));

        self.seq.extend_from_slice(&seq[ovlp..]);
        self.members.extend(members);
        Ok(())
    }
}

/// Two distinct contigs of the collection, both mutable.
pub(crate) fn pair_mut(ctgs: &mut [Contig], a: usize, b: usize) -> (&mut Contig, &mut Contig) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = ctgs.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = ctgs.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offs(v: &[u64]) -> Vec<Offset> {
        v.iter().map(|&o| Offset::from(o)).collect()
    }
    fn ctg(seq: &str, pos: u64) -> Contig {
        Contig::new(seq.as_bytes().to_vec(), Offset::from(pos), 0.0)
    }

    #[test]
    fn right_then_left() {
        let mut base = ctg("AAT", 0);
        let mut atc = ctg("ATC", 16);
        base.right_extend(&mut atc, false, 2).unwrap();
        assert_eq!(base.seq(), b"AATC");
        assert_eq!(base.head_pos(false), Offset::from(0));
        assert_eq!(base.rear_pos(false), Offset::from(16));
        assert!(atc.is_used());
        assert!(atc.seq().is_empty() && atc.members().is_empty());

        let mut aaa = ctg("AAA", 32);
        base.left_extend(&mut aaa, false, 2).unwrap();
        assert_eq!(base.seq(), b"AAATC");
        assert_eq!(base.head_pos(false), Offset::from(32));
        assert_eq!(base.rear_pos(true), Offset::from(32));
        assert_eq!(base.members(), &offs(&[32, 0, 16])[..]);
        assert_eq!(base.nb_kmer(), 3);
    }

    #[test]
    fn absorb_reversed() {
        let mut gatt = ctg("GAT", 16);
        gatt.right_extend(&mut ctg("ATT", 32), false, 2).unwrap();
        assert_eq!(gatt.seq(), b"GATT");

        // GATT read reversed is AATC
        let mut base = ctg("GAA", 0);
        base.right_extend(&mut gatt, true, 2).unwrap();
        assert_eq!(base.seq(), b"GAATC");
        assert_eq!(base.rear_pos(false), Offset::from(16));
        assert_eq!(base.members(), &offs(&[0, 32, 16])[..]);

        // and prepended reversed
        let mut base = ctg("TCC", 48);
        let mut gatt = ctg("GAT", 16);
        gatt.right_extend(&mut ctg("ATT", 32), false, 2).unwrap();
        base.left_extend(&mut gatt, true, 2).unwrap();
        assert_eq!(base.seq(), b"AATCC");
        assert_eq!(base.head_pos(false), Offset::from(32));
        assert_eq!(base.members(), &offs(&[32, 16, 48])[..]);
    }

    #[test]
    fn overlap_too_long() {
        let mut base = ctg("AAT", 0);
        let mut other = ctg("AT", 16);
        let err = base.right_extend(&mut other, false, 3).unwrap_err();
        assert_eq!(
            err.downcast_ref::<KmixError>(),
            Some(&KmixError::ExtensionOverlap { ovlp: 3, len: 2 })
        );
        assert!(!other.is_used());
        assert_eq!(base.seq(), b"AAT");
    }

    #[test]
    fn two_mutable() {
        let mut ctgs = vec![ctg("AAA", 0), ctg("CCC", 8), ctg("GGG", 16)];
        let (a, b) = pair_mut(&mut ctgs, 2, 0);
        assert_eq!((a.seq(), b.seq()), (&b"GGG"[..], &b"AAA"[..]));
        let (a, b) = pair_mut(&mut ctgs, 1, 2);
        assert_eq!((a.seq(), b.seq()), (&b"CCC"[..], &b"GGG"[..]));
    }
}
