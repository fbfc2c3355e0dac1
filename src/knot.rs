// (c) Roel Kluin, 2023, GPL v3

use crate::contig::Contig;
use crate::kmer::{canonical, seq_to_code};
use ahash::AHashMap;
use anyhow::Result;
use smallvec::SmallVec;

/// A contig registered at a knot, and whether it must be read reverse
/// complemented for the knot's k-mer to appear in the registered role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub ctg: usize,
    pub rc: bool,
}

/// Contigs sharing one boundary k-mer. `pred` contigs end with it, `succ`
/// contigs start with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Knot {
    pub key: u64,
    pred: SmallVec<[Slot; 2]>,
    succ: SmallVec<[Slot; 2]>,
}

impl Knot {
    fn new(key: u64) -> Self {
        Knot {
            key,
            pred: SmallVec::new(),
            succ: SmallVec::new(),
        }
    }

    /// The (pred, succ) pair to merge, if the knot joins exactly two contigs
    /// unambiguously. A contig found in both roles is self-overlapping; it
    /// keeps whichever role the other contig leaves open.
    pub fn mergeable(&self) -> Option<(Slot, Slot)> {
        match (&self.pred[..], &self.succ[..]) {
            ([p], [s]) if p.ctg != s.ctg => Some((*p, *s)),
            ([a, b], [s]) if a.ctg != b.ctg && (a.ctg == s.ctg || b.ctg == s.ctg) => {
                Some((if a.ctg == s.ctg { *b } else { *a }, *s))
            }
            ([p], [a, b]) if a.ctg != b.ctg && (a.ctg == p.ctg || b.ctg == p.ctg) => {
                Some((*p, if a.ctg == p.ctg { *b } else { *a }))
            }
            _ => None,
        }
    }
}

/// Boundary k-mers of all live contigs, rebuilt for each pass. Knots are kept
/// in the order their key was first seen, so a pass is deterministic.
pub struct KnotIndex {
    knots: Vec<Knot>,
    by_key: AHashMap<u64, usize>,
}

impl KnotIndex {
    pub fn build(ctgs: &[Contig], ovlp: usize, stranded: bool) -> Result<Self> {
        let mut ki = KnotIndex {
            knots: Vec::with_capacity(ctgs.len() * 2),
            by_key: AHashMap::with_capacity(ctgs.len() * 2),
        };
        for (i, ctg) in ctgs.iter().enumerate().filter(|(_, c)| !c.is_used()) {
            let seq = ctg.seq();
            if seq.len() < ovlp {
                continue;
            }
            ki.register(seq_to_code(&seq[..ovlp])?, ovlp, stranded, i, true);
            ki.register(seq_to_code(&seq[seq.len() - ovlp..])?, ovlp, stranded, i, false);
        }
        Ok(ki)
    }

    fn register(&mut self, code: u64, ovlp: usize, stranded: bool, ctg: usize, is_head: bool) {
        let (key, rc) = if stranded {
            (code, false)
        } else {
            canonical(code, ovlp)
        };
        let knots = &mut self.knots;
        let i = *self.by_key.entry(key).or_insert_with(|| {
            knots.push(Knot::new(key));
            knots.len() - 1
        });
        let slot = Slot { ctg, rc };
        // a reversed head is a rear
        if is_head != rc {
            self.knots[i].succ.push(slot);
        } else {
            self.knots[i].pred.push(slot);
        }
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }
    pub fn get(&self, key: u64) -> Option<&Knot> {
        self.by_key.get(&key).map(|&i| &self.knots[i])
    }

    /// Knots that can be resolved by one merge, with their (pred, succ).
    pub fn mergeable(&self) -> impl Iterator<Item = (&Knot, Slot, Slot)> {
        self.knots
            .iter()
            .filter_map(|k| k.mergeable().map(|(p, s)| (k, p, s)))
    }
}
