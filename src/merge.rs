// (c) Roel Kluin, 2023, GPL v3

use crate::contig::{pair_mut, Contig};
use crate::distance::{Compatibility, Scratch};
use crate::error::KmixError;
use crate::kmer::code_to_seq;
use crate::kmerstore::{FeatureKey, IndexMeta};
use crate::knot::KnotIndex;
use crate::matrix::IndexReader;
use crate::new_types::offset::Offset;
use crate::selection::Selection;
use anyhow::{bail, ensure, Context, Result};
use clap::{Args, ValueEnum};
use itertools::Itertools;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, trace, Level};

#[derive(Args, Debug)]
pub struct MergeCmd {
    /// Index folder written by `kmix index`, in k-mer mode
    #[arg(short = 'i', long, value_name = "DIR", required = true)]
    pub idx_dir: PathBuf,

    /// Longest overlap to merge on, shorter than the k-mer length
    #[arg(long, required = true)]
    pub max_overlap: usize,

    /// Shortest overlap to merge on
    #[arg(long, required = true)]
    pub min_overlap: usize,

    /// Merge only the listed k-mers; a tab or space separated second column gives their values
    #[arg(short = 's', long, value_name = "FILE")]
    pub select: Option<PathBuf>,

    /// Which contig keeps its identity when two are merged, by their values
    #[arg(long, value_enum, default_value_t = RepMode::Min)]
    pub rep_mode: RepMode,

    /// Count profile comparison required to accept an overlap
    #[arg(long, value_enum, default_value_t = Compatibility::Spearman)]
    pub compat: Compatibility,

    /// Overlaps with a distance at or above this are not merged
    #[arg(long, default_value_t = 0.25)]
    pub threshold: f64,

    /// Output file, stdout if absent
    #[arg(short = 'o', long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Also print the sample counts of each contig's head k-mer
    #[arg(long)]
    pub with_counts: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepMode {
    Min,
    Max,
    #[value(name = "minabs")]
    MinAbs,
    #[value(name = "maxabs")]
    MaxAbs,
}

impl RepMode {
    /// Whether the first of two contigs, with values `a` and `b`, is the base.
    pub fn keeps_first(self, a: f32, b: f32) -> bool {
        match self {
            RepMode::Min => a <= b,
            RepMode::Max => a >= b,
            RepMode::MinAbs => a.abs() <= b.abs(),
            RepMode::MaxAbs => a.abs() >= b.abs(),
        }
    }
}

/// Overlap bounds checked against the index, before anything is loaded.
pub fn check_overlaps(meta: &IndexMeta, min_ovlp: usize, max_ovlp: usize) -> Result<()> {
    if !meta.is_kmer_mode() {
        return Err(KmixError::NotKmerIndex.into());
    }
    if max_ovlp >= meta.kmerlen {
        return Err(KmixError::OverlapTooLong {
            ovlp: max_ovlp,
            kmerlen: meta.kmerlen,
        }
        .into());
    }
    ensure!(min_ovlp >= 1, "min overlap should be at least 1");
    ensure!(
        min_ovlp <= max_ovlp,
        "min overlap ({}) exceeds max overlap ({})",
        min_ovlp,
        max_ovlp
    );
    Ok(())
}

pub struct Merger {
    idx: IndexReader,
    ctgs: Vec<Contig>,
    compat: Compatibility,
    threshold: f64,
    rep_mode: RepMode,
    scratch: Scratch,
}

impl Merger {
    pub fn new(idx: IndexReader, compat: Compatibility, threshold: f64, rep_mode: RepMode) -> Self {
        let scratch = Scratch::new(idx.nb_smp());
        Merger {
            idx,
            ctgs: Vec::new(),
            compat,
            threshold,
            rep_mode,
            scratch,
        }
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.ctgs
    }

    /// One contig per indexed k-mer, or per selected one. Every selected
    /// k-mer must be in the index.
    pub fn init_contigs(&mut self, sel: Option<&Selection>) -> Result<()> {
        let mut wanted: Vec<(Offset, f32)> = Vec::new();
        for entry in self.idx.store.pos.iter() {
            let code = match entry.key {
                FeatureKey::Code(code) => code,
                FeatureKey::Name(_) => bail!(KmixError::NotKmerIndex),
            };
            match sel {
                None => wanted.push((entry.offset, 0.0)),
                Some(sel) => {
                    if let Some(&v) = sel.map.get(&code) {
                        wanted.push((entry.offset, v));
                    }
                }
            }
        }
        if let Some(sel) = sel {
            let missing = sel.len() - wanted.len();
            if missing != 0 {
                return Err(KmixError::MissingFeatures(missing).into());
            }
        }
        self.ctgs.clear();
        self.ctgs.reserve(wanted.len());
        for (offset, rep_val) in wanted {
            let seq = self.idx.tag(offset)?;
            self.ctgs.push(Contig::new(seq.into_bytes(), offset, rep_val));
        }
        info!("{} contigs to start with", self.ctgs.len());
        Ok(())
    }

    /// One pass over the knots at this overlap, against the contigs as they
    /// were at its start. Returns the number of merges.
    pub fn merge_pass(&mut self, ovlp: usize) -> Result<usize> {
        let stranded = self.idx.store.meta.stranded;
        let ki = KnotIndex::build(&self.ctgs, ovlp, stranded)?;
        let mut nb_merged = 0;
        for (knot, pred, succ) in ki.mergeable() {
            // absorbed earlier in this pass
            if self.ctgs[pred.ctg].is_used() || self.ctgs[succ.ctg].is_used() {
                continue;
            }
            if tracing::enabled!(Level::TRACE) {
                trace!(
                    "{}: {} ======= {}",
                    code_to_seq(knot.key, ovlp),
                    String::from_utf8_lossy(self.ctgs[pred.ctg].seq()),
                    String::from_utf8_lossy(self.ctgs[succ.ctg].seq())
                );
            }
            if self.compat != Compatibility::None {
                let pred_pos = self.ctgs[pred.ctg].rear_pos(pred.rc);
                let succ_pos = self.ctgs[succ.ctg].head_pos(succ.rc);
                self.idx.count_vect(&mut self.scratch.pred, pred_pos)?;
                self.idx.count_vect(&mut self.scratch.succ, succ_pos)?;
                let dist = self.scratch.distance(self.compat);
                if dist >= self.threshold {
                    trace!("distance {:.4}, not merged", dist);
                    continue;
                }
            }
            let (p, s) = pair_mut(&mut self.ctgs, pred.ctg, succ.ctg);
            // the base contig is never reverse complemented
            if self.rep_mode.keeps_first(p.rep_val(), s.rep_val()) {
                if pred.rc {
                    p.left_extend(s, !succ.rc, ovlp)?;
                } else {
                    p.right_extend(s, succ.rc, ovlp)?;
                }
            } else if succ.rc {
                s.right_extend(p, !pred.rc, ovlp)?;
            } else {
                s.left_extend(p, pred.rc, ovlp)?;
            }
            nb_merged += 1;
        }
        Ok(nb_merged)
    }

    /// Merge at each overlap from `max_ovlp` down to `min_ovlp`, each until
    /// no more merges occur.
    pub fn run(&mut self, min_ovlp: usize, max_ovlp: usize) -> Result<()> {
        for ovlp in (min_ovlp..=max_ovlp).rev() {
            info!("Merging contigs with overlap {}", ovlp);
            loop {
                let nb_merged = self.merge_pass(ovlp)?;
                self.ctgs.retain(|c| !c.is_used());
                debug!("{} merges, {} contigs left", nb_merged, self.ctgs.len());
                if nb_merged == 0 {
                    break;
                }
            }
        }
        info!("{} contigs after merging", self.ctgs.len());
        Ok(())
    }

    pub fn write_results<W: Write>(&mut self, mut out: W, has_value: bool, with_counts: bool) -> Result<()> {
        write!(out, "contig")?;
        if has_value {
            write!(out, "\trep-value")?;
        }
        write!(out, "\tnb-merged-kmer")?;
        if with_counts {
            write!(out, "\t{}", self.idx.store.meta.sample_names().join("\t"))?;
        }
        writeln!(out)?;

        let mut counts = Vec::new();
        for ctg in self.ctgs.iter() {
            out.write_all(ctg.seq())?;
            if has_value {
                write!(out, "\t{}", ctg.rep_val())?;
            }
            write!(out, "\t{}", ctg.nb_kmer())?;
            if with_counts {
                let vals = self.idx.count_vect(&mut counts, ctg.head_pos(false))?;
                write!(out, "\t{}", vals.iter().join("\t"))?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }
}

pub fn merge(cmd: MergeCmd) -> Result<()> {
    let idx = IndexReader::open(&cmd.idx_dir)?;
    let meta = &idx.store.meta;
    check_overlaps(meta, cmd.min_overlap, cmd.max_overlap)?;
    info!(
        "Index {:?}: {} {}-mers, {}, {} samples",
        cmd.idx_dir,
        idx.store.len(),
        meta.kmerlen,
        if meta.stranded { "stranded" } else { "unstranded" },
        meta.nb_smp
    );
    info!(
        "Overlap {}..={}, {:?} compatibility below {}, base contig by {:?}",
        cmd.min_overlap, cmd.max_overlap, cmd.compat, cmd.threshold, cmd.rep_mode
    );
    let sel = cmd
        .select
        .as_deref()
        .map(|path| Selection::load(path, meta.kmerlen, meta.stranded))
        .transpose()?;
    let has_value = sel.as_ref().map_or(false, |s| s.has_value);

    let out: Box<dyn Write> = match &cmd.out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot open file {path:?}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut merger = Merger::new(idx, cmd.compat, cmd.threshold, cmd.rep_mode);
    merger.init_contigs(sel.as_ref())?;
    merger.run(cmd.min_overlap, cmd.max_overlap)?;
    merger.write_results(out, has_value, cmd.with_counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;

    fn merger(tab: &str, dir: &std::path::Path, compat: Compatibility, rep_mode: RepMode) -> Merger {
        build_index(tab.as_bytes(), dir, 3, false).unwrap();
        Merger::new(IndexReader::open(dir).unwrap(), compat, 0.25, rep_mode)
    }

    #[test]
    fn rep_modes() {
        assert!(RepMode::Min.keeps_first(1.0, 1.0));
        assert!(!RepMode::Min.keeps_first(2.0, 1.0));
        assert!(RepMode::Max.keeps_first(2.0, 1.0));
        assert!(RepMode::MinAbs.keeps_first(-1.0, 2.0));
        assert!(!RepMode::MinAbs.keeps_first(-3.0, 2.0));
        assert!(RepMode::MaxAbs.keeps_first(-3.0, 2.0));
    }

    #[test]
    fn overlap_bounds() {
        let mut meta = IndexMeta {
            nb_smp: 1,
            kmerlen: 5,
            stranded: false,
            colnames: vec!["feature".into(), "s1".into()],
            smp_sum: vec![1.0],
        };
        assert!(check_overlaps(&meta, 1, 4).is_ok());
        let err = check_overlaps(&meta, 2, 5).unwrap_err();
        assert_eq!(
            err.downcast_ref::<KmixError>(),
            Some(&KmixError::OverlapTooLong { ovlp: 5, kmerlen: 5 })
        );
        assert!(check_overlaps(&meta, 0, 3).is_err());
        assert!(check_overlaps(&meta, 4, 3).is_err());
        meta.kmerlen = 0;
        let err = check_overlaps(&meta, 1, 2).unwrap_err();
        assert_eq!(err.downcast_ref::<KmixError>(), Some(&KmixError::NotKmerIndex));
    }

    #[test]
    fn chain_in_two_passes() {
        let dir = tempfile::tempdir().unwrap();
        let tab = "feature\ts1\ts2\nAAA\t1\t1\nAAT\t1\t1\nATC\t1\t1\nTCG\t1\t1\n";
        let mut m = merger(tab, dir.path(), Compatibility::None, RepMode::Min);
        m.init_contigs(None).unwrap();
        assert_eq!(m.merge_pass(2).unwrap(), 2);
        m.ctgs.retain(|c| !c.is_used());
        let seqs: Vec<_> = m.contigs().iter().map(|c| c.seq().to_vec()).collect();
        assert_eq!(seqs, vec![b"AAAT".to_vec(), b"ATCG".to_vec()]);
        assert_eq!(m.merge_pass(2).unwrap(), 1);
        m.ctgs.retain(|c| !c.is_used());
        assert_eq!(m.merge_pass(2).unwrap(), 0);
        assert_eq!(m.contigs()[0].seq(), b"AAATCG");
        assert_eq!(m.contigs()[0].nb_kmer(), 4);
    }

    #[test]
    fn reverse_complemented_neighbour() {
        let dir = tempfile::tempdir().unwrap();
        // GATT reads AATC on the other strand
        let tab = "feature\ts1\ts2\nCAAT\t1\t2\nGATT\t2\t4\n";
        build_index(tab.as_bytes(), dir.path(), 4, false).unwrap();
        let idx = IndexReader::open(dir.path()).unwrap();
        let mut m = Merger::new(idx, Compatibility::Pearson, 0.25, RepMode::Min);
        m.init_contigs(None).unwrap();
        m.run(3, 3).unwrap();
        assert_eq!(m.contigs().len(), 1);
        assert_eq!(m.contigs()[0].seq(), b"CAATC");

        let mut out = Vec::new();
        m.write_results(&mut out, false, true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "contig\tnb-merged-kmer\ts1\ts2\nCAATC\t2\t1\t2\n"
        );
    }

    #[test]
    fn incompatible_counts() {
        let dir = tempfile::tempdir().unwrap();
        let tab = "feature\ts1\ts2\ts3\nAAT\t1\t5\t9\nATC\t9\t5\t1\n";
        let mut m = merger(tab, dir.path(), Compatibility::Pearson, RepMode::Min);
        m.init_contigs(None).unwrap();
        m.run(2, 2).unwrap();
        assert_eq!(m.contigs().len(), 2);

        let mut m = merger(tab, dir.path(), Compatibility::None, RepMode::Min);
        m.init_contigs(None).unwrap();
        m.run(2, 2).unwrap();
        assert_eq!(m.contigs().len(), 1);
    }

    #[test]
    fn selected_base_contig() {
        let dir = tempfile::tempdir().unwrap();
        let tab = "feature\ts1\nAAT\t3\nATC\t4\nGGG\t1\n";
        let mut m = merger(tab, dir.path(), Compatibility::None, RepMode::Min);
        let sel = Selection::from_reader("AAT\t5\nATC\t1\n".as_bytes(), 3, false).unwrap();
        m.init_contigs(Some(&sel)).unwrap();
        assert_eq!(m.contigs().len(), 2);
        m.run(2, 2).unwrap();
        let ctg = &m.contigs()[0];
        assert_eq!((ctg.seq(), ctg.rep_val()), (&b"AATC"[..], 1.0));

        let mut out = Vec::new();
        m.write_results(&mut out, true, false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "contig\trep-value\tnb-merged-kmer\nAATC\t1\t2\n"
        );
    }

    #[test]
    fn selection_not_in_index() {
        let dir = tempfile::tempdir().unwrap();
        let tab = "feature\ts1\nAAT\t3\n";
        let mut m = merger(tab, dir.path(), Compatibility::None, RepMode::Min);
        let sel = Selection::from_reader("AAT\nCCC\nGGC\n".as_bytes(), 3, false).unwrap();
        let err = m.init_contigs(Some(&sel)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<KmixError>(),
            Some(&KmixError::MissingFeatures(2))
        );
    }
}
