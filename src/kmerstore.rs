// (c) Roel Kluin, 2023, GPL v3

use crate::error::KmixError;
use crate::kmer::seq_to_key;
use crate::new_types::offset::Offset;
use ahash::AHashMap;
use anyhow::{ensure, Context, Result};
use bincode::{deserialize_from, serialize_into};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const META_FILE: &str = "idx-meta.bin";
pub const POS_FILE: &str = "idx-pos.bin";
pub const MAT_FILE: &str = "idx-mat.bin";

/// Index-wide information, fixed once the index is built.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub nb_smp: usize,
    /// 0 if features are not k-mers of one length.
    pub kmerlen: usize,
    pub stranded: bool,
    /// header of the count table, the feature column first.
    pub colnames: Vec<String>,
    /// per sample sum of counts over all features
    pub smp_sum: Vec<f64>,
}

impl IndexMeta {
    pub fn is_kmer_mode(&self) -> bool {
        self.kmerlen != 0
    }
    pub fn sample_names(&self) -> &[String] {
        self.colnames.get(1..).unwrap_or(&[])
    }
    /// norm_count = raw_count * nf; 0 for a sample without counts.
    pub fn norm_factors(&self) -> Vec<f64> {
        let mean_sum = self.smp_sum.iter().sum::<f64>() / self.nb_smp.max(1) as f64;
        self.smp_sum
            .iter()
            .map(|&s| if s == 0.0 { 0.0 } else { mean_sum / s })
            .collect()
    }
}

/// Key of a feature in the position directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    /// twobit code of a k-mer, canonical when the index is unstranded
    Code(u64),
    /// literal feature string in general mode
    Name(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, new)]
pub struct PosEntry {
    pub key: FeatureKey,
    pub offset: Offset,
}

/// Metadata and position directory of an index, held in memory. The count
/// matrix itself stays on disk, see `matrix::IndexReader`.
pub struct KmerStore {
    pub meta: IndexMeta,
    pub pos: Vec<PosEntry>,
    lookup: AHashMap<FeatureKey, Offset>,
}

impl KmerStore {
    pub fn new(meta: IndexMeta, pos: Vec<PosEntry>) -> Self {
        let lookup = pos.iter().map(|e| (e.key.clone(), e.offset)).collect();
        KmerStore { meta, pos, lookup }
    }

    pub fn open<P: AsRef<Path>>(idx_dir: P) -> Result<Self> {
        let idx_dir = idx_dir.as_ref();
        let meta: IndexMeta = deserialize_from(open_in(idx_dir, META_FILE)?)
            .with_context(|| format!("corrupted index metadata in {idx_dir:?}"))?;
        let pos: Vec<PosEntry> = deserialize_from(open_in(idx_dir, POS_FILE)?)
            .with_context(|| format!("corrupted index positions in {idx_dir:?}"))?;
        ensure!(
            meta.smp_sum.len() == meta.nb_smp,
            "index metadata in {:?} has {} sample sums for {} samples",
            idx_dir,
            meta.smp_sum.len(),
            meta.nb_smp
        );
        Ok(KmerStore::new(meta, pos))
    }

    /// Store with a lookup map already filled while building `pos`.
    pub(crate) fn from_parts(
        meta: IndexMeta,
        pos: Vec<PosEntry>,
        lookup: AHashMap<FeatureKey, Offset>,
    ) -> Self {
        debug_assert_eq!(pos.len(), lookup.len());
        KmerStore { meta, pos, lookup }
    }

    /// The metadata goes last: an index without it does not open.
    pub fn write<P: AsRef<Path>>(&self, idx_dir: P) -> Result<()> {
        let idx_dir = idx_dir.as_ref();
        let mut pos_out = create_in(idx_dir, POS_FILE)?;
        serialize_into(&mut pos_out, &self.pos)?;
        pos_out.flush()?;
        let mut meta_out = create_in(idx_dir, META_FILE)?;
        serialize_into(&mut meta_out, &self.meta)?;
        meta_out.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// The key a feature string is stored under in this index.
    pub fn key_for(&self, feature: &str) -> Result<FeatureKey> {
        if self.meta.is_kmer_mode() {
            seq_to_key(feature.as_bytes(), self.meta.kmerlen, self.meta.stranded)
                .map(FeatureKey::Code)
        } else {
            Ok(FeatureKey::Name(feature.to_string()))
        }
    }

    pub fn get(&self, key: &FeatureKey) -> Option<Offset> {
        self.lookup.get(key).copied()
    }

    /// Offset of a feature's counts, or a missing-feature error.
    pub fn lookup(&self, feature: &str) -> Result<Offset> {
        let key = self.key_for(feature)?;
        self.get(&key)
            .ok_or(KmixError::MissingFeatures(1))
            .with_context(|| format!("{feature} not found in index"))
    }
}

pub(crate) fn in_dir(idx_dir: &Path, name: &str) -> PathBuf {
    idx_dir.join(name)
}

pub(crate) fn open_in(idx_dir: &Path, name: &str) -> Result<BufReader<File>> {
    let path = in_dir(idx_dir, name);
    File::open(&path)
        .map(BufReader::new)
        .with_context(|| format!("index file {path:?} not found, index folder missing or corrupted"))
}

/// Remove an index file if present.
pub(crate) fn remove_in(idx_dir: &Path, name: &str) -> Result<()> {
    let path = in_dir(idx_dir, name);
    match fs::remove_file(&path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("cannot remove {path:?}"))
        }
        _ => Ok(()),
    }
}

pub(crate) fn create_in(idx_dir: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = in_dir(idx_dir, name);
    File::create(&path)
        .map(BufWriter::new)
        .with_context(|| format!("cannot create {path:?}, does the output folder exist?"))
}
