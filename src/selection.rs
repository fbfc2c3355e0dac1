use crate::error::KmixError;
use crate::kmer::seq_to_key;
use ahash::AHashMap;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, trace};

/// K-mers to merge on, keyed like the index, with their representative value.
#[derive(Debug, Default)]
pub struct Selection {
    pub map: AHashMap<u64, f32>,
    /// whether any line carried a value
    pub has_value: bool,
}

impl Selection {
    /// One k-mer per line, optionally followed by a tab or space and a value.
    /// K-mers without a value get 0.
    pub fn from_reader<R: BufRead>(rdr: R, kmerlen: usize, stranded: bool) -> Result<Self> {
        let mut sel = Selection::default();
        for (nr, line) in rdr.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (seq, value) = match line.split_once(&['\t', ' '][..]) {
                Some((seq, v)) => {
                    let v: f32 = v.trim().parse().with_context(|| {
                        format!("selection line {}: value {:?} is not a number", nr + 1, v)
                    })?;
                    sel.has_value = true;
                    (seq, v)
                }
                None => (line, 0.0),
            };
            let key = seq_to_key(seq.as_bytes(), kmerlen, stranded)
                .with_context(|| format!("selection line {}", nr + 1))?;
            if sel.map.insert(key, value).is_some() {
                return Err(KmixError::DuplicateSelection(seq.to_string()).into());
            }
            trace!("selected {}\t{}", seq, value);
        }
        debug!("{} k-mers selected", sel.map.len());
        Ok(sel)
    }

    pub fn load(path: &Path, kmerlen: usize, stranded: bool) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("selection file {path:?} not accessible"))?;
        Selection::from_reader(BufReader::new(file), kmerlen, stranded)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
