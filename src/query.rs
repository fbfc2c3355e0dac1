use crate::matrix::IndexReader;
use anyhow::Result;
use clap::Args;
use itertools::Itertools;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct QueryCmd {
    /// Index folder written by `kmix index`
    #[arg(short = 'i', long, value_name = "DIR", required = true)]
    pub idx_dir: PathBuf,

    /// Features to print the counts of; k-mers are found on either strand in an unstranded index
    #[arg(required = true)]
    pub features: Vec<String>,

    /// Scale counts by the per-sample normalization factors
    #[arg(short = 'n', long)]
    pub norm: bool,
}

/// Count rows of the requested features, in the order asked. Any feature
/// absent from the index fails the whole query.
pub fn query_counts<W: Write>(idx: &mut IndexReader, features: &[String], norm: bool, mut out: W) -> Result<()> {
    let offsets = features
        .iter()
        .map(|f| idx.store.lookup(f))
        .collect::<Result<Vec<_>>>()?;
    let nf = if norm {
        idx.store.meta.norm_factors()
    } else {
        Vec::new()
    };
    let mut buf = Vec::new();
    for (feature, offset) in features.iter().zip(offsets) {
        let counts = if norm {
            idx.norm_count_vect(&mut buf, offset, &nf)?
        } else {
            idx.count_vect(&mut buf, offset)?
        };
        writeln!(out, "{}\t{}", feature, counts.iter().join("\t"))?;
    }
    out.flush()?;
    Ok(())
}

pub fn query(cmd: QueryCmd) -> Result<()> {
    let mut idx = IndexReader::open(&cmd.idx_dir)?;
    info!("{} features in {:?}", idx.store.len(), cmd.idx_dir);
    let out = BufWriter::new(io::stdout().lock());
    query_counts(&mut idx, &cmd.features, cmd.norm, out)
}
