// (c) Roel Kluin, 2023, GPL v3

use crate::error::KmixError;
use crate::kmer::{seq_to_key, MAX_KMERLEN};
use crate::kmerstore::{
    create_in, in_dir, remove_in, FeatureKey, IndexMeta, KmerStore, PosEntry, MAT_FILE,
    META_FILE, POS_FILE,
};
use crate::matrix::MatrixWriter;
use crate::new_types::offset::Offset;
use ahash::AHashMap;
use anyhow::{anyhow, ensure, Context, Result};
use clap::Args;
use flate2::read::MultiGzDecoder;
use std::collections::hash_map::Entry;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct IndexCmd {
    /// Tab separated count table, features in the first column, optionally gzipped; - for stdin
    #[arg(short = 'i', long, value_name = "COUNT_TAB", required = true)]
    count_tab: PathBuf,

    /// Folder to write the index to, created if needed
    #[arg(short = 'o', long, value_name = "DIR", required = true)]
    out_dir: PathBuf,

    /// Length of the k-mers in the first column; 0 for features of any kind
    #[arg(short = 'k', long, default_value = "0")]
    kmer_len: usize,

    /// The k-mers were counted without strand, so a k-mer and its reverse complement are one feature
    #[arg(short = 'u', long)]
    unstranded: bool,

    /// Overwrite an index already in the output folder
    #[arg(short = 'f', long)]
    force: bool,
}

/// Counts of one table row, checked against the header.
fn parse_counts(record: &csv::StringRecord, nb_smp: usize, counts: &mut Vec<f32>) -> Result<()> {
    let feature = record.get(0).unwrap_or_default();
    counts.clear();
    for term in record.iter().skip(1) {
        counts.push(
            term.trim()
                .parse::<f32>()
                .with_context(|| format!("count {term:?} for {feature} is not a number"))?,
        );
    }
    if counts.len() != nb_smp {
        return Err(KmixError::SampleCountMismatch {
            feature: feature.to_string(),
            expected: nb_smp,
            found: counts.len(),
        }
        .into());
    }
    Ok(())
}

/// One sequential pass over a count table: every row's counts go to the
/// matrix blob, its key and offset to the position directory.
pub fn build_index<R: Read>(
    count_tab: R,
    idx_dir: &Path,
    kmerlen: usize,
    stranded: bool,
) -> Result<KmerStore> {
    ensure!(
        kmerlen <= MAX_KMERLEN,
        "k-mer length {} not supported, at most {}",
        kmerlen,
        MAX_KMERLEN
    );
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(count_tab);

    let colnames: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
    ensure!(
        colnames.first().map_or(false, |c| !c.is_empty()),
        "cannot parse column information with an empty header line"
    );
    let nb_smp = colnames.len() - 1;
    ensure!(nb_smp > 0, "no sample column found");
    info!("{} samples: {}", nb_smp, colnames[1..].join(", "));

    // a previous index in this folder stops being valid from here on
    remove_in(idx_dir, META_FILE)?;
    remove_in(idx_dir, POS_FILE)?;
    let mut mw = MatrixWriter::new(create_in(idx_dir, MAT_FILE)?);
    let mut pos = Vec::new();
    let mut lookup: AHashMap<FeatureKey, Offset> = AHashMap::new();
    let mut smp_sum = vec![0.0_f64; nb_smp];
    let mut counts = Vec::with_capacity(nb_smp);
    let mut record = csv::StringRecord::new();

    while rdr.read_record(&mut record)? {
        parse_counts(&record, nb_smp, &mut counts)?;
        let feature = record.get(0).unwrap_or_default();
        let (key, tag) = if kmerlen != 0 {
            let code = seq_to_key(feature.as_bytes(), kmerlen, stranded)?;
            (FeatureKey::Code(code), Some(feature.as_bytes()))
        } else {
            (FeatureKey::Name(feature.to_string()), None)
        };
        let slot = match lookup.entry(key) {
            Entry::Occupied(_) => {
                return Err(KmixError::DuplicateKey(feature.to_string()).into());
            }
            Entry::Vacant(slot) => slot,
        };
        let offset = mw.push(&counts, tag)?;
        for (sum, &x) in smp_sum.iter_mut().zip(counts.iter()) {
            *sum += f64::from(x);
        }
        pos.push(PosEntry::new(slot.key().clone(), offset));
        slot.insert(offset);
    }
    mw.finish()?;

    let meta = IndexMeta {
        nb_smp,
        kmerlen,
        stranded,
        colnames,
        smp_sum,
    };
    let ks = KmerStore::from_parts(meta, pos, lookup);
    ks.write(idx_dir)?;
    Ok(ks)
}

/// Open a count table: `-` is stdin, a `.gz` extension is decompressed.
pub fn open_count_tab(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).map_err(|e| anyhow!("cannot open count table {:?}: {}", path, e))?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file)))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn index(cmd: IndexCmd) -> Result<()> {
    fs::create_dir_all(&cmd.out_dir)
        .with_context(|| format!("cannot create index folder {:?}", cmd.out_dir))?;
    let meta_file = in_dir(&cmd.out_dir, META_FILE);
    ensure!(
        cmd.force || !meta_file.exists(),
        "{meta_file:?} already exists! use --force to overwrite"
    );
    info!("Reading {:?}", cmd.count_tab);
    let count_tab = open_count_tab(&cmd.count_tab)?;

    info!("Writing index to {:?}", cmd.out_dir);
    let ks = build_index(count_tab, &cmd.out_dir, cmd.kmer_len, !cmd.unstranded)?;
    make_stats(&ks);
    Ok(())
}

fn make_stats(ks: &KmerStore) {
    let meta = &ks.meta;
    info!(
        "{} features indexed over {} samples ({})",
        ks.len(),
        meta.nb_smp,
        if meta.is_kmer_mode() {
            format!(
                "{}-mers, {}",
                meta.kmerlen,
                if meta.stranded { "stranded" } else { "unstranded" }
            )
        } else {
            "general features".to_string()
        }
    );
    for (name, nf) in meta.sample_names().iter().zip(meta.norm_factors()) {
        debug!("normalization factor {}: {:.4}", name, nf);
        if !(0.01..=100.0).contains(&nf) {
            warn!(
                "sample {} has normalization factor {:.4}, above 100 or below 0.01",
                name, nf
            );
        }
    }
}
