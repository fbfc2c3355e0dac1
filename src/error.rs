// (c) Roel Kluin, 2023, GPL v3

use thiserror::Error;

/// Faults that abort an index build or a merge run. They travel inside
/// `anyhow::Error` and can be recovered with `downcast_ref`.
#[derive(Error, Debug, PartialEq)]
pub enum KmixError {
    #[error("invalid base {base:?} in sequence {seq}")]
    InvalidBase { base: char, seq: String },

    #[error("sequence {seq} has length {len}, expected {expected}")]
    KmerLength {
        seq: String,
        len: usize,
        expected: usize,
    },

    #[error("feature {0} is not unique in the count table")]
    DuplicateKey(String),

    #[error("sample numbers are not consistent for {feature}: {expected} vs {found}")]
    SampleCountMismatch {
        feature: String,
        expected: usize,
        found: usize,
    },

    #[error("{0} feature(s) in the selection do not exist in the index")]
    MissingFeatures(usize),

    #[error("sequence {0} is listed more than once in the selection file")]
    DuplicateSelection(String),

    #[error("overlap ({ovlp}) should be shorter than the k-mer length ({kmerlen})")]
    OverlapTooLong { ovlp: usize, kmerlen: usize },

    #[error("merging needs an index in k-mer mode, rebuild the index with a k-mer length")]
    NotKmerIndex,

    #[error("overlap {ovlp} exceeds contig length {len}")]
    ExtensionOverlap { ovlp: usize, len: usize },
}
