#[macro_use]
extern crate derive_new;

pub mod contig;
pub mod distance;
pub mod error;
pub mod index;
pub mod kmer;
pub mod kmerstore;
pub mod knot;
pub mod matrix;
pub mod merge;
pub mod new_types;
pub mod query;
pub mod selection;
