use crate::kmerstore::{open_in, KmerStore, MAT_FILE};
use crate::new_types::offset::Offset;
use anyhow::{ensure, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};

const TAG_END: u8 = b'\n';

/// Appends count vectors, each optionally followed by the literal feature.
pub struct MatrixWriter<W: Write> {
    out: W,
    pos: u64,
}

impl<W: Write> MatrixWriter<W> {
    pub fn new(out: W) -> Self {
        MatrixWriter { out, pos: 0 }
    }
    /// Write one feature; returns the offset of its count vector.
    pub fn push(&mut self, counts: &[f32], tag: Option<&[u8]>) -> Result<Offset> {
        let offset = Offset::from(self.pos);
        for x in counts {
            self.out.write_all(&x.to_le_bytes())?;
        }
        self.pos += (counts.len() * size_of::<f32>()) as u64;
        if let Some(tag) = tag {
            ensure!(
                !tag.contains(&TAG_END),
                "feature may not contain a line end"
            );
            self.out.write_all(tag)?;
            self.out.write_all(&[TAG_END])?;
            self.pos += tag.len() as u64 + 1;
        }
        Ok(offset)
    }
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Random access to the matrix blob by offset. A reader owns its cursor;
/// concurrent readers each need their own (see `IndexReader::reopen`).
pub struct MatrixReader<R> {
    mat: R,
    bytes: Vec<u8>,
}

impl<R: BufRead + Seek> MatrixReader<R> {
    pub fn new(mat: R) -> Self {
        MatrixReader { mat, bytes: Vec::new() }
    }

    /// Read the `nb_smp` counts at `offset` into `buf`, replacing its contents.
    pub fn count_vect<'a>(
        &mut self,
        buf: &'a mut Vec<f32>,
        offset: Offset,
        nb_smp: usize,
    ) -> Result<&'a [f32]> {
        self.mat.seek(SeekFrom::Start(offset.as_u64()))?;
        self.bytes.resize(nb_smp * size_of::<f32>(), 0);
        self.mat.read_exact(&mut self.bytes)?;
        buf.clear();
        buf.extend(self.bytes.chunks_exact(size_of::<f32>()).map(|c| {
            let mut le = [0_u8; size_of::<f32>()];
            le.copy_from_slice(c);
            f32::from_le_bytes(le)
        }));
        Ok(&buf[..])
    }

    /// The literal feature stored past the counts at `offset`.
    pub fn tag(&mut self, offset: Offset, nb_smp: usize) -> Result<String> {
        self.mat.seek(SeekFrom::Start(offset.past_counts(nb_smp).as_u64()))?;
        self.bytes.clear();
        self.mat.read_until(TAG_END, &mut self.bytes)?;
        ensure!(
            self.bytes.last() == Some(&TAG_END),
            "no feature stored at {}, index corrupted?",
            offset
        );
        self.bytes.pop();
        Ok(String::from_utf8(self.bytes.clone())?)
    }
}

/// An opened index: metadata and directory in memory, matrix on disk.
pub struct IndexReader {
    pub store: KmerStore,
    mat: MatrixReader<BufReader<File>>,
    idx_dir: PathBuf,
}

impl IndexReader {
    pub fn open<P: AsRef<Path>>(idx_dir: P) -> Result<Self> {
        let idx_dir = idx_dir.as_ref();
        let store = KmerStore::open(idx_dir)?;
        let mat = MatrixReader::new(open_in(idx_dir, MAT_FILE)?);
        Ok(IndexReader {
            store,
            mat,
            idx_dir: idx_dir.to_path_buf(),
        })
    }

    /// Another reader on the same index, with a cursor of its own.
    pub fn reopen(&self) -> Result<Self> {
        IndexReader::open(&self.idx_dir)
    }

    pub fn nb_smp(&self) -> usize {
        self.store.meta.nb_smp
    }

    pub fn count_vect<'a>(&mut self, buf: &'a mut Vec<f32>, offset: Offset) -> Result<&'a [f32]> {
        let nb_smp = self.nb_smp();
        self.mat.count_vect(buf, offset, nb_smp)
    }

    /// Counts scaled by the per-sample normalization factors.
    pub fn norm_count_vect<'a>(
        &mut self,
        buf: &'a mut Vec<f32>,
        offset: Offset,
        nf: &[f64],
    ) -> Result<&'a [f32]> {
        ensure!(nf.len() == self.nb_smp(), "one normalization factor per sample");
        self.count_vect(buf, offset)?;
        for (x, f) in buf.iter_mut().zip(nf) {
            *x = (f64::from(*x) * f) as f32;
        }
        Ok(&buf[..])
    }

    /// The feature as it was written in the count table, k-mer mode only.
    pub fn tag(&mut self, offset: Offset) -> Result<String> {
        ensure!(
            self.store.meta.is_kmer_mode(),
            "features are only stored next to their counts in k-mer mode"
        );
        let nb_smp = self.nb_smp();
        self.mat.tag(offset, nb_smp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn push_and_read() {
        let mut mw = MatrixWriter::new(Vec::new());
        let a = mw.push(&[1.0, 2.5, 0.0], Some(&b"AAT"[..])).unwrap();
        let b = mw.push(&[3.0, 4.0, 5.0], Some(&b"ATC"[..])).unwrap();
        let c = mw.push(&[6.0, 7.0, 8.0], None).unwrap();
        assert_eq!(a, Offset::zero());
        assert_eq!(b.as_u64(), 12 + 4);
        assert_eq!(c.as_u64(), 2 * 16);
        let blob = mw.finish().unwrap();
        assert_eq!(blob.len(), 2 * 16 + 12);

        let mut mr = MatrixReader::new(Cursor::new(blob));
        let mut buf = vec![9.0; 7];
        assert_eq!(mr.count_vect(&mut buf, b, 3).unwrap(), &[3.0, 4.0, 5.0]);
        assert_eq!(mr.count_vect(&mut buf, a, 3).unwrap(), &[1.0, 2.5, 0.0]);
        assert_eq!(mr.count_vect(&mut buf, c, 3).unwrap(), &[6.0, 7.0, 8.0]);
        assert_eq!(mr.tag(b, 3).unwrap(), "ATC");
        assert_eq!(mr.tag(a, 3).unwrap(), "AAT");
    }

    #[test]
    fn read_past_end() {
        let mut mw = MatrixWriter::new(Vec::new());
        let a = mw.push(&[1.0, 2.0], None).unwrap();
        let mut mr = MatrixReader::new(Cursor::new(mw.finish().unwrap()));
        let mut buf = Vec::new();
        assert!(mr.count_vect(&mut buf, a, 3).is_err());
        assert!(mr.tag(a, 2).is_err());
    }

    #[test]
    fn rejects_line_end_in_tag() {
        let mut mw = MatrixWriter::new(Vec::new());
        assert!(mw.push(&[1.0], Some(&b"A\nT"[..])).is_err());
    }
}
