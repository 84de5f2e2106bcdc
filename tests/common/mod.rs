//! Synthetic Xbox360 images and Xex files for tests

#![allow(dead_code)]

pub mod builder;
pub use builder::{dir, file, raw_root, XexBuilder, XisoBuilder};

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// In-memory image where only written ranges take memory, the rest reads as zeros.
#[derive(Debug, Clone, Default)]
pub struct SparseImage {
    chunks: BTreeMap<u64, Vec<u8>>,
    len: u64,
    pos: u64,
}

impl SparseImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn set_len(&mut self, len: u64) {
        self.len = self.len.max(len);
    }

    /// Writes over an existing chunk when it covers the range, otherwise adds a new one.
    /// Partially overlapping writes are not supported.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let end = offset + data.len() as u64;
        self.set_len(end);

        if let Some((start, chunk)) = self.chunks.range_mut(..=offset).next_back() {
            if *start + chunk.len() as u64 >= end {
                let from = (offset - *start) as usize;
                chunk[from..from + data.len()].copy_from_slice(data);
                return;
            }
        }
        self.chunks.insert(offset, data.to_vec());
    }

    /// Writes the image as a sparse file in the temp directory.
    pub fn write_temp(&self, name: &str) -> TempImage {
        let path = std::env::temp_dir().join(format!("xiso-info-{}-{}", std::process::id(), name));
        let mut out = std::fs::File::create(&path).expect("create temp image");
        out.set_len(self.len).expect("size temp image");
        for (offset, data) in &self.chunks {
            out.seek(SeekFrom::Start(*offset)).expect("seek temp image");
            out.write_all(data).expect("write temp image");
        }
        TempImage { path }
    }
}

impl Read for SparseImage {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let n = buf.len().min((self.len - self.pos) as usize);
        let start = self.pos;
        let end = start + n as u64;
        buf[..n].fill(0);

        for (offset, data) in self.chunks.range(..end) {
            let chunk_end = offset + data.len() as u64;
            if chunk_end <= start {
                continue;
            }
            let from = start.max(*offset);
            let to = end.min(chunk_end);
            buf[(from - start) as usize..(to - start) as usize]
                .copy_from_slice(&data[(from - offset) as usize..(to - offset) as usize]);
        }

        self.pos = end;
        Ok(n)
    }
}

impl Seek for SparseImage {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::End(d) => self.len as i128 + d as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Temp file removed on drop.
pub struct TempImage {
    pub path: PathBuf,
}

impl TempImage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
