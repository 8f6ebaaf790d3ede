use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use crate::core::error::{Error, Result};

/// Memory-mapped file for zero-copy reads
#[derive(Debug)]
pub struct MmapFile {
    mmap: Option<Mmap>,     // None for empty files
    pub len: usize,
    pub path: PathBuf,
}

impl MmapFile {
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let metadata = file.metadata().map_err(|e| Error::io(&path, e))?;
        let len = metadata.len() as usize;

        let mmap = if len == 0 {
            None
        } else {
            // The files are replaced by rename, never rewritten in place
            let mmap = unsafe { MmapOptions::new().len(len).map(&file) }
                .map_err(|e| Error::io(&path, e))?;
            Some(mmap)
        };

        Ok(MmapFile { mmap, len, path })
    }

    pub fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    /// Bounds-checked view of `len` bytes at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.data().get(offset..offset.checked_add(len)?)
    }
}
