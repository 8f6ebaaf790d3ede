use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use flate2::read::GzDecoder;
use tracing::{debug, warn};
use crate::coll::fast::FastCollection;
use crate::coll::text_format;
use crate::core::error::{Error, Result};
use crate::core::types::{file_timestamp, Timestamp};
use crate::vocabulary::merger::VocabularyMerger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Skip,
    Vocabulary,             // *.voc
    Tags,                   // *.tag
    CompressedVocabulary,   // *.voc.gz
    CompressedTags,         // *.tag.gz
}

impl FileType {
    pub fn of(name: &str) -> FileType {
        // Dot files, and names with nothing before the extension
        if name.starts_with('.') || name.len() <= 4 {
            return FileType::Skip;
        }
        if name.ends_with(".voc") {
            return FileType::Vocabulary;
        }
        if name.ends_with(".tag") {
            return FileType::Tags;
        }
        if name.len() <= 7 {
            return FileType::Skip;
        }
        if name.ends_with(".voc.gz") {
            return FileType::CompressedVocabulary;
        }
        if name.ends_with(".tag.gz") {
            return FileType::CompressedTags;
        }
        FileType::Skip
    }
}

/// A directory of vocabulary and tag source files
#[derive(Debug, Clone)]
pub struct SourceDir {
    path: PathBuf,
}

impl SourceDir {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SourceDir { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classified entries sorted by name; a missing directory has none
    pub fn entries(&self) -> Result<Vec<(PathBuf, FileType)>> {
        let dir = match fs::read_dir(&self.path) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| Error::io(&self.path, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let kind = FileType::of(name);
            if kind != FileType::Skip {
                entries.push((entry.path(), kind));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn newest(&self, wanted: &[FileType]) -> Timestamp {
        match self.entries() {
            Ok(entries) => entries
                .iter()
                .filter(|(_, kind)| wanted.contains(kind))
                .map(|(path, _)| file_timestamp(path))
                .max()
                .unwrap_or(0),
            Err(e) => {
                warn!(dir = %self.path.display(), error = %e, "cannot scan source directory");
                0
            }
        }
    }

    /// Newest `.voc` or `.voc.gz` file, 0 when there is none
    pub fn vocabulary_timestamp(&self) -> Timestamp {
        self.newest(&[FileType::Vocabulary, FileType::CompressedVocabulary])
    }

    /// Newest `.tag` or `.tag.gz` file, 0 when there is none
    pub fn tags_timestamp(&self) -> Timestamp {
        self.newest(&[FileType::Tags, FileType::CompressedTags])
    }

    pub fn timestamp(&self) -> Timestamp {
        self.newest(&[
            FileType::Vocabulary,
            FileType::Tags,
            FileType::CompressedVocabulary,
            FileType::CompressedTags,
        ])
    }

    fn open(path: &Path) -> Result<fs::File> {
        fs::File::open(path).map_err(|e| Error::io(path, e))
    }

    /// Merge every vocabulary file, plain or gzipped, in name order.
    /// Returns the number of files read.
    pub fn read_vocabularies(&self, merger: &mut VocabularyMerger) -> Result<usize> {
        let mut read = 0;
        for (path, kind) in self.entries()? {
            let source = path.display().to_string();
            match kind {
                FileType::Vocabulary => merger.read_file(&path)?,
                FileType::CompressedVocabulary => {
                    merger.read(BufReader::new(GzDecoder::new(Self::open(&path)?)), &source)?
                }
                _ => continue,
            };
            read += 1;
        }
        debug!(dir = %self.path.display(), files = read, "read vocabulary sources");
        Ok(read)
    }

    /// Merge every tag file, plain or gzipped, in name order. Returns the
    /// number of files read.
    pub fn read_tags(&self, coll: &mut FastCollection) -> Result<usize> {
        let mut read = 0;
        for (path, kind) in self.entries()? {
            let source = path.display().to_string();
            match kind {
                FileType::Tags => text_format::read_into(Self::open(&path)?, &source, coll)?,
                FileType::CompressedTags => text_format::read_into(GzDecoder::new(Self::open(&path)?), &source, coll)?,
                _ => continue,
            };
            read += 1;
        }
        debug!(dir = %self.path.display(), files = read, "read tag sources");
        Ok(read)
    }
}
