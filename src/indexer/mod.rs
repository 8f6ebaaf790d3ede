//! Staleness-driven rebuilds of the vocabulary and debtags indexes.
//!
//! Each index exists in a system location, shared by everybody, and in a
//! per-user location used when the user has sources of their own or cannot
//! write the system one. [`Indexer`] holds the decision logic; the
//! [`IndexBuilder`] plugged into it knows how to merge sources and write the
//! data file and its master index.

pub mod debtags_indexer;
pub mod freshness;
pub mod vocabulary_indexer;

use std::ffi::CString;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{format_timestamp, Timestamp};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::{remove_if_exists, IndexPaths, StorageLayout};
use crate::storage::source_dir::SourceDir;

pub use debtags_indexer::{obtain_working_debtags, DebtagsBuilder, DebtagsIndexer};
pub use freshness::{Location, Timestamps};
pub use vocabulary_indexer::{obtain_working_vocabulary, VocabularyBuilder, VocabularyIndexer};

pub trait IndexBuilder {
    /// Name used in log lines
    fn kind(&self) -> &'static str;

    /// Newest source this index depends on, 0 when there is none
    fn source_timestamp(&self, dir: &SourceDir) -> Timestamp;

    fn system_paths<'a>(&self, layout: &'a StorageLayout) -> &'a IndexPaths;

    fn user_paths<'a>(&self, layout: &'a StorageLayout) -> &'a IndexPaths;

    /// Merge `sources` in order and write data plus index at `out`.
    /// Returns false, touching nothing, when the sources hold no records.
    fn build(&self, sources: &[&SourceDir], out: &IndexPaths) -> Result<bool>;
}

pub struct Indexer<B: IndexBuilder> {
    builder: B,
    layout: StorageLayout,
    main_source: SourceDir,
    user_source: SourceDir,
    lock_rebuilds: bool,
    ts: Timestamps,
}

impl<B: IndexBuilder> Indexer<B> {
    pub fn new(config: &Config, builder: B) -> Self {
        let layout = StorageLayout::new(config);
        let mut indexer = Indexer {
            main_source: SourceDir::new(&layout.source_dir),
            user_source: SourceDir::new(&layout.user_source_dir),
            builder,
            layout,
            lock_rebuilds: config.lock_rebuilds,
            ts: Timestamps::default(),
        };
        indexer.rescan();
        indexer
    }

    /// Re-read every timestamp from disk
    pub fn rescan(&mut self) {
        let system = self.builder.system_paths(&self.layout);
        let user = self.builder.user_paths(&self.layout);
        self.ts = Timestamps {
            main_source: self.builder.source_timestamp(&self.main_source),
            user_source: self.builder.source_timestamp(&self.user_source),
            main_data: system.data_timestamp(),
            main_index: system.index_timestamp(),
            user_data: user.data_timestamp(),
            user_index: user.index_timestamp(),
        };
        debug!(kind = self.builder.kind(), timestamps = ?self.ts, "scanned timestamps");
    }

    pub fn timestamps(&self) -> Timestamps {
        self.ts
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn system_paths(&self) -> &IndexPaths {
        self.builder.system_paths(&self.layout)
    }

    pub fn user_paths(&self) -> &IndexPaths {
        self.builder.user_paths(&self.layout)
    }

    pub fn needs_rebuild(&self) -> bool {
        self.ts.needs_rebuild()
    }

    /// Unconditionally rebuild into `out` from the system then the user sources
    pub fn rebuild(&self, out: &IndexPaths) -> Result<bool> {
        self.builder.build(&[&self.main_source, &self.user_source], out)
    }

    fn system_is_writable(&self) -> bool {
        is_writable(self.system_paths().dir())
    }

    /// Where a rebuild would go given the last scan
    fn target(&self) -> Location {
        if self.ts.user_source == 0 && self.system_is_writable() {
            Location::System
        } else {
            Location::User
        }
    }

    fn paths(&self, location: Location) -> IndexPaths {
        match location {
            Location::System => self.system_paths().clone(),
            Location::User => self.user_paths().clone(),
        }
    }

    /// Rebuild when stale, into the system location if there are no user
    /// sources and it is writable, otherwise into the user location.
    /// Returns whether a new index was written.
    pub fn rebuild_if_needed(&mut self) -> Result<bool> {
        if !self.needs_rebuild() {
            debug!(kind = self.builder.kind(), "index is up to date");
            return Ok(false);
        }

        let mut location = self.target();
        let mut out = self.paths(location);
        out.ensure_dir()?;

        let mut _lock = None;
        if self.lock_rebuilds {
            loop {
                let lock = FileLock::acquire(out.lock_path(), true)?;
                // Someone else may have finished a rebuild, or sources may
                // have changed, while we waited
                self.rescan();
                if !self.needs_rebuild() {
                    debug!(kind = self.builder.kind(), "index rebuilt by another process");
                    return Ok(false);
                }
                let now = self.target();
                if now == location {
                    _lock = Some(lock);
                    break;
                }
                debug!(kind = self.builder.kind(), from = ?location, to = ?now, "rebuild location changed");
                drop(lock);
                location = now;
                out = self.paths(location);
                out.ensure_dir()?;
            }
        }

        info!(
            kind = self.builder.kind(),
            ?location,
            data = %out.data.display(),
            sources = %format_timestamp(self.ts.source()),
            "rebuilding index"
        );
        if !self.rebuild(&out)? {
            info!(kind = self.builder.kind(), "no sources to index");
            return Ok(false);
        }

        let (data, index) = (out.data_timestamp(), out.index_timestamp());
        match location {
            Location::System => {
                self.ts.main_data = data;
                self.ts.main_index = index;
                if self.user_paths() == &out {
                    self.ts.user_data = data;
                    self.ts.user_index = index;
                }
            }
            Location::User => {
                self.ts.user_data = data;
                self.ts.user_index = index;
            }
        }
        Ok(true)
    }

    pub fn user_index_is_redundant(&self) -> bool {
        self.ts.user_index_is_redundant()
    }

    /// Delete the user copy when the system one makes it useless.
    /// Returns whether anything was deleted.
    pub fn delete_redundant_user_index(&mut self) -> Result<bool> {
        if !self.user_index_is_redundant() {
            return Ok(false);
        }

        let user = self.user_paths().clone();
        let system = self.system_paths().clone();
        let mut deleted = false;

        if user.data != system.data {
            match remove_if_exists(&user.data) {
                Ok(()) => {
                    self.ts.user_data = 0;
                    deleted = true;
                }
                Err(e) => warn!(path = %user.data.display(), error = %e, "cannot delete redundant user data"),
            }
        }
        if user.index != system.index {
            match remove_if_exists(&user.index) {
                Ok(()) => {
                    self.ts.user_index = 0;
                    deleted = true;
                }
                Err(e) => warn!(path = %user.index.display(), error = %e, "cannot delete redundant user index"),
            }
        }

        if deleted {
            info!(kind = self.builder.kind(), data = %user.data.display(), "deleted redundant user index");
        }
        Ok(deleted)
    }

    /// Paths of the copy that is fresh right now, if any
    pub fn up_to_date_paths(&self) -> Option<IndexPaths> {
        match self.ts.up_to_date()? {
            Location::System => Some(self.system_paths().clone()),
            Location::User => Some(self.user_paths().clone()),
        }
    }

    /// Bring the index up to date, tidy the user location and return the
    /// copy to open
    pub fn obtain_working(&mut self) -> Result<Option<IndexPaths>> {
        self.rebuild_if_needed()?;
        self.delete_redundant_user_index()?;
        Ok(self.up_to_date_paths())
    }
}

/// Write a data file through a temporary file in the same directory, then
/// rename it over `path`
fn write_data_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&std::fs::File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        write(&mut out)?;
        out.flush().map_err(|e| Error::io(tmp.path(), e))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path)?;
    Ok(())
}

fn is_writable(dir: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;

    let Ok(path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(path.as_ptr(), libc::W_OK) == 0 }
}
