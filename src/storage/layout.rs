use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{file_timestamp, Timestamp};

const INDEX_SUFFIX: &str = ".idx";
const LOCK_SUFFIX: &str = ".lock";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// A data file and the binary index built next to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub data: PathBuf,      // Text data (vocabulary or package-tags)
    pub index: PathBuf,     // data + ".idx"
}

impl IndexPaths {
    pub fn for_data<P: AsRef<Path>>(data: P) -> Self {
        let data = data.as_ref().to_path_buf();
        let index = with_suffix(&data, INDEX_SUFFIX);
        IndexPaths { data, index }
    }

    pub fn lock_path(&self) -> PathBuf {
        with_suffix(&self.index, LOCK_SUFFIX)
    }

    pub fn dir(&self) -> &Path {
        match self.data.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn data_timestamp(&self) -> Timestamp {
        file_timestamp(&self.data)
    }

    pub fn index_timestamp(&self) -> Timestamp {
        file_timestamp(&self.index)
    }

    /// Create the directory holding the files
    pub fn ensure_dir(&self) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
    }

    /// Delete both files; files already gone are not an error
    pub fn remove(&self) -> Result<()> {
        remove_if_exists(&self.data)?;
        remove_if_exists(&self.index)
    }
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Where sources are read from and where the system and per-user copies of
/// each index live
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub source_dir: PathBuf,
    pub user_source_dir: PathBuf,
    pub system_vocabulary: IndexPaths,
    pub user_vocabulary: IndexPaths,
    pub system_tagdb: IndexPaths,
    pub user_tagdb: IndexPaths,
}

impl StorageLayout {
    pub fn new(config: &Config) -> Self {
        StorageLayout {
            source_dir: config.source_dir.clone(),
            user_source_dir: config.user_source_dir.clone(),
            system_vocabulary: IndexPaths::for_data(&config.vocabulary),
            user_vocabulary: IndexPaths::for_data(config.user_index_dir.join("vocabulary")),
            system_tagdb: IndexPaths::for_data(&config.tagdb),
            user_tagdb: IndexPaths::for_data(config.user_index_dir.join("package-tags")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_sits_next_to_data() {
        let paths = IndexPaths::for_data("/var/lib/debtags/vocabulary");
        assert_eq!(paths.index, PathBuf::from("/var/lib/debtags/vocabulary.idx"));
        assert_eq!(paths.lock_path(), PathBuf::from("/var/lib/debtags/vocabulary.idx.lock"));
        assert_eq!(paths.dir(), Path::new("/var/lib/debtags"));
        assert_eq!(IndexPaths::for_data("tags").dir(), Path::new("."));
    }

    #[test]
    fn layout_follows_config() {
        let config = Config::with_root("/srv/debtags");
        let layout = StorageLayout::new(&config);
        assert_eq!(layout.system_tagdb.data, PathBuf::from("/srv/debtags/system/package-tags"));
        assert_eq!(layout.user_tagdb.index, PathBuf::from("/srv/debtags/user/package-tags.idx"));
        assert_eq!(layout.user_vocabulary.data, PathBuf::from("/srv/debtags/user/vocabulary"));
        assert_eq!(layout.source_dir, PathBuf::from("/srv/debtags/system/sources"));
    }

    #[test]
    fn remove_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::for_data(dir.path().join("sub/vocabulary"));
        paths.remove().unwrap();

        paths.ensure_dir().unwrap();
        fs::write(&paths.data, b"x").unwrap();
        assert!(paths.data_timestamp() > 0);
        assert_eq!(paths.index_timestamp(), 0);

        paths.remove().unwrap();
        assert!(!paths.data.exists());
    }
}
