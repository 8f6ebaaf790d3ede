use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Environment variable overriding the merged tag database path
pub const TAGS_ENV: &str = "DEBTAGS_TAGS";
/// Environment variable overriding the merged vocabulary path
pub const VOCABULARY_ENV: &str = "DEBTAGS_VOCABULARY";

const SYSTEM_DIR: &str = "/var/lib/debtags";
const USER_DIR_NAME: &str = ".debtags";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_dir: PathBuf,            // System *.voc / *.tag sources
    pub user_source_dir: PathBuf,       // Per-user overrides
    pub vocabulary: PathBuf,            // System merged vocabulary
    pub tagdb: PathBuf,                 // System merged tag database
    pub user_index_dir: PathBuf,        // Where user copies are written

    pub record_cache_size: usize,       // Parsed vocabulary records kept in memory
    pub lock_rebuilds: bool,            // flock() around rebuild decisions
}

impl Default for Config {
    fn default() -> Self {
        let user_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(USER_DIR_NAME);

        Config {
            source_dir: PathBuf::from(SYSTEM_DIR),
            user_source_dir: user_dir.clone(),
            vocabulary: Path::new(SYSTEM_DIR).join("vocabulary"),
            tagdb: Path::new(SYSTEM_DIR).join("package-tags"),
            user_index_dir: user_dir,

            record_cache_size: 256,
            lock_rebuilds: true,
        }
    }
}

impl Config {
    /// Defaults with the `DEBTAGS_TAGS` / `DEBTAGS_VOCABULARY` overrides applied
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var_os(name).map(PathBuf::from))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let mut config = Config::default();
        if let Some(path) = lookup(TAGS_ENV) {
            config.tagdb = path;
        }
        if let Some(path) = lookup(VOCABULARY_ENV) {
            config.vocabulary = path;
        }
        config
    }

    /// Everything under one directory: `root/system` and `root/user`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        let system = root.as_ref().join("system");
        let user = root.as_ref().join("user");
        Config {
            source_dir: system.join("sources"),
            user_source_dir: user.join("sources"),
            vocabulary: system.join("vocabulary"),
            tagdb: system.join("package-tags"),
            user_index_dir: user,
            ..Config::default()
        }
    }

    /// Load a JSON configuration file, missing fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(&path).map_err(|e| Error::io(&path, e))?;
        let config: Config = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_cache_size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "record_cache_size must be at least 1".to_string(),
            ));
        }
        if self.tagdb.as_os_str().is_empty() || self.vocabulary.as_os_str().is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "tagdb and vocabulary paths cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the system indexes
    pub fn system_index_dir(&self) -> PathBuf {
        self.tagdb
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_replace_data_paths() {
        let config = Config::from_lookup(|name| match name {
            TAGS_ENV => Some(PathBuf::from("/tmp/x/tags")),
            VOCABULARY_ENV => Some(PathBuf::from("/tmp/x/voc")),
            _ => None,
        });
        assert_eq!(config.tagdb, PathBuf::from("/tmp/x/tags"));
        assert_eq!(config.vocabulary, PathBuf::from("/tmp/x/voc"));
        assert_eq!(config.system_index_dir(), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn missing_overrides_keep_system_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.tagdb, PathBuf::from("/var/lib/debtags/package-tags"));
        assert_eq!(config.vocabulary, PathBuf::from("/var/lib/debtags/vocabulary"));
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "tagdb": "/srv/tags", "lock_rebuilds": false }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tagdb, PathBuf::from("/srv/tags"));
        assert!(!config.lock_rebuilds);
        assert_eq!(config.record_cache_size, 256);
    }

    #[test]
    fn load_rejects_zero_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "record_cache_size": 0 }"#).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
