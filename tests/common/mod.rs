//! Shared sandbox for the integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use debtags_index::Config;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

pub const VOCABULARY: &str = "\
Facet: taste
Description: How it tastes

Tag: taste::sweet
Description: Sweet
 Like sugar.

Tag: taste::salty
Description: Salty

Facet: smell
Description: How it smells

Tag: smell::mold
Description: Mold

Tag: smell::fresh
Description: Fresh
";

/// A throwaway tree laid out by `Config::with_root`
pub struct Sandbox {
    pub dir: TempDir,
    pub config: Config,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::with_root(dir.path());
        fs::create_dir_all(&config.source_dir).unwrap();
        Sandbox { dir, config }
    }

    pub fn write_source(&self, name: &str, content: &str) -> PathBuf {
        write_file(&self.config.source_dir, name, content)
    }

    /// Write `content` gzipped into the system source directory
    pub fn write_gzip_source(&self, name: &str, content: &str) -> PathBuf {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        let path = self.config.source_dir.join(name);
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        path
    }

    pub fn write_user_source(&self, name: &str, content: &str) -> PathBuf {
        write_file(&self.config.user_source_dir, name, content)
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Move the mtime of `path` `secs` seconds into the past
pub fn age(path: &Path, secs: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(secs)).unwrap();
}

pub fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}
