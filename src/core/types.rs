use std::fmt;
use std::fs;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one build of an index. IDs are only meaningful within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub Uuid);

impl Generation {
    pub fn new() -> Self {
        Generation(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Generation(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Facet handle: a dense facet ID bound to the generation that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Facet {
    pub(crate) id: u32,
    pub(crate) generation: Generation,
}

impl Facet {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Tag handle: a dense tag ID bound to the generation that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub(crate) id: u32,
    pub(crate) generation: Generation,
}

impl Tag {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Modification time in seconds since the epoch, 0 meaning "absent"
pub type Timestamp = i64;

/// mtime of `path`, or 0 when it does not exist or cannot be inspected
pub fn file_timestamp<P: AsRef<Path>>(path: P) -> Timestamp {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified).timestamp(),
        Err(_) => 0,
    }
}

pub fn format_timestamp(ts: Timestamp) -> String {
    if ts == 0 {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
