use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    InvalidFormat,
    InvalidArgument,
    InvalidState,
    Lock,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    /// File the failing operation was working on, if any
    pub path: Option<PathBuf>,
    /// Raw OS error code for system errors
    pub os_code: Option<i32>,
    source: Option<std::io::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error {
            kind,
            context,
            path: None,
            os_code: None,
            source: None,
        }
    }

    /// System error on `path`, keeping the OS error code.
    pub fn io<P: AsRef<Path>>(path: P, err: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        Error {
            kind: ErrorKind::Io,
            context: format!("{}: {}", path.display(), err),
            os_code: err.raw_os_error(),
            path: Some(path),
            source: Some(err),
        }
    }

    /// Parse error in `source` (a file name or a stream label) at `line`.
    pub fn parse(source: &str, line: usize, message: impl fmt::Display) -> Self {
        Error::new(ErrorKind::Parse, format!("{}:{}: {}", source, line, message))
    }

    pub fn format<P: AsRef<Path>>(path: P, message: impl fmt::Display) -> Self {
        let path = path.as_ref().to_path_buf();
        Error {
            kind: ErrorKind::InvalidFormat,
            context: format!("{}: {}", path.display(), message),
            path: Some(path),
            os_code: None,
            source: None,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
            path: None,
            os_code: err.raw_os_error(),
            source: Some(err),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        let path = err.file.path().to_path_buf();
        Error::io(path, err.error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Parse, format!("configuration: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
