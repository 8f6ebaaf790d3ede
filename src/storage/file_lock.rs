use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};

/// Advisory lock serializing rebuild decisions across processes
pub struct FileLock {
    pub file: File,
    pub path: PathBuf,
    pub exclusive: bool,
}

impl FileLock {
    /// Block until the lock on `path` is held, creating the lock file if needed
    pub fn acquire<P: AsRef<Path>>(path: P, exclusive: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_SH};

            let fd = file.as_raw_fd();
            let operation = if exclusive { LOCK_EX } else { LOCK_SH };

            unsafe {
                if flock(fd, operation) != 0 {
                    let err = std::io::Error::last_os_error();
                    return Err(Error::io(&path, err).with_kind(ErrorKind::Lock));
                }
            }
        }

        debug!(path = %path.display(), exclusive, "acquired lock");
        Ok(FileLock { file, path, exclusive })
    }

    /// Try once without blocking; `None` when another holder has it
    pub fn try_acquire<P: AsRef<Path>>(path: P, exclusive: bool) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB, LOCK_SH};

            let fd = file.as_raw_fd();
            let operation = if exclusive { LOCK_EX } else { LOCK_SH } | LOCK_NB;

            unsafe {
                if flock(fd, operation) != 0 {
                    let err = std::io::Error::last_os_error();
                    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                        return Ok(None);
                    }
                    return Err(Error::io(&path, err).with_kind(ErrorKind::Lock));
                }
            }
        }

        Ok(Some(FileLock { file, path, exclusive }))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_lock_excludes_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.idx.lock");

        let held = FileLock::acquire(&path, true).unwrap();
        assert!(path.exists());
        assert!(FileLock::try_acquire(&path, true).unwrap().is_none());

        drop(held);
        assert!(FileLock::try_acquire(&path, true).unwrap().is_some());
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.lock");

        let _a = FileLock::acquire(&path, false).unwrap();
        assert!(FileLock::try_acquire(&path, false).unwrap().is_some());
        assert!(FileLock::try_acquire(&path, true).unwrap().is_none());
    }
}
