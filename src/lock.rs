// Advisory lock file around one sampling cycle. The history rewrite is not safe under
// concurrent writers, so a second invocation backs off while the first holds the lock.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another cycle holds {0}")]
    Held(PathBuf),
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Removed when dropped.
#[derive(Debug)]
pub struct CycleLock {
    path: PathBuf,
}

impl CycleLock {
    /// Creates `path` exclusively. A lock older than `stale_after` is assumed abandoned and replaced.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        match Self::create(path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !is_stale(path, stale_after) {
                    return Err(LockError::Held(path.to_path_buf()));
                }
                tracing::warn!(path = %path.display(), "replacing stale cycle lock");
                std::fs::remove_file(path).map_err(io_err)?;
                Self::create(path).map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => LockError::Held(path.to_path_buf()),
                    _ => io_err(e),
                })
            }
            Err(e) => Err(io_err(e)),
        }
    }

    fn create(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove cycle lock");
        }
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok())
        .is_some_and(|age| age >= stale_after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cycle.lock");

        let first = CycleLock::acquire(&path, Duration::from_secs(3600)).unwrap();
        let err = CycleLock::acquire(&path, Duration::from_secs(3600)).unwrap_err();
        assert!(matches!(err, LockError::Held(_)));

        drop(first);
        assert!(!path.exists());
        CycleLock::acquire(&path, Duration::from_secs(3600)).unwrap();
    }

    #[test]
    fn stale_lock_is_replaced() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cycle.lock");
        std::fs::write(&path, "12345\n").unwrap();

        let lock = CycleLock::acquire(&path, Duration::ZERO).unwrap();
        assert_eq!(lock.path(), path.as_path());
    }
}
