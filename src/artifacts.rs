// Output files. Every write goes to a temp file in the target directory and is renamed over
// the destination, so a crash never leaves a truncated artifact behind.

use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serializing {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Replaces `path` with `bytes` atomically, creating parent directories as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Writes JSON artifacts under one data directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    data_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Serializes `value` to `<data_dir>/<relative>`; returns the full path written.
    pub fn write_json<T: Serialize>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.data_dir.join(relative);
        let bytes = serde_json::to_vec(value).map_err(|source| ArtifactError::Serialize {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(path)
    }
}
