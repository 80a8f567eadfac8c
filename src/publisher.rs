// Publishes written artifacts by committing and pushing them in a git work tree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

pub struct GitPublisher {
    repo_root: PathBuf,
}

impl GitPublisher {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// `git add <files>`, `git commit -m <message>`, `git push`. Stops at the first failure.
    #[instrument(skip(self, files), fields(operation = "publish", files_count = files.len()))]
    pub async fn publish(&self, files: &[PathBuf], message: &str) -> anyhow::Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let mut add: Vec<OsString> = vec!["add".into(), "--".into()];
        add.extend(files.iter().map(|f| self.repo_relative(f).into_os_string()));
        self.git(add).await?;
        self.git(["commit", "-m", message]).await?;
        self.git(["push"]).await?;
        tracing::info!("published artifacts");
        Ok(())
    }

    /// Path relative to the work tree when it lives inside it; otherwise unchanged.
    fn repo_relative(&self, file: &Path) -> PathBuf {
        let (Ok(root), Ok(abs)) = (
            std::fs::canonicalize(&self.repo_root),
            std::fs::canonicalize(file),
        ) else {
            return file.to_path_buf();
        };
        abs.strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or(abs)
    }

    async fn git<I, S>(&self, args: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(&args)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("spawning git: {}", e))?;
        anyhow::ensure!(
            output.status.success(),
            "git {} exited with {}: {}",
            args.first().map(|a| a.to_string_lossy()).unwrap_or_default(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }
}

/// Commit message for a cycle.
pub fn commit_message(timestamp_iso: &str) -> String {
    format!("Update listener data @ {}", timestamp_iso)
}
