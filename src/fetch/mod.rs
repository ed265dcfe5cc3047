//! Target resolution and remote repository fetching.
//!
//! A scan target is either a local directory tree or a remote repository
//! URL. Remote targets are shallow-cloned with the external `git` binary
//! into a temporary directory owned by the session; the directory is removed
//! on every exit path, including cancellation, via `TempDir` RAII.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// A parsed scan target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    Local(PathBuf),
    Remote(String),
}

impl ScanTarget {
    /// Classify `raw` as a local path or a remote repository URL.
    ///
    /// A nonexistent local path is an input error: it is surfaced to the
    /// caller and fails only the affected target.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("git@") {
            return Ok(Self::Remote(raw.to_string()));
        }

        let path = PathBuf::from(raw);
        if !path.exists() {
            bail!("target does not exist: {raw}");
        }
        Ok(Self::Local(path))
    }

    /// The target as the user wrote it.
    pub fn label(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }
}

/// A target materialized on disk, ready to walk.
pub struct FetchedRepo {
    pub root: PathBuf,
    /// HEAD commit when the root is a git repository.
    pub commit: Option<String>,
    // Keeps a remote clone alive for the scan and deletes it on drop.
    _clone_dir: Option<TempDir>,
}

/// Materialize `target`: local paths are used in place, remote URLs are
/// shallow-cloned into a session-scoped temporary directory.
pub async fn fetch(target: &ScanTarget) -> Result<FetchedRepo> {
    match target {
        ScanTarget::Local(path) => Ok(FetchedRepo {
            commit: resolve_head_commit(path).await,
            root: path.clone(),
            _clone_dir: None,
        }),
        ScanTarget::Remote(url) => {
            let clone_dir = TempDir::with_prefix("keyclaw-clone-")
                .context("failed to create temporary clone directory")?;

            info!(url = %url, "cloning repository");
            let output = Command::new("git")
                .arg("clone")
                .arg("--depth")
                .arg("1")
                .arg(url)
                .arg(clone_dir.path())
                .output()
                .await
                .context("failed to run git; is it installed?")?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!("git clone failed for {url}: {}", stderr.trim());
            }

            Ok(FetchedRepo {
                root: clone_dir.path().to_path_buf(),
                commit: resolve_head_commit(clone_dir.path()).await,
                _clone_dir: Some(clone_dir),
            })
        }
    }
}

/// `git rev-parse HEAD` for `repo`, if it is a git checkout.
async fn resolve_head_commit(repo: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("rev-parse")
        .arg("HEAD")
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        debug!(repo = %repo.display(), "not a git repository, no commit recorded");
        return None;
    }

    let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if commit.is_empty() {
        None
    } else {
        Some(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_parse_as_remote() {
        let target = ScanTarget::parse("https://github.com/acme/widgets").unwrap();
        assert_eq!(
            target,
            ScanTarget::Remote("https://github.com/acme/widgets".to_string())
        );
    }

    #[test]
    fn ssh_urls_parse_as_remote() {
        let target = ScanTarget::parse("git@github.com:acme/widgets.git").unwrap();
        assert!(matches!(target, ScanTarget::Remote(_)));
    }

    #[test]
    fn existing_directory_parses_as_local() {
        let dir = tempfile::tempdir().unwrap();
        let target = ScanTarget::parse(dir.path().to_str().unwrap()).unwrap();
        assert!(matches!(target, ScanTarget::Local(_)));
    }

    #[test]
    fn nonexistent_path_is_an_input_error() {
        let result = ScanTarget::parse("/definitely/not/a/real/path");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn local_fetch_uses_path_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let target = ScanTarget::Local(dir.path().to_path_buf());
        let repo = fetch(&target).await.unwrap();
        assert_eq!(repo.root, dir.path());
    }

    #[tokio::test]
    async fn plain_directory_has_no_commit() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_head_commit(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn clone_of_bogus_source_fails() {
        let dest_parent = tempfile::tempdir().unwrap();
        let missing = dest_parent.path().join("no-such-repo");
        let target = ScanTarget::Remote(format!("https://{}", missing.display()));
        // Either git exits non-zero or git itself is unavailable; both are
        // operational errors for this target.
        assert!(fetch(&target).await.is_err());
    }
}
