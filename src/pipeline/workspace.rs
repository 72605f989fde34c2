//! Per-request scratch directories.
//!
//! Every conversion gets a fresh directory named `<prefix><random>` under the
//! configured root, so concurrent requests never see each other's files and
//! no global counter is needed to pick names.
//!
//! Workspaces are **not** deleted automatically: the TeX log, the synthesized
//! document and any partial output stay on disk so a failed conversion can be
//! inspected afterwards. Ownership passes to the caller through
//! [`crate::output::Conversion`]; call [`Workspace::remove`] to delete it, or
//! [`Workspace::into_guard`] to tie its lifetime to a scope.

use crate::error::PgfError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An exclusively owned conversion directory.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Create a uniquely named directory under `root`.
    pub fn allocate(root: &Path, prefix: &str) -> Result<Self, PgfError> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(root)
            .map_err(|e| PgfError::Resource {
                path: root.to_path_buf(),
                source: e,
            })?;
        let path = dir.keep();
        debug!("Allocated workspace {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the workspace.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Give up ownership and keep the directory forever.
    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Copy `source` into the workspace under its own file name.
    ///
    /// If that name would be overwritten by the synthesized document
    /// (`reserved`), `.orig` is appended.
    pub async fn copy_source(&self, source: &Path, reserved: &str) -> Result<PathBuf, PgfError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        let name = if name == reserved {
            format!("{name}.orig")
        } else {
            name
        };
        let dest = self.join(name);
        tokio::fs::copy(source, &dest)
            .await
            .map_err(|e| PgfError::Resource {
                path: dest.clone(),
                source: e,
            })?;
        Ok(dest)
    }

    /// Delete the directory and everything in it.
    pub async fn remove(self) -> std::io::Result<()> {
        debug!("Removing workspace {}", self.path.display());
        tokio::fs::remove_dir_all(&self.path).await
    }

    /// Wrap the workspace in a guard that deletes it on drop.
    pub fn into_guard(self) -> WorkspaceGuard {
        WorkspaceGuard {
            path: Some(self.path),
        }
    }
}

/// Deletes the wrapped workspace when dropped, unless disarmed.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: Option<PathBuf>,
}

impl WorkspaceGuard {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cancel the deletion and hand the workspace back.
    pub fn disarm(mut self) -> Option<Workspace> {
        self.path.take().map(|path| Workspace { path })
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("Failed to remove workspace {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_unique_and_persist() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::allocate(root.path(), "pgf2png-").unwrap();
        let b = Workspace::allocate(root.path(), "pgf2png-").unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("pgf2png-"));

        let kept = a.into_path();
        assert!(kept.is_dir(), "workspace must outlive its handle");
    }

    #[test]
    fn allocate_fails_under_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does/not/exist");
        let err = Workspace::allocate(&missing, "pgf2png-").unwrap_err();
        assert!(matches!(err, PgfError::Resource { .. }));
    }

    #[test]
    fn guard_deletes_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(root.path(), "g-").unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.join("plot.log"), "log").unwrap();

        drop(ws.into_guard());
        assert!(!path.exists());
    }

    #[test]
    fn disarmed_guard_keeps_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(root.path(), "g-").unwrap();
        let path = ws.path().to_path_buf();

        let back = ws.into_guard().disarm().unwrap();
        assert_eq!(back.path(), path);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn copy_source_avoids_document_name() {
        let root = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("plot.tex");
        std::fs::write(&src, "\\draw (0,0) -- (1,1);").unwrap();

        let ws = Workspace::allocate(root.path(), "c-").unwrap();
        let copied = ws.copy_source(&src, "plot.tex").await.unwrap();
        assert_eq!(copied, ws.join("plot.tex.orig"));

        ws.remove().await.unwrap();
    }
}
