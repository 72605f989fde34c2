//! Input resolution: turn a user-supplied path into a [`ConversionRequest`].
//!
//! The request stores the canonical absolute path because that exact path is
//! written into the `\input{...}` directive; a relative path would resolve
//! against the workspace, not against the caller's working directory. We
//! open the file once up front so a missing or unreadable source fails fast
//! with a clear error instead of as an obscure TeX log line.

use crate::error::PgfError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An immutable, validated conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    source: PathBuf,
}

impl ConversionRequest {
    /// Validate `path` and resolve it to an absolute path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PgfError> {
        let path = path.as_ref();

        let source = match std::fs::canonicalize(path) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(PgfError::PermissionDenied {
                    path: path.to_path_buf(),
                });
            }
            Err(_) => {
                return Err(PgfError::SourceNotFound {
                    path: path.to_path_buf(),
                });
            }
        };

        if !source.is_file() {
            return Err(PgfError::NotAFile { path: source });
        }

        // Check read permission by attempting to open
        match std::fs::File::open(&source) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(PgfError::PermissionDenied { path: source });
            }
            Err(_) => {
                return Err(PgfError::SourceNotFound { path: source });
            }
        }

        debug!("Resolved PGF source: {}", source.display());
        Ok(Self { source })
    }

    /// Absolute path of the source file.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plot.pgf");
        std::fs::write(&file, "\\begin{pgfpicture}\\end{pgfpicture}").unwrap();

        let req = ConversionRequest::new(&file).unwrap();
        assert!(req.source().is_absolute());
        assert_eq!(req.source(), std::fs::canonicalize(&file).unwrap());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ConversionRequest::new("/definitely/not/here.pgf").unwrap_err();
        assert!(matches!(err, PgfError::SourceNotFound { .. }));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConversionRequest::new(dir.path()).unwrap_err();
        assert!(matches!(err, PgfError::NotAFile { .. }));
    }
}
