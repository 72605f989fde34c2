//! Error types for the pgf2png library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PgfError`] — **Fatal**: the request cannot even be formed (source
//!   missing or unreadable, invalid configuration) or a post-conversion step
//!   the caller asked for failed. Returned as `Err(PgfError)` from the
//!   top-level `convert*` functions.
//!
//! * [`StageError`] — **Non-fatal**: one pipeline stage failed. The
//!   orchestrator folds it into a [`crate::output::ConversionOutcome`] so the
//!   caller always gets a workspace and a typed result instead of an early
//!   return. A raster failure in particular still leaves a usable PDF.

use crate::output::Stage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pgf2png library.
#[derive(Debug, Error)]
pub enum PgfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("PGF source not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but is a directory or other non-file entry.
    #[error("'{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    // ── Workspace errors ──────────────────────────────────────────────────
    /// The workspace directory (or a file inside it) could not be created.
    #[error("Could not prepare workspace under '{path}': {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not copy the produced image or PDF to the requested output path.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A stage-level failure, captured into the conversion outcome.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum StageError {
    /// The TeX engine failed, timed out, or exited cleanly without a PDF.
    #[error("LaTeX compilation failed: {message}")]
    Compile {
        message: String,
        log_excerpt: String,
    },

    /// Every configured rasterizer was tried and none produced a PNG.
    #[error("No usable rasterizer found ({})", .attempts.join("; "))]
    Raster { attempts: Vec<String> },

    /// The conversion was cancelled while this stage was running.
    #[error("Cancelled during {stage}")]
    Cancelled { stage: Stage },

    /// Workspace preparation failed after allocation (source copy, document write).
    #[error("Workspace error: {message}")]
    Resource { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_display_lists_attempts() {
        let e = StageError::Raster {
            attempts: vec![
                "pdftocairo: exited with status 1".into(),
                "convert: not found".into(),
            ],
        };
        let msg = e.to_string();
        assert!(msg.starts_with("No usable rasterizer found"), "got: {msg}");
        assert!(msg.contains("pdftocairo: exited with status 1; convert: not found"));
    }

    #[test]
    fn compile_display_uses_message_only() {
        let e = StageError::Compile {
            message: "PDF not produced".into(),
            log_excerpt: "! Undefined control sequence.".into(),
        };
        assert_eq!(e.to_string(), "LaTeX compilation failed: PDF not produced");
    }

    #[test]
    fn source_not_found_display() {
        let e = PgfError::SourceNotFound {
            path: PathBuf::from("/tmp/missing.pgf"),
        };
        assert!(e.to_string().contains("/tmp/missing.pgf"));
    }

    #[test]
    fn cancelled_display() {
        let e = StageError::Cancelled {
            stage: Stage::Compile,
        };
        assert_eq!(e.to_string(), "Cancelled during LaTeX compilation");
    }
}
