//! Result types returned by the conversion pipeline.

use crate::pipeline::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A pipeline stage, used in progress events and cancellation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Allocate,
    ExtractPreamble,
    Synthesize,
    Compile,
    Rasterize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Allocate => "workspace allocation",
            Stage::ExtractPreamble => "preamble extraction",
            Stage::Synthesize => "document synthesis",
            Stage::Compile => "LaTeX compilation",
            Stage::Rasterize => "rasterization",
        })
    }
}

/// Terminal state of one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// A PNG was produced.
    Raster { image: PathBuf },

    /// The PDF compiled but no rasterizer produced a PNG.
    ///
    /// Callers are expected to offer the PDF itself instead.
    PdfOnly { pdf: PathBuf, raster_error: String },

    /// The TeX engine failed; `log_excerpt` is bounded by
    /// [`crate::config::ConversionConfig::log_excerpt_chars`] plus an ellipsis.
    CompileFailure { message: String, log_excerpt: String },

    /// The workspace could not be allocated or populated.
    ResourceFailure { message: String },

    /// The configured cancellation token fired during `stage`.
    Cancelled { stage: Stage },
}

impl ConversionOutcome {
    /// `true` only for [`ConversionOutcome::Raster`].
    pub fn is_raster(&self) -> bool {
        matches!(self, ConversionOutcome::Raster { .. })
    }

    /// The PNG path, when one was produced.
    pub fn image(&self) -> Option<&Path> {
        match self {
            ConversionOutcome::Raster { image } => Some(image),
            _ => None,
        }
    }

    /// The best artifact available: the PNG, else the PDF.
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            ConversionOutcome::Raster { image } => Some(image),
            ConversionOutcome::PdfOnly { pdf, .. } => Some(pdf),
            _ => None,
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        match self {
            ConversionOutcome::Raster { image } => format!("PNG written to {}", image.display()),
            ConversionOutcome::PdfOnly { pdf, raster_error } => {
                format!("PDF only ({}): {raster_error}", pdf.display())
            }
            ConversionOutcome::CompileFailure { message, .. } => {
                format!("LaTeX compilation failed: {message}")
            }
            ConversionOutcome::ResourceFailure { message } => format!("Workspace error: {message}"),
            ConversionOutcome::Cancelled { stage } => format!("Cancelled during {stage}"),
        }
    }
}

/// Timing and tool information for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Whether a Matplotlib preamble block was found in the source.
    pub preamble_found: bool,
    /// Rasterizers invoked, including the successful one.
    pub raster_attempts: usize,
    /// Name of the rasterizer that produced the PNG.
    pub rasterizer: Option<String>,
    pub compile_duration_ms: u64,
    pub raster_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The full result of converting one source.
///
/// Owns the [`Workspace`]: it is never deleted automatically so the TeX log
/// and intermediate files stay available for inspection. Call
/// [`Workspace::remove`] or [`Workspace::into_guard`] to clean up.
#[derive(Debug, Serialize)]
pub struct Conversion {
    /// Canonical path of the source file.
    pub source: PathBuf,
    /// `None` only when allocation itself failed.
    pub workspace: Option<Workspace>,
    pub outcome: ConversionOutcome,
    pub stats: ConversionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_prefers_image_then_pdf() {
        let raster = ConversionOutcome::Raster {
            image: PathBuf::from("/w/a.png"),
        };
        assert_eq!(raster.artifact(), Some(Path::new("/w/a.png")));
        assert!(raster.is_raster());

        let pdf_only = ConversionOutcome::PdfOnly {
            pdf: PathBuf::from("/w/a.pdf"),
            raster_error: "none".into(),
        };
        assert_eq!(pdf_only.artifact(), Some(Path::new("/w/a.pdf")));
        assert_eq!(pdf_only.image(), None);

        let failed = ConversionOutcome::CompileFailure {
            message: "x".into(),
            log_excerpt: "y".into(),
        };
        assert_eq!(failed.artifact(), None);
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let outcome = ConversionOutcome::Cancelled {
            stage: Stage::Rasterize,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"cancelled","stage":"rasterize"}"#);
    }

    #[test]
    fn summary_mentions_stage() {
        let outcome = ConversionOutcome::Cancelled {
            stage: Stage::Compile,
        };
        assert_eq!(outcome.summary(), "Cancelled during LaTeX compilation");
    }
}
