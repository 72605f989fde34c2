//! Conversion entry points and the pipeline orchestrator.
//!
//! The orchestrator is a straight line with one branch:
//!
//! ```text
//! allocate ─▶ extract preamble ─▶ synthesize ─▶ compile ──fail──▶ CompileFailure
//!                                                  │
//!                                                  ok
//!                                                  ▼
//!                                              rasterize ──fail──▶ PdfOnly
//!                                                  │
//!                                                  ok ──────────▶ Raster
//! ```
//!
//! Every external tool is invoked at most once; the rasterizer chain is a
//! list of alternatives, not retries. Once a [`ConversionRequest`] exists,
//! [`run`] never fails: every stage error is folded into the returned
//! [`ConversionOutcome`] and the workspace is handed back to the caller.

use crate::config::ConversionConfig;
use crate::error::{PgfError, StageError};
use crate::output::{Conversion, ConversionOutcome, ConversionStats, Stage};
use crate::pipeline::input::ConversionRequest;
use crate::pipeline::workspace::Workspace;
use crate::pipeline::{compile, document, preamble, raster};
use crate::stream::convert_stream;
use futures::stream::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Convert one PGF file to PNG.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(PgfError)` only when the source cannot be read at all.
/// Everything that happens after that (compile errors, missing
/// rasterizers, cancellation) is reported through
/// [`Conversion::outcome`].
pub async fn convert(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Conversion, PgfError> {
    let request = ConversionRequest::new(source)?;
    Ok(run(&request, config).await)
}

/// Run the full pipeline for a validated request.
pub async fn run(request: &ConversionRequest, config: &ConversionConfig) -> Conversion {
    let total_start = Instant::now();
    let source = request.source().to_path_buf();
    info!("Starting conversion: {}", source.display());

    let mut stats = ConversionStats::default();
    let (workspace, outcome) = run_stages(request, config, &mut stats).await;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    match &outcome {
        ConversionOutcome::Raster { image } => info!(
            "Conversion complete: {} → {} ({}ms)",
            source.display(),
            image.display(),
            stats.total_duration_ms
        ),
        other => warn!("Conversion of {} ended: {}", source.display(), other.summary()),
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_source_complete(&source, &outcome);
    }

    Conversion {
        source,
        workspace,
        outcome,
        stats,
    }
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<Conversion, PgfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PgfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source, config))
}

/// A conversion whose artifact was copied out of the workspace.
#[derive(Debug)]
pub struct WrittenConversion {
    pub conversion: Conversion,
    /// Where the PNG (or, for [`ConversionOutcome::PdfOnly`], the PDF) was written.
    pub written: Option<PathBuf>,
}

/// Convert a PGF file and copy the result to `output`.
///
/// A PNG is written to `output` itself. When only the PDF could be produced
/// it is written next to it with a `.pdf` extension instead. Nothing is
/// written for the other outcomes.
pub async fn convert_to_file(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<WrittenConversion, PgfError> {
    let conversion = convert(source, config).await?;
    let written = write_artifact(&conversion.outcome, output.as_ref()).await?;
    Ok(WrittenConversion {
        conversion,
        written,
    })
}

/// Copy the outcome's artifact to `output`, returning the path written.
///
/// Uses an atomic write (temp file + rename) to prevent partial files.
pub async fn write_artifact(
    outcome: &ConversionOutcome,
    output: &Path,
) -> Result<Option<PathBuf>, PgfError> {
    let (artifact, dest) = match outcome {
        ConversionOutcome::Raster { image } => (image, output.to_path_buf()),
        ConversionOutcome::PdfOnly { pdf, .. } => (pdf, output.with_extension("pdf")),
        _ => return Ok(None),
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PgfError::OutputWriteFailed {
                path: dest.clone(),
                source: e,
            })?;
    }

    let mut tmp_name = dest.clone().into_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::copy(artifact, &tmp_path)
        .await
        .map_err(|e| PgfError::OutputWriteFailed {
            path: dest.clone(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, &dest)
        .await
        .map_err(|e| PgfError::OutputWriteFailed {
            path: dest.clone(),
            source: e,
        })?;

    debug!("Copied {} → {}", artifact.display(), dest.display());
    Ok(Some(dest))
}

/// Convert several independent sources, up to `config.concurrency` at a time.
///
/// Results are returned in input order. Each source gets its own workspace,
/// so one failing source never affects another.
pub async fn convert_many<P: AsRef<Path> + Sync>(
    sources: &[P],
    config: &ConversionConfig,
) -> Vec<Result<Conversion, PgfError>> {
    let total = sources.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results: Vec<(usize, Result<Conversion, PgfError>)> =
        convert_stream(sources, config).collect().await;
    results.sort_by_key(|(idx, _)| *idx);

    let rastered = results
        .iter()
        .filter(|(_, r)| matches!(r, Ok(c) if c.outcome.is_raster()))
        .count();
    info!("Batch complete: {}/{} sources rasterized", rastered, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, rastered);
    }

    results.into_iter().map(|(_, r)| r).collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Drive the stages and return whatever workspace exists plus the outcome.
async fn run_stages(
    request: &ConversionRequest,
    config: &ConversionConfig,
    stats: &mut ConversionStats,
) -> (Option<Workspace>, ConversionOutcome) {
    let cancel = config.cancellation_token();
    let source = request.source();

    // ── Step 1: Allocate workspace ───────────────────────────────────────
    notify(config, source, Stage::Allocate);
    if cancel.is_cancelled() {
        return (
            None,
            ConversionOutcome::Cancelled {
                stage: Stage::Allocate,
            },
        );
    }
    let workspace = match Workspace::allocate(&config.workspace_root(), &config.workspace_prefix) {
        Ok(ws) => ws,
        Err(e) => {
            return (
                None,
                ConversionOutcome::ResourceFailure {
                    message: e.to_string(),
                },
            )
        }
    };
    info!("Workspace: {}", workspace.path().display());

    // ── Steps 2–3: Extract preamble, synthesize document ─────────────────
    let tex_file = match prepare_document(request, &workspace, config, stats, &cancel).await {
        Ok(name) => name,
        Err(e) => return (Some(workspace), stage_outcome(e, None)),
    };

    // ── Step 4: Compile PDF ──────────────────────────────────────────────
    notify(config, source, Stage::Compile);
    let compile_start = Instant::now();
    let compiled = compile::compile(&workspace, &tex_file, config, &cancel).await;
    stats.compile_duration_ms = compile_start.elapsed().as_millis() as u64;
    let pdf = match compiled {
        Ok(pdf) => pdf,
        Err(e) => return (Some(workspace), stage_outcome(e, None)),
    };

    // ── Step 5: Rasterize ────────────────────────────────────────────────
    notify(config, source, Stage::Rasterize);
    let raster_start = Instant::now();
    let rastered = raster::rasterize(&pdf, &workspace, source, config, &cancel).await;
    stats.raster_duration_ms = raster_start.elapsed().as_millis() as u64;

    let outcome = match rastered {
        Ok(image) => {
            stats.raster_attempts = image.attempts;
            stats.rasterizer = Some(image.tool);
            ConversionOutcome::Raster { image: image.path }
        }
        Err(e) => {
            if let StageError::Raster { ref attempts } = e {
                stats.raster_attempts = attempts.len();
            }
            stage_outcome(e, Some(pdf))
        }
    };
    (Some(workspace), outcome)
}

/// Read the source, extract its preamble and write the wrapping document.
///
/// Returns the `.tex` file name inside the workspace.
async fn prepare_document(
    request: &ConversionRequest,
    workspace: &Workspace,
    config: &ConversionConfig,
    stats: &mut ConversionStats,
    cancel: &CancellationToken,
) -> Result<String, StageError> {
    let source = request.source();
    let tex_file = document::tex_file_name(source);

    notify(config, source, Stage::ExtractPreamble);
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled {
            stage: Stage::ExtractPreamble,
        });
    }
    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| StageError::Resource {
            message: format!("Failed to read '{}': {}", source.display(), e),
        })?;
    let text = String::from_utf8_lossy(&bytes);

    if config.copy_source {
        workspace
            .copy_source(source, &tex_file)
            .await
            .map_err(|e| StageError::Resource {
                message: e.to_string(),
            })?;
    }

    let preamble = preamble::extract_preamble(&text);
    stats.preamble_found = preamble.is_some();
    debug!(
        "Preamble {}",
        if stats.preamble_found { "found" } else { "not found" }
    );

    notify(config, source, Stage::Synthesize);
    document::write_document(workspace, source, preamble.as_deref())
        .await
        .map_err(|e| StageError::Resource {
            message: e.to_string(),
        })?;

    Ok(tex_file)
}

/// Fold a stage error into the terminal outcome.
///
/// `pdf` is the compiled PDF when the failure happened after compilation.
fn stage_outcome(err: StageError, pdf: Option<PathBuf>) -> ConversionOutcome {
    match (err, pdf) {
        (StageError::Cancelled { stage }, _) => ConversionOutcome::Cancelled { stage },
        (
            StageError::Compile {
                message,
                log_excerpt,
            },
            _,
        ) => ConversionOutcome::CompileFailure {
            message,
            log_excerpt,
        },
        (StageError::Resource { message }, _) => ConversionOutcome::ResourceFailure { message },
        (err @ StageError::Raster { .. }, Some(pdf)) => ConversionOutcome::PdfOnly {
            pdf,
            raster_error: err.to_string(),
        },
        (err @ StageError::Raster { .. }, None) => ConversionOutcome::ResourceFailure {
            message: err.to_string(),
        },
    }
}

fn notify(config: &ConversionConfig, source: &Path, stage: Stage) {
    debug!("{}: {}", source.display(), stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(source, stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_error_with_pdf_becomes_pdf_only() {
        let outcome = stage_outcome(
            StageError::Raster {
                attempts: vec!["pdftocairo: could not be started".into()],
            },
            Some(PathBuf::from("/w/plot.pdf")),
        );
        match outcome {
            ConversionOutcome::PdfOnly { pdf, raster_error } => {
                assert_eq!(pdf, PathBuf::from("/w/plot.pdf"));
                assert!(raster_error.contains("pdftocairo"));
            }
            other => panic!("expected PdfOnly, got {other:?}"),
        }
    }

    #[test]
    fn compile_error_keeps_excerpt() {
        let outcome = stage_outcome(
            StageError::Compile {
                message: "pdflatex exit status: 1".into(),
                log_excerpt: "This is pdfTeX...".into(),
            },
            None,
        );
        assert_eq!(
            outcome,
            ConversionOutcome::CompileFailure {
                message: "pdflatex exit status: 1".into(),
                log_excerpt: "This is pdfTeX...".into(),
            }
        );
    }

    #[tokio::test]
    async fn write_artifact_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ConversionOutcome::CompileFailure {
            message: "m".into(),
            log_excerpt: "l".into(),
        };
        let written = write_artifact(&outcome, &dir.path().join("out.png"))
            .await
            .unwrap();
        assert_eq!(written, None);
    }

    #[tokio::test]
    async fn write_artifact_redirects_pdf_extension() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("plot.pdf");
        std::fs::write(&pdf, b"%PDF-1.5\n").unwrap();
        let outcome = ConversionOutcome::PdfOnly {
            pdf,
            raster_error: "none".into(),
        };

        let written = write_artifact(&outcome, &dir.path().join("out/figure.png"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(written, dir.path().join("out/figure.pdf"));
        assert_eq!(std::fs::read(&written).unwrap(), b"%PDF-1.5\n");
    }

    #[tokio::test]
    async fn cancelled_before_start_allocates_nothing() {
        let src_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("plot.pgf");
        std::fs::write(&source, "\\begin{pgfpicture}\\end{pgfpicture}").unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let config = ConversionConfig::builder()
            .workspace_root(root.path())
            .cancellation(token)
            .build()
            .unwrap();

        let conversion = convert(&source, &config).await.unwrap();
        assert!(conversion.workspace.is_none());
        assert_eq!(
            conversion.outcome,
            ConversionOutcome::Cancelled {
                stage: Stage::Allocate
            }
        );
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unwritable_root_is_resource_failure() {
        let src_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("plot.pgf");
        std::fs::write(&source, "x").unwrap();

        let config = ConversionConfig::builder()
            .workspace_root(src_dir.path().join("missing/root"))
            .build()
            .unwrap();

        let conversion = convert(&source, &config).await.unwrap();
        assert!(conversion.workspace.is_none());
        assert!(matches!(
            conversion.outcome,
            ConversionOutcome::ResourceFailure { .. }
        ));
    }
}
