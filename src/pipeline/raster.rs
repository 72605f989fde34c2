//! PNG rasterisation with an ordered fallback chain.
//!
//! Which PDF-to-PNG tools exist varies from machine to machine: poppler-utils
//! may be missing on a minimal TeX install, ImageMagick may have PDF input
//! disabled by its security policy. Rather than probing for tools up front we
//! simply try each configured [`RasterTool`] in order and keep the first PNG
//! that actually lands on disk. A missing executable is just another failed
//! attempt.

use crate::config::{ConversionConfig, RasterTool};
use crate::error::StageError;
use crate::output::Stage;
use crate::pipeline::process::{run_tool, ToolFailure};
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A PNG produced by one of the rasterizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub path: PathBuf,
    /// Name of the tool that produced it.
    pub tool: String,
    /// Number of tools invoked, including the successful one.
    pub attempts: usize,
}

/// Render `pdf` to `<stem>.png` in the workspace using the first tool that works.
///
/// `source` is only used to label progress events.
pub async fn rasterize(
    pdf: &Path,
    workspace: &Workspace,
    source: &Path,
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<RasterImage, StageError> {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "figure".to_string());
    let prefix = workspace.join(&stem);
    let png = workspace.join(format!("{stem}.png"));

    let mut failures = Vec::with_capacity(config.rasterizers.len());

    for (i, tool) in config.rasterizers.iter().enumerate() {
        let name = tool.name();
        match attempt(tool, pdf, &prefix, &png, workspace, config, cancel).await {
            Ok(()) => {
                info!("Rasterized {} with {}", pdf.display(), name);
                return Ok(RasterImage {
                    path: png,
                    tool: name,
                    attempts: i + 1,
                });
            }
            Err(ToolFailure::Cancelled) => {
                return Err(StageError::Cancelled {
                    stage: Stage::Rasterize,
                })
            }
            Err(failure) => {
                let error = failure.to_string();
                warn!("Rasterizer {} failed: {}", name, error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_raster_fallback(source, &name, &error);
                }
                failures.push(format!("{name}: {error}"));
            }
        }
    }

    Err(StageError::Raster { attempts: failures })
}

/// One rasterizer invocation; success means exit 0 *and* the PNG exists.
async fn attempt(
    tool: &RasterTool,
    pdf: &Path,
    prefix: &Path,
    png: &Path,
    workspace: &Workspace,
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<(), ToolFailure> {
    let args = tool.kind.args(pdf, prefix, config.dpi);
    debug!("Trying rasterizer {}", tool.name());
    run_tool(
        &tool.program,
        &args,
        workspace.path(),
        config.raster_timeout_secs,
        cancel,
    )
    .await?;

    if tokio::fs::try_exists(png).await.unwrap_or(false) {
        Ok(())
    } else {
        Err(ToolFailure::MissingOutput(png.to_path_buf()))
    }
}
