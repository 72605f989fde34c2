//! PDF compilation: run the TeX engine over the synthesized document.
//!
//! The engine runs in `-interaction=batchmode` so it never waits on stdin,
//! with both its working directory and `-output-directory` pointing at the
//! workspace. A zero exit status is not trusted on its own: TeX can recover
//! from some errors and exit cleanly without shipping a page, so success
//! also requires `<stem>.pdf` to exist afterwards.
//!
//! On failure the caller gets at most `log_excerpt_chars` characters of the
//! `.log` file (plus `...`). Full TeX logs run to thousands of lines and the
//! first lines are the ones naming the missing package or bad macro.

use crate::config::ConversionConfig;
use crate::error::StageError;
use crate::output::Stage;
use crate::pipeline::process::{run_tool, ToolFailure};
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Marker appended to a truncated log excerpt.
pub const ELLIPSIS: &str = "...";

/// Compile `tex_file_name` inside `workspace` and return the PDF path.
pub async fn compile(
    workspace: &Workspace,
    tex_file_name: &str,
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf, StageError> {
    let stem = Path::new(tex_file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| tex_file_name.to_string());
    let pdf_path = workspace.join(format!("{stem}.pdf"));
    let log_path = workspace.join(format!("{stem}.log"));

    let mut output_dir = std::ffi::OsString::from("-output-directory=");
    output_dir.push(workspace.path());
    let args = [
        std::ffi::OsString::from("-interaction=batchmode"),
        output_dir,
        std::ffi::OsString::from(tex_file_name),
    ];

    info!(
        "Compiling {} with {}",
        tex_file_name,
        config.tex_engine.display()
    );

    match run_tool(
        &config.tex_engine,
        &args,
        workspace.path(),
        config.compile_timeout_secs,
        cancel,
    )
    .await
    {
        Ok(_) => {}
        Err(ToolFailure::Cancelled) => {
            return Err(StageError::Cancelled {
                stage: Stage::Compile,
            })
        }
        Err(failure) => {
            let message = format!("{} {}", config.tex_engine.display(), failure);
            warn!("{}", message);
            let log_excerpt = read_log_excerpt(&log_path, config.log_excerpt_chars)
                .await
                .unwrap_or_else(|| excerpt(&message, config.log_excerpt_chars));
            return Err(StageError::Compile {
                message,
                log_excerpt,
            });
        }
    }

    if tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
        debug!("PDF produced: {}", pdf_path.display());
        Ok(pdf_path)
    } else {
        let message = "PDF not produced".to_string();
        warn!("{} exited cleanly but {} is missing", config.tex_engine.display(), pdf_path.display());
        let log_excerpt = read_log_excerpt(&log_path, config.log_excerpt_chars)
            .await
            .unwrap_or_else(|| message.clone());
        Err(StageError::Compile {
            message,
            log_excerpt,
        })
    }
}

/// Read and truncate the TeX log, or `None` when it was never written.
async fn read_log_excerpt(log_path: &Path, max_chars: usize) -> Option<String> {
    let bytes = tokio::fs::read(log_path).await.ok()?;
    Some(excerpt(&String::from_utf8_lossy(&bytes), max_chars))
}

/// First `max_chars` characters of `text`, with [`ELLIPSIS`] appended when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(excerpt("! Undefined control sequence.", 200), "! Undefined control sequence.");
    }

    #[test]
    fn exact_length_is_not_marked() {
        let text = "a".repeat(200);
        assert_eq!(excerpt(&text, 200), text);
    }

    #[test]
    fn long_text_is_cut_with_ellipsis() {
        let text = "b".repeat(500);
        let cut = excerpt(&text, 200);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.ends_with(ELLIPSIS));
    }

    #[test]
    fn cut_respects_char_boundaries() {
        let text = "é".repeat(300);
        let cut = excerpt(&text, 200);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.starts_with("éé"));
    }

    #[tokio::test]
    async fn missing_engine_reports_message_as_excerpt() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(root.path(), "cmp-").unwrap();
        let config = ConversionConfig::builder()
            .tex_engine("pgf2png-no-such-latex")
            .build()
            .unwrap();

        let err = compile(&ws, "plot.tex", &config, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            StageError::Compile {
                message,
                log_excerpt,
            } => {
                assert!(message.contains("could not be started"), "got: {message}");
                assert_eq!(log_excerpt, message);
            }
            other => panic!("expected Compile, got {other:?}"),
        }
    }
}
