//! Mapping from a conversion outcome to what an editor viewer should show.
//!
//! An editor integration opens a `.pgf` file through a custom viewer hook.
//! The hook either hands a PNG to the editor's built-in image preview or
//! renders a small HTML page: the TeX error for a failed compile, or a link
//! to open the PDF externally when no rasterizer was available.

use crate::output::ConversionOutcome;
use serde::Serialize;
use std::path::{Path, PathBuf};
use url::Url;

/// What a viewer hook should display for a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ViewerResponse {
    /// Open this PNG in the built-in image viewer.
    Image(PathBuf),
    /// Render this self-contained HTML page.
    Html(String),
}

impl ViewerResponse {
    /// Build the response for `outcome`, titled after `source`.
    pub fn from_outcome(source: &Path, outcome: &ConversionOutcome) -> Self {
        let title = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        let body = match outcome {
            ConversionOutcome::Raster { image } => return ViewerResponse::Image(image.clone()),
            ConversionOutcome::PdfOnly { pdf, raster_error } => format!(
                "<p>The figure compiled, but no PNG converter could be run.</p>\n\
                 <p><a href=\"{}\">Open the PDF externally</a></p>\n\
                 <pre>{}</pre>",
                escape_html(&file_uri(pdf)),
                escape_html(raster_error)
            ),
            ConversionOutcome::CompileFailure {
                message,
                log_excerpt,
            } => format!(
                "<p>LaTeX compilation failed: {}</p>\n<pre>{}</pre>",
                escape_html(message),
                escape_html(log_excerpt)
            ),
            ConversionOutcome::ResourceFailure { message } => format!(
                "<p>Could not prepare a working directory.</p>\n<pre>{}</pre>",
                escape_html(message)
            ),
            ConversionOutcome::Cancelled { stage } => {
                format!("<p>Rendering was cancelled during {stage}.</p>")
            }
        };

        ViewerResponse::Html(format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{t}</title></head>\n\
             <body>\n<h3>{t}</h3>\n{body}\n</body>\n</html>\n",
            t = escape_html(&title)
        ))
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `file://` URI for `path`, or the plain path when it is not absolute.
fn file_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|()| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Stage;

    #[test]
    fn raster_outcome_opens_image() {
        let outcome = ConversionOutcome::Raster {
            image: PathBuf::from("/w/plot.png"),
        };
        assert_eq!(
            ViewerResponse::from_outcome(Path::new("/f/plot.pgf"), &outcome),
            ViewerResponse::Image(PathBuf::from("/w/plot.png"))
        );
    }

    #[test]
    fn compile_failure_escapes_log() {
        let outcome = ConversionOutcome::CompileFailure {
            message: "pdflatex exit status: 1".into(),
            log_excerpt: "! Undefined control sequence <\\foo>".into(),
        };
        let ViewerResponse::Html(html) =
            ViewerResponse::from_outcome(Path::new("/f/plot.pgf"), &outcome)
        else {
            panic!("expected HTML");
        };
        assert!(html.contains("&lt;\\foo&gt;"));
        assert!(!html.contains("<\\foo>"));
        assert!(html.contains("<title>plot.pgf</title>"));
    }

    #[cfg(unix)]
    #[test]
    fn pdf_only_links_to_pdf() {
        let outcome = ConversionOutcome::PdfOnly {
            pdf: PathBuf::from("/tmp/pgf2png-ab c/plot.pdf"),
            raster_error: "No usable rasterizer found".into(),
        };
        let ViewerResponse::Html(html) =
            ViewerResponse::from_outcome(Path::new("/f/plot.pgf"), &outcome)
        else {
            panic!("expected HTML");
        };
        assert!(html.contains("href=\"file:///tmp/pgf2png-ab%20c/plot.pdf\""));
        assert!(html.contains("No usable rasterizer found"));
    }

    #[cfg(unix)]
    #[test]
    fn reserved_characters_are_escaped_in_link() {
        let outcome = ConversionOutcome::PdfOnly {
            pdf: PathBuf::from("/tmp/w/fig#1?.pdf"),
            raster_error: "No usable rasterizer found".into(),
        };
        let ViewerResponse::Html(html) =
            ViewerResponse::from_outcome(Path::new("/f/fig#1?.pgf"), &outcome)
        else {
            panic!("expected HTML");
        };
        assert!(html.contains("href=\"file:///tmp/w/fig%231%3F.pdf\""), "{html}");
    }

    #[test]
    fn cancelled_mentions_stage() {
        let outcome = ConversionOutcome::Cancelled {
            stage: Stage::Compile,
        };
        let ViewerResponse::Html(html) =
            ViewerResponse::from_outcome(Path::new("plot.pgf"), &outcome)
        else {
            panic!("expected HTML");
        };
        assert!(html.contains("cancelled during LaTeX compilation"));
    }

    #[test]
    fn relative_path_falls_back_to_plain_text() {
        assert_eq!(file_uri(Path::new("plot.pdf")), "plot.pdf");
    }

    #[cfg(windows)]
    #[test]
    fn windows_paths_get_three_slashes() {
        assert_eq!(file_uri(Path::new(r"C:\t\plot.pdf")), "file:///C:/t/plot.pdf");
    }
}
