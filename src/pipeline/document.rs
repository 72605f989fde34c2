//! Wrapping LaTeX document synthesis.
//!
//! A `.pgf` file is a fragment, not a document. We wrap it in a `standalone`
//! document that crops to the drawing with a 1 mm border, load `pgf` and
//! `lmodern`, splice in any extracted Matplotlib preamble, and `\input` the
//! fragment by its **original** path. Using the original path rather than
//! the workspace copy keeps `\pgfimage{...}` and other relative references
//! resolving against the directory the figure was saved in.

use crate::error::PgfError;
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};

/// Base name used for every artifact of a conversion (`<stem>.tex`, `.pdf`, `.png`).
pub fn artifact_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "figure".to_string())
}

/// File name of the synthesized document for `source`.
pub fn tex_file_name(source: &Path) -> String {
    format!("{}.tex", artifact_stem(source))
}

/// Build the wrapping document text.
pub fn synthesize(source: &Path, preamble: Option<&str>) -> String {
    let mut doc = String::from(
        "\\documentclass[border=1mm]{standalone}\n\
         \\usepackage{pgf}\n\
         \\usepackage{lmodern}\n",
    );
    if let Some(preamble) = preamble {
        doc.push_str(preamble);
        doc.push('\n');
    }
    doc.push_str("\\begin{document}\n");
    doc.push_str(&format!("\\input{{{}}}\n", tex_path(source)));
    doc.push_str("\\end{document}\n");
    doc
}

/// Write the synthesized document into the workspace and return its path.
pub async fn write_document(
    workspace: &Workspace,
    source: &Path,
    preamble: Option<&str>,
) -> Result<PathBuf, PgfError> {
    let path = workspace.join(tex_file_name(source));
    tokio::fs::write(&path, synthesize(source, preamble))
        .await
        .map_err(|e| PgfError::Resource {
            path: path.clone(),
            source: e,
        })?;
    Ok(path)
}

// TeX treats `\` as an escape character; forward slashes work on every platform.
// Canonical Windows paths carry a verbatim `\\?\` prefix TeX cannot open.
fn tex_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    let text = match text.strip_prefix(r"\\?\UNC\") {
        Some(unc) => format!(r"\\{unc}"),
        None => text.strip_prefix(r"\\?\").unwrap_or(&text).to_string(),
    };
    text.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_without_preamble() {
        let doc = synthesize(Path::new("/home/u/figs/plot.pgf"), None);
        assert_eq!(
            doc,
            "\\documentclass[border=1mm]{standalone}\n\
             \\usepackage{pgf}\n\
             \\usepackage{lmodern}\n\
             \\begin{document}\n\
             \\input{/home/u/figs/plot.pgf}\n\
             \\end{document}\n"
        );
    }

    #[test]
    fn preamble_goes_after_packages() {
        let doc = synthesize(Path::new("/f/plot.pgf"), Some("\\usepackage{fontspec}"));
        let pkg = doc.find("\\usepackage{lmodern}").unwrap();
        let pre = doc.find("\\usepackage{fontspec}").unwrap();
        let begin = doc.find("\\begin{document}").unwrap();
        assert!(pkg < pre && pre < begin);
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(tex_path(Path::new(r"C:\figs\plot.pgf")), "C:/figs/plot.pgf");
    }

    #[test]
    fn verbatim_prefix_is_dropped() {
        assert_eq!(tex_path(Path::new(r"\\?\C:\f\plot.pgf")), "C:/f/plot.pgf");
        assert_eq!(
            tex_path(Path::new(r"\\?\UNC\server\share\plot.pgf")),
            "//server/share/plot.pgf"
        );
    }

    #[test]
    fn names_follow_source_stem() {
        assert_eq!(tex_file_name(Path::new("/a/b/loss.curve.pgf")), "loss.curve.tex");
        assert_eq!(artifact_stem(Path::new("/a/b/plot")), "plot");
    }

    #[tokio::test]
    async fn written_document_references_original_path() {
        let root = tempfile::tempdir().unwrap();
        let src_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("plot.pgf");
        std::fs::write(&source, "\\begin{pgfpicture}\\end{pgfpicture}").unwrap();

        let ws = Workspace::allocate(root.path(), "doc-").unwrap();
        ws.copy_source(&source, "plot.tex").await.unwrap();
        let tex = write_document(&ws, &source, None).await.unwrap();

        assert_eq!(tex, ws.join("plot.tex"));
        let text = std::fs::read_to_string(&tex).unwrap();
        let expected = format!("\\input{{{}}}", tex_path(&source));
        assert!(text.contains(&expected), "got: {text}");
        let copy = format!("\\input{{{}}}", tex_path(&ws.join("plot.pgf")));
        assert!(!text.contains(&copy));
    }
}
