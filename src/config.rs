//! Configuration types for PGF-to-PNG conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Tool names, DPI, timeouts and the
//! log-excerpt length live here rather than as constants so tests can point
//! the pipeline at stub executables and callers can pin exact tool paths.

use crate::error::PgfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Configuration for a PGF-to-PNG conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pgf2png::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .tex_engine("/usr/local/texlive/bin/pdflatex")
///     .dpi(150)
///     .compile_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// TeX engine executable (name on `PATH` or absolute path). Default: `pdflatex`.
    pub tex_engine: PathBuf,

    /// Rasterizers tried in order until one produces a PNG.
    ///
    /// Default: `pdftocairo`, `pdftoppm`, `convert`. The vector renderer
    /// comes first because it produces the cleanest anti-aliasing on thin
    /// PGF strokes; `convert` is last since it delegates to Ghostscript and
    /// needs an explicit density.
    pub rasterizers: Vec<RasterTool>,

    /// Output density passed to density-aware rasterizers. Range: 36–1200. Default: 300.
    pub dpi: u32,

    /// Maximum number of characters of the TeX log reported on failure. Default: 200.
    pub log_excerpt_chars: usize,

    /// Timeout for the TeX engine invocation in seconds. Default: 120.
    ///
    /// `-interaction=batchmode` stops TeX from waiting on the terminal, but
    /// runaway macro expansion can still loop forever.
    pub compile_timeout_secs: u64,

    /// Timeout for each individual rasterizer attempt in seconds. Default: 60.
    pub raster_timeout_secs: u64,

    /// Directory under which workspaces are created. `None` → OS temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Prefix of each workspace directory name. Default: `pgf2png-`.
    pub workspace_prefix: String,

    /// Copy the source file into the workspace before compiling. Default: true.
    ///
    /// The synthesized document always `\input`s the original path; the copy
    /// only exists so the workspace is self-describing when inspected later.
    pub copy_source: bool,

    /// Maximum number of sources converted at once by
    /// [`crate::convert::convert_many`]. Default: 4.
    pub concurrency: usize,

    /// Optional progress callback for stage-level events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels every in-flight conversion sharing this config when triggered.
    pub cancellation: Option<CancellationToken>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            tex_engine: PathBuf::from("pdflatex"),
            rasterizers: RasterTool::default_chain(),
            dpi: 300,
            log_excerpt_chars: 200,
            compile_timeout_secs: 120,
            raster_timeout_secs: 60,
            workspace_root: None,
            workspace_prefix: "pgf2png-".to_string(),
            copy_source: true,
            concurrency: 4,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("tex_engine", &self.tex_engine)
            .field("rasterizers", &self.rasterizers)
            .field("dpi", &self.dpi)
            .field("log_excerpt_chars", &self.log_excerpt_chars)
            .field("compile_timeout_secs", &self.compile_timeout_secs)
            .field("raster_timeout_secs", &self.raster_timeout_secs)
            .field("workspace_root", &self.workspace_root)
            .field("workspace_prefix", &self.workspace_prefix)
            .field("copy_source", &self.copy_source)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The directory workspaces are created under.
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// A token that is never cancelled when none was configured.
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone().unwrap_or_default()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn tex_engine(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.tex_engine = program.into();
        self
    }

    /// Replace the whole rasterizer chain.
    pub fn rasterizers(mut self, tools: Vec<RasterTool>) -> Self {
        self.config.rasterizers = tools;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(36, 1200);
        self
    }

    pub fn log_excerpt_chars(mut self, n: usize) -> Self {
        self.config.log_excerpt_chars = n;
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn raster_timeout_secs(mut self, secs: u64) -> Self {
        self.config.raster_timeout_secs = secs;
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(root.into());
        self
    }

    pub fn workspace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.workspace_prefix = prefix.into();
        self
    }

    pub fn copy_source(mut self, v: bool) -> Self {
        self.config.copy_source = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PgfError> {
        let c = &self.config;
        if c.rasterizers.is_empty() {
            return Err(PgfError::InvalidConfig(
                "At least one rasterizer must be configured".into(),
            ));
        }
        if c.tex_engine.as_os_str().is_empty() {
            return Err(PgfError::InvalidConfig("TeX engine must not be empty".into()));
        }
        if c.compile_timeout_secs == 0 || c.raster_timeout_secs == 0 {
            return Err(PgfError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        if c.dpi < 36 || c.dpi > 1200 {
            return Err(PgfError::InvalidConfig(format!(
                "DPI must be 36–1200, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(PgfError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.workspace_prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(PgfError::InvalidConfig(format!(
                "Workspace prefix must not contain '{}'",
                std::path::MAIN_SEPARATOR
            )));
        }
        Ok(self.config)
    }
}

// ── Rasterizers ──────────────────────────────────────────────────────────

/// Argument convention of a rasterizer executable.
///
/// | Kind | Arguments |
/// |------|-----------|
/// | `Cairo` | `-png -singlefile <pdf> <prefix>` |
/// | `Poppler` | `-png -singlefile <pdf> <prefix>` |
/// | `ImageMagick` | `-density <dpi> <pdf> <prefix>.png` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterToolKind {
    /// `pdftocairo`: vector-aware renderer.
    Cairo,
    /// `pdftoppm`: raster renderer.
    Poppler,
    /// `convert` / `magick`: generic image tool.
    ImageMagick,
}

impl RasterToolKind {
    /// Executable name used when no explicit program is given.
    pub fn default_program(self) -> &'static str {
        match self {
            RasterToolKind::Cairo => "pdftocairo",
            RasterToolKind::Poppler => "pdftoppm",
            RasterToolKind::ImageMagick => "convert",
        }
    }

    /// Arguments for rendering `pdf` to `<prefix>.png`.
    pub fn args(self, pdf: &Path, prefix: &Path, dpi: u32) -> Vec<std::ffi::OsString> {
        match self {
            RasterToolKind::Cairo | RasterToolKind::Poppler => vec![
                "-png".into(),
                "-singlefile".into(),
                pdf.as_os_str().to_owned(),
                prefix.as_os_str().to_owned(),
            ],
            RasterToolKind::ImageMagick => {
                let mut out = prefix.as_os_str().to_owned();
                out.push(".png");
                vec![
                    "-density".into(),
                    dpi.to_string().into(),
                    pdf.as_os_str().to_owned(),
                    out,
                ]
            }
        }
    }
}

impl std::str::FromStr for RasterToolKind {
    type Err = PgfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cairo" | "pdftocairo" => Ok(RasterToolKind::Cairo),
            "poppler" | "pdftoppm" => Ok(RasterToolKind::Poppler),
            "imagemagick" | "magick" | "convert" => Ok(RasterToolKind::ImageMagick),
            other => Err(PgfError::InvalidConfig(format!(
                "Unknown rasterizer kind '{other}' (expected cairo, poppler or imagemagick)"
            ))),
        }
    }
}

/// One entry of the rasterizer fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterTool {
    pub kind: RasterToolKind,
    pub program: PathBuf,
}

impl RasterTool {
    pub fn new(kind: RasterToolKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
        }
    }

    /// The tool of this kind under its usual executable name.
    pub fn of_kind(kind: RasterToolKind) -> Self {
        Self::new(kind, kind.default_program())
    }

    /// `pdftocairo` → `pdftoppm` → `convert`.
    pub fn default_chain() -> Vec<RasterTool> {
        vec![
            Self::of_kind(RasterToolKind::Cairo),
            Self::of_kind(RasterToolKind::Poppler),
            Self::of_kind(RasterToolKind::ImageMagick),
        ]
    }

    /// Human-readable name for logs and error messages.
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl std::str::FromStr for RasterTool {
    type Err = PgfError;

    /// Parse `kind` or `kind=program`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((kind, program)) if !program.trim().is_empty() => {
                Ok(Self::new(kind.parse()?, program.trim()))
            }
            Some((kind, _)) => Ok(Self::of_kind(kind.parse()?)),
            None => Ok(Self::of_kind(s.parse()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_order() {
        let names: Vec<String> = RasterTool::default_chain().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["pdftocairo", "pdftoppm", "convert"]);
    }

    #[test]
    fn builder_rejects_empty_chain() {
        let err = ConversionConfig::builder()
            .rasterizers(vec![])
            .build()
            .unwrap_err();
        assert!(matches!(err, PgfError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ConversionConfig::builder()
            .compile_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = ConversionConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 1200);
    }

    #[test]
    fn parse_raster_tool() {
        let t: RasterTool = "poppler=/opt/bin/pdftoppm".parse().unwrap();
        assert_eq!(t.kind, RasterToolKind::Poppler);
        assert_eq!(t.program, PathBuf::from("/opt/bin/pdftoppm"));

        let t: RasterTool = "magick".parse().unwrap();
        assert_eq!(t, RasterTool::of_kind(RasterToolKind::ImageMagick));

        assert!("ghostscript".parse::<RasterTool>().is_err());
    }

    #[test]
    fn imagemagick_args_carry_density() {
        let args = RasterToolKind::ImageMagick.args(
            Path::new("/w/plot.pdf"),
            Path::new("/w/plot"),
            300,
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-density", "300", "/w/plot.pdf", "/w/plot.png"]);
    }

    #[test]
    fn cairo_args_use_singlefile_prefix() {
        let args = RasterToolKind::Cairo.args(Path::new("/w/plot.pdf"), Path::new("/w/plot"), 300);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-png", "-singlefile", "/w/plot.pdf", "/w/plot"]);
    }
}
