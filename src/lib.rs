//! # pgf2png
//!
//! Render PGF/TikZ drawing fragments (for example the `.pgf` files
//! Matplotlib's PGF backend writes) to PNG images.
//!
//! A `.pgf` file cannot be compiled on its own: it is meant to be `\input`
//! into a LaTeX document that loads the right packages. This crate writes
//! that document for you, runs `pdflatex`, and converts the PDF with the
//! first rasterizer that works on the machine. If none does, you still get
//! the PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source.pgf
//!  │
//!  ├─ 1. Workspace  fresh temp directory per request (kept for inspection)
//!  ├─ 2. Preamble   recover Matplotlib's preamble from the comment header
//!  ├─ 3. Document   standalone + pgf + lmodern + preamble + \input{source}
//!  ├─ 4. Compile    pdflatex -interaction=batchmode
//!  ├─ 5. Raster     pdftocairo → pdftoppm → convert (first PNG wins)
//!  └─ 6. Outcome    Raster | PdfOnly | CompileFailure | ResourceFailure | Cancelled
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pgf2png::{convert, ConversionConfig, ConversionOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let conversion = convert("figure.pgf", &config).await?;
//!     match &conversion.outcome {
//!         ConversionOutcome::Raster { image } => println!("{}", image.display()),
//!         ConversionOutcome::PdfOnly { pdf, .. } => println!("PDF only: {}", pdf.display()),
//!         other => eprintln!("{}", other.summary()),
//!     }
//!     // The workspace is kept unless you remove it.
//!     if let Some(ws) = conversion.workspace {
//!         ws.remove().await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pgf2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pgf2png = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Package | Needed for |
//! |------|---------|------------|
//! | `pdflatex` | TeX Live / MiKTeX | every conversion |
//! | `pdftocairo`, `pdftoppm` | poppler-utils | preferred PNG conversion |
//! | `convert` | ImageMagick + Ghostscript | last-resort PNG conversion |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, RasterTool, RasterToolKind};
pub use convert::{
    convert, convert_many, convert_sync, convert_to_file, run, write_artifact, WrittenConversion,
};
pub use error::{PgfError, StageError};
pub use output::{Conversion, ConversionOutcome, ConversionStats, Stage};
pub use pipeline::input::ConversionRequest;
pub use pipeline::preamble::extract_preamble;
pub use pipeline::workspace::{Workspace, WorkspaceGuard};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, ConversionStream};
pub use tokio_util::sync::CancellationToken;
pub use viewer::ViewerResponse;
