//! CLI binary for pgf2png.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pgf2png::pipeline::document::artifact_stem;
use pgf2png::{
    convert_many, write_artifact, CancellationToken, Conversion, ConversionConfig,
    ConversionOutcome, ConversionProgressCallback, PgfError, ProgressCallback, RasterTool, Stage,
    ViewerResponse,
};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all sources, one log line per
/// finished source. Sources may finish out of order when `-j` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_sources: usize) {
        self.bar.set_length(total_sources as u64);
    }

    fn on_stage_start(&self, source: &Path, stage: Stage) {
        self.bar.set_message(format!("{} · {stage}", file_label(source)));
    }

    fn on_raster_fallback(&self, source: &Path, tool: &str, error: &str) {
        self.bar.println(format!(
            "  {} {}  {} unavailable: {}",
            yellow("↷"),
            file_label(source),
            tool,
            dim(&truncate(error, 80)),
        ));
    }

    fn on_source_complete(&self, source: &Path, outcome: &ConversionOutcome) {
        let mark = match outcome {
            ConversionOutcome::Raster { .. } => green("✓"),
            ConversionOutcome::PdfOnly { .. } => yellow("⚠"),
            _ => red("✗"),
        };
        self.bar.println(format!(
            "  {} {}  {}",
            mark,
            file_label(source),
            dim(&truncate(&outcome.summary(), 100)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total_sources: usize, _rastered: usize) {
        self.bar.finish_and_clear();
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max.saturating_sub(1)) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render a Matplotlib figure; prints the PNG path
  pgf2png figure.pgf

  # Copy the PNG somewhere and delete the scratch directory
  pgf2png figure.pgf -o figure.png --cleanup

  # Render a whole directory, four at a time
  pgf2png -j 4 --output-dir png/ figures/*.pgf

  # Use only ImageMagick from a custom location
  pgf2png --rasterizer imagemagick=/opt/im/bin/magick figure.pgf

  # Machine-readable result
  pgf2png --json figure.pgf

RASTERIZERS (tried in order until one produces a PNG):
  cairo        pdftocairo -png -singlefile <pdf> <prefix>
  poppler      pdftoppm   -png -singlefile <pdf> <prefix>
  imagemagick  convert    -density <dpi> <pdf> <png>

EXIT STATUS:
  0  every source produced a PNG
  2  at least one source produced only a PDF (no rasterizer worked)
  1  any other failure

ENVIRONMENT VARIABLES:
  PGF2PNG_TEX_ENGINE      TeX engine executable
  PGF2PNG_DPI             Density for ImageMagick
  PGF2PNG_WORKSPACE_ROOT  Directory for scratch workspaces
  RUST_LOG                Override log filter (e.g. pgf2png=debug)
"#;

/// Render PGF/TikZ figures to PNG via pdflatex.
#[derive(Parser, Debug)]
#[command(
    name = "pgf2png",
    version,
    about = "Render PGF/TikZ figures to PNG via pdflatex",
    long_about = "Wrap PGF/TikZ fragments (such as Matplotlib's .pgf output) in a standalone \
LaTeX document, compile them with pdflatex, and convert the PDF to PNG with the first \
available rasterizer (pdftocairo, pdftoppm, ImageMagick).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PGF source files.
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Copy the PNG (or PDF, with a .pdf extension) to this path. Single source only.
    #[arg(short, long, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Copy each result to DIR/<name>.png (or .pdf). Repeated names get `-2`, `-3`, ...
    #[arg(long, env = "PGF2PNG_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// TeX engine executable.
    #[arg(long, env = "PGF2PNG_TEX_ENGINE", default_value = "pdflatex")]
    tex_engine: PathBuf,

    /// Rasterizer as `kind` or `kind=program`; repeat to build the chain.
    /// Replaces the default chain when given.
    #[arg(long = "rasterizer", value_name = "KIND[=PROGRAM]")]
    rasterizers: Vec<RasterTool>,

    /// Output density for ImageMagick (36–1200).
    #[arg(long, env = "PGF2PNG_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(36..=1200))]
    dpi: u32,

    /// pdflatex timeout in seconds.
    #[arg(long, env = "PGF2PNG_COMPILE_TIMEOUT", default_value_t = 120)]
    compile_timeout: u64,

    /// Per-rasterizer timeout in seconds.
    #[arg(long, env = "PGF2PNG_RASTER_TIMEOUT", default_value_t = 60)]
    raster_timeout: u64,

    /// Characters of the TeX log shown on failure.
    #[arg(long, env = "PGF2PNG_LOG_EXCERPT", default_value_t = 200)]
    log_excerpt: usize,

    /// Directory under which scratch workspaces are created.
    #[arg(long, env = "PGF2PNG_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Number of sources rendered at once.
    #[arg(short = 'j', long, env = "PGF2PNG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Delete each workspace once its result has been copied out.
    #[arg(long)]
    cleanup: bool,

    /// Output structured JSON instead of paths.
    #[arg(long, conflicts_with = "html")]
    json: bool,

    /// Print what an editor viewer would show: the PNG path or an HTML page.
    #[arg(long)]
    html: bool,

    /// Disable progress bar.
    #[arg(long, env = "PGF2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PGF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "PGF2PNG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.output.is_some() && cli.sources.len() > 1 {
        anyhow::bail!("--output takes a single source; use --output-dir for several");
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.html;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb, cancel)?;

    // ── Run conversions ──────────────────────────────────────────────────
    let results = convert_many(&cli.sources, &config).await;

    let mut reports = Vec::with_capacity(results.len());
    let mut worst = Severity::Ok;
    let names = output_names(&cli.sources);

    for ((source, name), result) in cli.sources.iter().zip(&names).zip(results) {
        match result {
            Ok(mut conversion) => {
                worst = worst.max(Severity::of(&conversion.outcome));
                let written = copy_out(&cli, &conversion, name).await?;
                report(&cli, &conversion, written.as_deref())?;
                if cli.cleanup && written.is_some() {
                    remove_workspace(&mut conversion).await?;
                }
                reports.push(serde_json::json!({
                    "conversion": conversion,
                    "written": written,
                }));
            }
            Err(e) => {
                worst = Severity::Failed;
                if !cli.json {
                    eprintln!("{} {}: {}", red("✗"), source.display(), e);
                }
                reports.push(error_report(source, &e));
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise output")?;
        println!("{json}");
    }

    Ok(worst.exit_code())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .tex_engine(cli.tex_engine.clone())
        .dpi(cli.dpi)
        .compile_timeout_secs(cli.compile_timeout)
        .raster_timeout_secs(cli.raster_timeout)
        .log_excerpt_chars(cli.log_excerpt)
        .concurrency(cli.concurrency)
        .cancellation(cancel);

    if !cli.rasterizers.is_empty() {
        builder = builder.rasterizers(cli.rasterizers.clone());
    }
    if let Some(ref root) = cli.workspace_root {
        builder = builder.workspace_root(root.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Copy the result out of the workspace if `-o` or `--output-dir` was given.
///
/// `name` is the file stem used under `--output-dir`.
async fn copy_out(cli: &Cli, conversion: &Conversion, name: &str) -> Result<Option<PathBuf>> {
    let dest = if let Some(ref output) = cli.output {
        output.clone()
    } else if let Some(ref dir) = cli.output_dir {
        dir.join(format!("{name}.png"))
    } else {
        return Ok(None);
    };

    write_artifact(&conversion.outcome, &dest)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))
}

/// One distinct output stem per source.
///
/// Sources from different directories may share a stem; later ones get
/// `-2`, `-3`, ... skipping any name another source already owns.
fn output_names(sources: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = sources.iter().map(|s| artifact_stem(s)).collect();
    let owned: HashSet<&str> = stems.iter().map(String::as_str).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(stems.len());

    stems
        .iter()
        .map(|stem| {
            let mut name = stem.clone();
            let mut n = 2;
            while taken.contains(&name) || (name != *stem && owned.contains(name.as_str())) {
                name = format!("{stem}-{n}");
                n += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Delete the workspace and drop it from the conversion so reports no
/// longer point at it.
async fn remove_workspace(conversion: &mut Conversion) -> Result<()> {
    if let Some(ws) = conversion.workspace.take() {
        ws.remove().await.context("Failed to remove workspace")?;
    }
    Ok(())
}

/// Print one conversion result in the selected format.
fn report(cli: &Cli, conversion: &Conversion, written: Option<&Path>) -> Result<()> {
    if cli.json {
        return Ok(());
    }

    if cli.html {
        match ViewerResponse::from_outcome(&conversion.source, &conversion.outcome) {
            ViewerResponse::Image(path) => println!("{}", path.display()),
            ViewerResponse::Html(page) => print!("{page}"),
        }
        return Ok(());
    }

    match &conversion.outcome {
        ConversionOutcome::Raster { image } => {
            println!("{}", written.unwrap_or(image.as_path()).display());
        }
        ConversionOutcome::PdfOnly { pdf, raster_error } => {
            println!("{}", written.unwrap_or(pdf.as_path()).display());
            if !cli.quiet {
                eprintln!("{} {}", yellow("⚠"), raster_error);
            }
        }
        ConversionOutcome::CompileFailure {
            message,
            log_excerpt,
        } => {
            eprintln!(
                "{} {}: {}",
                red("✗"),
                bold(&conversion.source.display().to_string()),
                message
            );
            eprintln!("{}", dim(log_excerpt));
            if let Some(ref ws) = conversion.workspace {
                eprintln!("   full log in {}", ws.path().display());
            }
        }
        other => {
            eprintln!(
                "{} {}: {}",
                red("✗"),
                bold(&conversion.source.display().to_string()),
                other.summary()
            );
        }
    }

    if cli.verbose && !cli.quiet {
        let s = &conversion.stats;
        eprintln!(
            "   {}",
            dim(&format!(
                "compile {}ms · raster {}ms ({} attempt(s){}) · total {}ms",
                s.compile_duration_ms,
                s.raster_duration_ms,
                s.raster_attempts,
                s.rasterizer
                    .as_deref()
                    .map(|r| format!(", {r}"))
                    .unwrap_or_default(),
                s.total_duration_ms
            ))
        );
    }
    Ok(())
}

fn error_report(source: &Path, e: &PgfError) -> serde_json::Value {
    serde_json::json!({
        "source": source,
        "error": e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Severity {
    Ok,
    PdfOnly,
    Failed,
}

impl Severity {
    fn of(outcome: &ConversionOutcome) -> Self {
        match outcome {
            ConversionOutcome::Raster { .. } => Severity::Ok,
            ConversionOutcome::PdfOnly { .. } => Severity::PdfOnly,
            _ => Severity::Failed,
        }
    }

    fn exit_code(self) -> ExitCode {
        match self {
            Severity::Ok => ExitCode::SUCCESS,
            Severity::PdfOnly => ExitCode::from(2),
            Severity::Failed => ExitCode::FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgf2png::{ConversionStats, Workspace};

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn distinct_stems_are_kept() {
        assert_eq!(
            output_names(&paths(&["/a/loss.pgf", "/a/acc.pgf"])),
            ["loss", "acc"]
        );
    }

    #[test]
    fn shared_stems_get_suffixes() {
        assert_eq!(
            output_names(&paths(&["/a/fig.pgf", "/b/fig.pgf", "/c/fig.pgf"])),
            ["fig", "fig-2", "fig-3"]
        );
    }

    #[test]
    fn suffix_skips_names_owned_by_other_sources() {
        assert_eq!(
            output_names(&paths(&["/a/fig.pgf", "/b/fig.pgf", "/c/fig-2.pgf"])),
            ["fig", "fig-3", "fig-2"]
        );
    }

    #[tokio::test]
    async fn removed_workspace_is_dropped_from_report() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::allocate(root.path(), "cli-").unwrap();
        let dir = ws.path().to_path_buf();
        let mut conversion = Conversion {
            source: PathBuf::from("/a/fig.pgf"),
            workspace: Some(ws),
            outcome: ConversionOutcome::Raster {
                image: dir.join("fig.png"),
            },
            stats: ConversionStats::default(),
        };

        remove_workspace(&mut conversion).await.unwrap();

        assert!(!dir.exists());
        let json = serde_json::to_value(&conversion).unwrap();
        assert!(json["workspace"].is_null());
    }
}
