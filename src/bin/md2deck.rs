//! CLI binary for md2deck.
//!
//! A thin shim over the library crate that maps CLI flags to an
//! `ExporterConfig` and an `ExportRequest`, then writes the artifact.

use anyhow::{Context, Result};
use clap::Parser;
use md2deck::{ExportFormat, ExportRequest, Exporter, ExporterConfig};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export slides.md to PPTX (default format) in the current directory
  md2deck slides.md

  # Explicit output path and format
  md2deck slides.md -o deck.pdf --format pdf

  # PNG sequence, delivered as a zip of per-slide images
  md2deck slides.md --format png -o slides-png.zip

  # Dark mode with a theme installed on demand
  md2deck slides.md --theme @slidev/theme-seriph --dark

  # Read the deck from stdin
  cat slides.md | md2deck - -o deck.pptx

FORMATS:
  Format  Artifact                        Notes
  ──────  ──────────────────────────────  ──────────────────────────────────
  pptx    PowerPoint file (default)       --with-clicks adds per-click steps
  pdf     PDF document                    --with-toc adds an outline
  png     zip of per-slide PNG images     --omit-background for transparency
  md      zip bundle (markdown + assets)

ENVIRONMENT VARIABLES:
  MD2DECK_OUTPUT          Output path (same as -o)
  MD2DECK_FORMAT          Export format (pptx, pdf, png, md)
  MD2DECK_THEME           Slide theme package or local path
  MD2DECK_PROJECT_DIR     Slidev project directory (default: .)
  MD2DECK_WORKSPACE_ROOT  Scratch directory root (default: $TMPDIR/md2deck)

SETUP:
  The rendering itself is done by the Slidev CLI in the project directory:
  1. npm install @slidev/cli playwright-chromium
  2. md2deck slides.md -o deck.pptx

  The first `npx slidev export` may download a headless browser; later runs
  reuse it.
"#;

/// Export Markdown slide decks via the Slidev CLI.
#[derive(Parser, Debug)]
#[command(
    name = "md2deck",
    version,
    about = "Export Markdown slide decks to PDF, PNG, PPTX, or a markdown bundle",
    long_about = "Export Markdown (Slidev syntax) into presentation artifacts by driving the \
external Slidev CLI. Exports run through a FIFO admission queue with a fixed concurrency \
ceiling, each in an isolated scratch workspace that is cleaned up no matter how the job ends.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to export, or '-' to read from stdin.
    input: String,

    /// Write the artifact to this path instead of deriving one.
    #[arg(short, long, env = "MD2DECK_OUTPUT")]
    output: Option<PathBuf>,

    /// Export format.
    #[arg(long, env = "MD2DECK_FORMAT", value_enum, default_value = "pptx")]
    format: FormatArg,

    /// Slide theme: npm package name, or a local path (./theme, /abs/theme).
    #[arg(
        long,
        env = "MD2DECK_THEME",
        long_help = "Slide theme. Package names (e.g. @slidev/theme-seriph) are probed in the \
project's node_modules and installed on demand; local paths are used as-is."
    )]
    theme: Option<String>,

    /// Render slides in dark mode.
    #[arg(long, env = "MD2DECK_DARK")]
    dark: bool,

    /// Include a table of contents (pdf only).
    #[arg(long, env = "MD2DECK_WITH_TOC")]
    with_toc: bool,

    /// Render transparent slides without the background (png only).
    #[arg(long, env = "MD2DECK_OMIT_BACKGROUND")]
    omit_background: bool,

    /// One slide per click step instead of per slide (pptx only).
    #[arg(long, env = "MD2DECK_WITH_CLICKS")]
    with_clicks: bool,

    /// Base name for the artifact (defaults to the input file stem).
    #[arg(long)]
    name: Option<String>,

    /// Slidev project directory (where node_modules lives).
    #[arg(long, env = "MD2DECK_PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,

    /// Root directory for per-job scratch workspaces.
    #[arg(long, env = "MD2DECK_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2DECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2DECK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pptx,
    Pdf,
    Png,
    Md,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pptx => ExportFormat::Pptx,
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Md => ExportFormat::Md,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read the deck source ─────────────────────────────────────────────
    let markdown = if cli.input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read markdown from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read '{}'", cli.input))?
    };

    // ── Build request and engine ─────────────────────────────────────────
    let mut request = ExportRequest::new(markdown);
    request.format = cli.format.into();
    request.theme = cli.theme.clone();
    request.dark_mode = cli.dark;
    request.with_toc = cli.with_toc;
    request.omit_background = cli.omit_background;
    request.with_clicks = cli.with_clicks;
    request.filename = cli.name.clone().or_else(|| input_stem(&cli.input));

    let mut builder = ExporterConfig::builder().project_dir(&cli.project_dir);
    if let Some(root) = &cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    let exporter = Exporter::new(builder.build()?);

    // ── Run the export ───────────────────────────────────────────────────
    let output_path = match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&request),
    };

    let started = Instant::now();
    let artifact = exporter
        .export_to_file(request, &output_path)
        .await
        .context("Export failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {}  {}  {}",
            green("✔"),
            bold(&output_path.display().to_string()),
            dim(&human_size(artifact.bytes.len())),
            dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
        );
    }

    Ok(())
}

/// `<base>.<ext>` in the current directory, using the artifact's real
/// extension (png and md exports come back as zip archives).
fn default_output_path(request: &ExportRequest) -> PathBuf {
    PathBuf::from(format!(
        "{}.{}",
        request.base_name(),
        request.format.content_kind().extension()
    ))
}

fn input_stem(input: &str) -> Option<String> {
    if input == "-" {
        return None;
    }
    Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
}

fn human_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
