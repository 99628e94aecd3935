//! CLI binary for edgequake-visual.
//!
//! A thin shim over the library crate that maps CLI flags to the tool
//! entry points and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_visual::pipeline::engine;
use edgequake_visual::pipeline::source::{classify_source, SourceKind};
use edgequake_visual::{
    extract_document_page_from_base64, extract_document_page_from_file,
    extract_document_page_from_url, extract_image_from_base64, extract_image_from_file,
    extract_image_from_url, read_visual, ExtractDocumentPageParams, ExtractImageParams,
    ReadVisualParams, RegionSpec, ToolResult, VisualConfig,
};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Downsized preview of a local image
  visual-read screenshot.png -o preview.png

  # Page 3 of a PDF at 200 DPI
  visual-read --page 3 --dpi 200 paper.pdf -o page3.png

  # Top-left quarter of an image (ratio coordinates)
  visual-read --region 0,0,0.5,0.5 photo.jpg -o corner.jpg

  # 200x200 px box centred on (640, 360)
  visual-read --center 640,360,100,100 frame.png -o detail.png

  # Remote image, full tool result as JSON
  visual-read --json https://example.com/chart.png

  # Force document rendering for a PDF served without an extension
  visual-read --mode document https://example.com/download?id=42

REGIONS:
  If all four numbers are between 0 and 1 they are fractions of the image
  size; otherwise they are pixels. --region takes x1,y1,x2,y2 corners,
  --center takes cx,cy,half_width,half_height.

ENVIRONMENT VARIABLES:
  VISUAL_MAX_PAYLOAD_BYTES    Largest accepted input (default 52428800)
  VISUAL_MAX_WIDTH            Output bounding box width (default 512)
  VISUAL_MAX_HEIGHT           Output bounding box height (default 512)
  VISUAL_DEFAULT_DPI          Render DPI when --dpi is absent (default 150)
  VISUAL_JPEG_QUALITY         1-100 (default 80)
  VISUAL_PNG_COMPRESSION      0-9 (default 9)
  VISUAL_ALLOWED_DOMAINS      Comma-separated URL host allow-list
  VISUAL_DOWNLOAD_TIMEOUT     HTTP timeout in seconds (default 120)
  VISUAL_SNIFF_POLICY         hints | magic (default hints)
  VISUAL_NO_DOWNLOAD          Never download the PDF engine
  PDFIUM_LIB_PATH             Path to libpdfium
  PDFIUM_AUTO_CACHE_DIR       Where the downloaded PDF engine is cached

PDF ENGINE:
  Unless --mode image is given, the first run downloads pdfium (~30 MB)
  into the cache directory. Builds with --features bundled carry it inside
  the binary instead.
"#;

/// Resolve images and document pages into small, model-ready images.
#[derive(Parser, Debug)]
#[command(
    name = "visual-read",
    version,
    about = "Resolve images and document pages into small, model-ready images",
    long_about = "Read an image or one page of a PDF from a local path, an HTTP/HTTPS URL, \
a data URI, or raw base64. Optionally crop to a region of interest, downscale to a bounding \
box, and re-encode.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// File path, URL, data URI, or base64 string.
    source: String,

    /// How to treat the content.
    #[arg(long, env = "VISUAL_MODE", value_enum, default_value = "auto")]
    mode: ModeArg,

    /// 1-based page number for documents.
    #[arg(long, env = "VISUAL_PAGE", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,

    /// Rendering DPI for documents (72–600).
    #[arg(long, env = "VISUAL_DPI",
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,

    /// Crop to corners x1,y1,x2,y2.
    #[arg(long, value_parser = parse_quad, conflicts_with = "center")]
    region: Option<[f64; 4]>,

    /// Crop to centre and half extents cx,cy,half_w,half_h.
    #[arg(long, value_parser = parse_quad)]
    center: Option<[f64; 4]>,

    /// MIME type hint, e.g. application/pdf.
    #[arg(long, env = "VISUAL_MIME_HINT")]
    mime_hint: Option<String>,

    /// Output bounding box width in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_width: Option<u32>,

    /// Output bounding box height in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_height: Option<u32>,

    /// Write the encoded image to this file.
    #[arg(short, long, env = "VISUAL_OUTPUT")]
    output: Option<PathBuf>,

    /// Do not download the PDF engine; use an installed pdfium only.
    #[arg(long, env = "VISUAL_NO_DOWNLOAD")]
    no_download: bool,

    /// Print the full tool result as JSON.
    #[arg(long, env = "VISUAL_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VISUAL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VISUAL_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    /// Classify the content automatically.
    Auto,
    /// Always decode as an image.
    Image,
    /// Always render a document page.
    Document,
}

fn parse_quad(s: &str) -> std::result::Result<[f64; 4], String> {
    let nums = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    <[f64; 4]>::try_from(nums.as_slice())
        .map_err(|_| format!("expected 4 comma-separated numbers, got {}", nums.len()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    // Not fatal: document requests report the binding error themselves.
    let wants_engine = cli.mode != ModeArg::Image && !cli.no_download;
    if wants_engine && (cfg!(feature = "bundled") || !engine::is_prepared()) {
        if let Err(e) = tokio::task::block_in_place(|| prepare_engine(cli.quiet)) {
            tracing::warn!("{e:#}");
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = run(&cli, &config).await;

    if result.is_error {
        eprintln!("{}", red(result.text().unwrap_or("Error: unknown failure")));
        std::process::exit(1);
    }

    if let Some(ref path) = cli.output {
        let bytes = result
            .image_bytes()
            .context("Tool result carried no image data")?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("Failed to write image to {}", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{}  {} bytes  →  {}",
                green("✔"),
                bytes.len(),
                bold(&path.display().to_string())
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !cli.quiet {
        println!("{}", result.text().unwrap_or_default());
    }

    Ok(())
}

fn prepare_engine(quiet: bool) -> Result<()> {
    let progress = |downloaded: u64, total: Option<u64>| match total {
        Some(t) => eprint!("\r{}  {downloaded}/{t} bytes", bold("PDF engine")),
        None => eprint!("\r{}  {downloaded} bytes", bold("PDF engine")),
    };
    let on_progress: Option<&dyn Fn(u64, Option<u64>)> = if quiet { None } else { Some(&progress) };

    engine::prepare_library(on_progress).context("Failed to prepare PDFium engine")?;
    if !quiet {
        eprintln!("\r{}  {}", bold("PDF engine"), green("ready ✓"));
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<VisualConfig> {
    let mut config = VisualConfig::from_env().context("Invalid VISUAL_* environment")?;
    if let Some(w) = cli.max_width {
        config.max_width = w;
    }
    if let Some(h) = cli.max_height {
        config.max_height = h;
    }
    Ok(config)
}

fn region_arg(cli: &Cli) -> Option<RegionSpec> {
    if let Some([x1, y1, x2, y2]) = cli.region {
        return Some(RegionSpec::corners(x1, y1, x2, y2));
    }
    cli.center
        .map(|[cx, cy, hw, hh]| RegionSpec::center(cx, cy, hw, hh))
}

async fn run(cli: &Cli, config: &VisualConfig) -> ToolResult {
    let region = region_arg(cli);
    let source = cli.source.clone();

    match cli.mode {
        ModeArg::Auto => {
            let params = ReadVisualParams {
                source,
                page: cli.page,
                dpi: cli.dpi,
                region,
                mime_type_hint: cli.mime_hint.clone(),
            };
            read_visual(config, params).await
        }
        ModeArg::Image => {
            let params = ExtractImageParams {
                source,
                region,
                mime_type_hint: cli.mime_hint.clone(),
            };
            match classify_source(&cli.source) {
                SourceKind::FilePath => extract_image_from_file(config, params).await,
                SourceKind::Url => extract_image_from_url(config, params).await,
                SourceKind::InlineData => extract_image_from_base64(config, params).await,
            }
        }
        ModeArg::Document => {
            let params = ExtractDocumentPageParams {
                source,
                page: cli.page,
                dpi: cli.dpi,
                region,
            };
            match classify_source(&cli.source) {
                SourceKind::FilePath => extract_document_page_from_file(config, params).await,
                SourceKind::Url => extract_document_page_from_url(config, params).await,
                SourceKind::InlineData => extract_document_page_from_base64(config, params).await,
            }
        }
    }
}
