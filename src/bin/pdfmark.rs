//! CLI binary for pdfmark.
//!
//! A thin shim over the library crate: validates the input path, derives
//! the output path, runs the document pipeline, writes the Markdown file,
//! and renders a per-page metrics table.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfmark::{
    convert_document, resolve_output, validate_input, ConversionConfig, ConversionOutput,
    PdfmarkError,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes document.md next to the input)
  pdfmark document.pdf

  # Convert to an explicit file
  pdfmark document.pdf -o output.md

  # Use a specific model
  pdfmark --model gpt-5 document.pdf

  # Abort instead of degrading when the model is unreachable
  pdfmark --no-fallback document.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key
  OPENAI_BASE_URL           Alternate OpenAI-compatible endpoint
  AZURE_OPENAI_ENDPOINT     Azure OpenAI endpoint (switches to Azure mode)
  AZURE_OPENAI_API_KEY      Azure OpenAI API key
  AZURE_OPENAI_API_VERSION  Azure API version (default: preview)
  AZURE_OPENAI_DEPLOYMENT   Azure deployment name (overrides the model id)
  PDFMARK_MODEL             Override model id (default: gpt-5)
  PDFMARK_ALLOW_FALLBACK    Set to 0 to disable the text-cleanup fallback
  PDFIUM_LIB_PATH           Path to an existing libpdfium copy

Without any provider credentials, pdfmark still produces output: each page
falls back to a whitespace-normalised copy of its embedded text layer.
"#;

/// Convert PDF files to Markdown using a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdfmark",
    version,
    about = "Convert PDF files to Markdown using a vision LLM",
    long_about = "Convert a PDF document to clean, well-structured Markdown, one page at a \
time. Each page's conversion sees the neighbouring pages' text and images plus the previous \
page's generated Markdown, so lists, tables, and headings stay consistent across page breaks.",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF file to convert.
    pdf: PathBuf,

    /// Output markdown file path (default: input name with .md, numbered on collision).
    #[arg(short, long, env = "PDFMARK_OUTPUT")]
    output: Option<PathBuf>,

    /// Model id (e.g. gpt-5). Overrides PDFMARK_MODEL.
    #[arg(long, env = "PDFMARK_MODEL")]
    model: Option<String>,

    /// Rendering DPI (72-400).
    #[arg(long, env = "PDFMARK_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Fail instead of degrading to text cleanup when the model is unreachable.
    #[arg(long)]
    no_fallback: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFMARK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep library logs
    // quiet unless the user asks for them.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Validate input, derive output ────────────────────────────────────
    let pdf_path = match validate_input(&cli.pdf) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{} {e}", red("✗"));
            std::process::exit(1);
        }
    };
    let out_path = resolve_output(&pdf_path, cli.output.as_deref())
        .context("Failed to resolve output path")?;

    // ── Build config ─────────────────────────────────────────────────────
    let mut config = ConversionConfig::from_env();
    config.dpi = cli.dpi;
    if let Some(model) = cli.model.clone() {
        config.model = Some(model);
    }
    if cli.no_fallback {
        config.allow_fallback = false;
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let spinner = if cli.quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Converting {} → Markdown…", pdf_path.display()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let result = convert_document(&pdf_path, &config).await;

    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }

    let output = match result {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{} {e}", red("✗"));
            std::process::exit(1);
        }
    };

    std::fs::write(&out_path, &output.markdown).map_err(|e| PdfmarkError::OutputWriteFailed {
        path: out_path.clone(),
        source: e,
    })?;

    if !cli.quiet {
        eprintln!(
            "{} Wrote {}",
            green("✔"),
            bold(&out_path.display().to_string())
        );
        print_metrics(&output);
    }

    Ok(())
}

/// Render the per-page token/timing table plus aggregate totals.
fn print_metrics(output: &ConversionOutput) {
    if output.metrics.is_empty() {
        return;
    }

    eprintln!();
    eprintln!(
        "  {}",
        bold("Page   Tokens in  Tokens out  Total      Time      ")
    );

    let fmt_tokens = |t: Option<u64>| match t {
        Some(n) => format!("{n:>9}"),
        None => format!("{:>9}", "—"),
    };

    for (i, m) in output.metrics.iter().enumerate() {
        eprintln!(
            "  {:>4}  {}  {}  {}  {:>7.1}s  {}",
            i + 1,
            fmt_tokens(m.input_tokens),
            fmt_tokens(m.output_tokens),
            fmt_tokens(m.total_tokens),
            m.duration_ms as f64 / 1000.0,
            if m.fallback { dim("fallback") } else { String::new() },
        );
    }

    let pages = output.metrics.len() as f64;
    eprintln!(
        "  {}  {:>9}  {:>9}  {:>9}  {:>7.1}s",
        bold("total"),
        output.total_input_tokens(),
        output.total_output_tokens(),
        output.total_tokens(),
        output.total_duration_ms() as f64 / 1000.0,
    );
    eprintln!(
        "  {}  {:>9.0}  {:>9.0}  {:>9.0}  {:>7.1}s",
        dim("avg  "),
        output.total_input_tokens() as f64 / pages,
        output.total_output_tokens() as f64 / pages,
        output.total_tokens() as f64 / pages,
        output.total_duration_ms() as f64 / pages / 1000.0,
    );

    let missing = output.pages_without_usage();
    if missing > 0 {
        eprintln!(
            "  {}",
            dim(&format!("{missing} page(s) reported no token usage"))
        );
    }
}
