//! # pdfmark
//!
//! Convert PDF documents to Markdown page-by-page using a vision language
//! model with a sliding context window of neighbouring pages.
//!
//! ## How it works
//!
//! For each page, the model receives the extracted text layer and rendered
//! image of the *previous*, *current*, and *next* pages, plus the Markdown
//! already generated for the previous page, and returns Markdown for the
//! current page only. The neighbours bound the model's attention — they are
//! continuity cues, never content to transcribe. When no provider
//! credentials are configured (or a call fails) and fallback is enabled,
//! the page degrades to a deterministic cleanup of its extracted text, so
//! the pipeline always completes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Assets   rasterise pages + pull text layer via pdfium
//!  │              (one scoped temp dir holds every page image)
//!  ├─ 2. Window   prev/curr/next texts + images + prior page's Markdown
//!  ├─ 3. Convert  one model call per page, sequential, retry on 429,
//!  │              fallback to cleaned text when the model is unreachable
//!  └─ 4. Output   pages joined by "---" separators + per-page metrics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfmark::{convert_document, ConversionConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from OPENAI_API_KEY / AZURE_OPENAI_* env vars
//!     let config = ConversionConfig::from_env();
//!     let output = convert_document(Path::new("document.pdf"), &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!(
//!         "tokens: {} in / {} out ({} pages via fallback)",
//!         output.total_input_tokens(),
//!         output.total_output_tokens(),
//!         output.fallback_pages()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfmark` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfmark = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_MODEL};
pub use convert::{convert_document, join_pages, PAGE_SEPARATOR};
pub use error::PdfmarkError;
pub use output::{ConversionOutput, PageMetrics};
pub use paths::{resolve_output, validate_input};
pub use pipeline::assets::{pdfium_available, PageAssets};
pub use pipeline::llm::{convert_page, fallback_markdown, ClientRegistry, PageWindow, RetryPolicy};
