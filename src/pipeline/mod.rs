//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. the rendering backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! assets ──▶ encode ──▶ llm
//! (pdfium render + text, temp dir)  (base64 data URIs)  (model call + fallback)
//! ```
//!
//! 1. [`assets`]  — open the document once, rasterise every page into a
//!    scoped temp directory ([`render`]) and pull the text layer
//!    ([`extract`]); runs in `spawn_blocking` because pdfium is not
//!    async-safe
//! 2. [`encode`]  — PNG file → base64 data URI for the multimodal request
//! 3. [`llm`]     — per-page conversion with retry/backoff and the
//!    deterministic fallback path; the only stage with network I/O

pub mod assets;
pub mod encode;
pub mod extract;
pub mod llm;
pub mod render;
