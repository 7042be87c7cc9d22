//! Error types for the pdfmark library.
//!
//! One enum covers the whole pipeline, but its variants fall into three
//! tiers that callers treat differently:
//!
//! * **User errors** — bad input path, wrong extension, missing credentials
//!   with fallback disabled. The CLI prints these and exits non-zero.
//!
//! * **Provider errors** — rate limiting (retried with backoff before it
//!   ever surfaces) and unrecoverable API failures. When fallback is
//!   enabled these never reach the caller; the affected page degrades to
//!   the deterministic text-cleanup path instead.
//!
//! * **Defects** — [`PdfmarkError::AssetCountMismatch`] signals an internal
//!   consistency violation (the renderer and text extractor disagreed on
//!   the page count). It aborts the conversion rather than silently
//!   truncating output.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfmark library.
#[derive(Debug, Error)]
pub enum PdfmarkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The input path does not have a `.pdf` extension.
    #[error("Not a PDF: '{path}'")]
    NotAPdf { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open or parse the document.
    #[error("Cannot open PDF '{path}': {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error while rasterising a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
         Install pdfium or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumUnavailable(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// Required provider credentials are absent and fallback is disabled.
    #[error("Provider credentials missing: {hint}")]
    MissingCredentials { hint: String },

    /// The provider kept returning HTTP 429 until the retry budget ran out.
    #[error("Rate limited by the provider after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// The provider returned a non-retryable error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Defects ───────────────────────────────────────────────────────────
    /// The renderer and text extractor produced differing page counts.
    ///
    /// This cannot happen when both run against the same opened document;
    /// if it does, it is a bug, not a recoverable user error.
    #[error("Asset count mismatch: {images} images, {texts} texts, {pages} pages")]
    AssetCountMismatch {
        images: usize,
        texts: usize,
        pages: usize,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfmarkError {
    /// True for errors the per-page converter may absorb by degrading to
    /// fallback Markdown instead of aborting the document.
    pub fn is_page_recoverable(&self) -> bool {
        matches!(
            self,
            PdfmarkError::MissingCredentials { .. }
                | PdfmarkError::RateLimited { .. }
                | PdfmarkError::LlmApiError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = PdfmarkError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(e.to_string().contains("File not found"));
    }

    #[test]
    fn not_a_pdf_display() {
        let e = PdfmarkError::NotAPdf {
            path: PathBuf::from("notes.txt"),
        };
        assert!(e.to_string().contains("Not a PDF"));
    }

    #[test]
    fn mismatch_display() {
        let e = PdfmarkError::AssetCountMismatch {
            images: 3,
            texts: 2,
            pages: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("3 images"), "got: {msg}");
        assert!(msg.contains("2 texts"), "got: {msg}");
    }

    #[test]
    fn recoverability_split() {
        assert!(PdfmarkError::LlmApiError {
            message: "boom".into()
        }
        .is_page_recoverable());
        assert!(!PdfmarkError::Internal("bug".into()).is_page_recoverable());
    }
}
