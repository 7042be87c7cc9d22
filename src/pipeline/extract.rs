//! Text-layer extraction: one plain-text string per page, in page order.
//!
//! No OCR happens here. A scanned page with no embedded text layer yields
//! an empty string, never an error — the vision model still sees the page
//! image, and the fallback path simply produces nothing for such a page.

use pdfium_render::prelude::*;
use tracing::debug;

/// Pull the embedded text layer from every page of an open document.
///
/// Blocking; call from inside `spawn_blocking`.
pub(crate) fn extract_text(document: &PdfDocument<'_>) -> Vec<String> {
    document
        .pages()
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let text = page.text().map(|t| t.all()).unwrap_or_default();
            debug!(page = idx + 1, chars = text.len(), "extracted text layer");
            text
        })
        .collect()
}
