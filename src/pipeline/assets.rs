//! The per-document asset bundle: rendered page images plus page texts,
//! backed by a scoped temporary directory.
//!
//! ## Why one scope for everything?
//!
//! A page's context window references its *neighbours'* images, so no image
//! may be deleted until the last page has been converted. Tying every
//! rendered file to a single `TempDir` owned by [`PageAssets`] gives the
//! whole set one lifetime: the directory (and every path handed out from
//! here) is deleted when the bundle drops, on success, error, or panic
//! alike.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state that must not be
//! driven from async contexts. All pdfium work — opening the document,
//! rendering, text extraction — happens in one `spawn_blocking` closure
//! against a single opened document, which also guarantees the renderer
//! and the extractor see the same page indices.

use crate::error::PdfmarkError;
use crate::pipeline::{extract, render};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Rendered images, extracted texts, and the page count for one document.
///
/// Image paths are valid only while this bundle is alive.
#[derive(Debug)]
pub struct PageAssets {
    image_paths: Vec<PathBuf>,
    page_texts: Vec<String>,
    page_count: usize,
    _tmp: TempDir,
}

impl PageAssets {
    /// Render and extract every page of `pdf_path` at the given DPI.
    ///
    /// Validates the bundle invariant: exactly one image and one text per
    /// page. A violation is a defect ([`PdfmarkError::AssetCountMismatch`]),
    /// not a recoverable user error.
    pub async fn extract(pdf_path: &Path, dpi: u32) -> Result<Self, PdfmarkError> {
        let path = pdf_path.to_path_buf();
        let tmp = TempDir::with_prefix("pdfmark-")
            .map_err(|e| PdfmarkError::Internal(format!("temp dir: {e}")))?;
        let dir = tmp.path().to_path_buf();

        let (image_paths, page_texts, page_count) = tokio::task::spawn_blocking(move || {
            let span = tracing::info_span!("extract_assets", pdf = %path.display(), dpi);
            let _guard = span.enter();

            let pdfium = bind_pdfium()?;
            let document = pdfium.load_pdf_from_file(&path, None).map_err(|e| {
                PdfmarkError::CorruptPdf {
                    path: path.clone(),
                    detail: format!("{e:?}"),
                }
            })?;

            let page_count = document.pages().len() as usize;
            let image_paths = render::render_pages(&document, &dir, dpi)?;
            let page_texts = extract::extract_text(&document);

            Ok::<_, PdfmarkError>((image_paths, page_texts, page_count))
        })
        .await
        .map_err(|e| PdfmarkError::Internal(format!("asset task panicked: {e}")))??;

        if image_paths.len() != page_count || page_texts.len() != page_count {
            return Err(PdfmarkError::AssetCountMismatch {
                images: image_paths.len(),
                texts: page_texts.len(),
                pages: page_count,
            });
        }

        info!(
            pages = page_count,
            images = image_paths.len(),
            texts = page_texts.len(),
            "page assets extracted"
        );

        Ok(Self {
            image_paths,
            page_texts,
            page_count,
            _tmp: tmp,
        })
    }

    pub fn image_paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    pub fn page_texts(&self) -> &[String] {
        &self.page_texts
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

/// Bind to a pdfium library: `PDFIUM_LIB_PATH` first, then the system copy.
fn bind_pdfium() -> Result<Pdfium, PdfmarkError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| Pdfium::bind_to_system_library())
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PdfmarkError::PdfiumUnavailable(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Whether a pdfium library can be bound in this environment.
///
/// Integration tests use this to skip themselves on machines without
/// pdfium installed instead of failing.
pub fn pdfium_available() -> bool {
    bind_pdfium().is_ok()
}
