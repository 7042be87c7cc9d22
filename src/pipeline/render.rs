//! PDF rasterisation: render every page to a PNG on disk via pdfium.
//!
//! This is PDF *rendering* (page → pixels), not text extraction. The
//! resolution is a `dpi / 72` scale factor applied to each page's native
//! size, so a US-Letter page at 150 DPI comes out around 1275 × 1650 px —
//! sharp enough for a vision model without blowing past API upload limits.
//!
//! The caller owns the target directory; [`crate::pipeline::assets`] passes
//! a `TempDir` path so every rendered file shares the bundle's lifetime.

use crate::error::PdfmarkError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rasterise every page of an open document into `dir` as
/// `page-0001.png`, `page-0002.png`, …
///
/// Blocking; call from inside `spawn_blocking`.
pub(crate) fn render_pages(
    document: &PdfDocument<'_>,
    dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>, PdfmarkError> {
    let scale = dpi as f32 / 72.0;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut image_paths = Vec::with_capacity(document.pages().len() as usize);

    for (idx, page) in document.pages().iter().enumerate() {
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| PdfmarkError::RenderFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;
        let image = bitmap.as_image();

        let out_path = dir.join(format!("page-{:04}.png", idx + 1));
        image.save(&out_path).map_err(|e| PdfmarkError::RenderFailed {
            page: idx + 1,
            detail: format!("PNG write failed: {e}"),
        })?;

        debug!(
            page = idx + 1,
            width = image.width(),
            height = image.height(),
            "rendered page"
        );
        image_paths.push(out_path);
    }

    Ok(image_paths)
}
