//! The document pipeline: drive the asset bundle, then convert pages in
//! order with a sliding context window.
//!
//! Processing is strictly sequential and forward-only. Page `i` cannot
//! start until page `i-1` has finished, because the previous page's
//! *generated Markdown* is part of page `i`'s prompt context. Converting
//! pages concurrently would require dropping that dependency.

use crate::config::ConversionConfig;
use crate::error::PdfmarkError;
use crate::output::{ConversionOutput, PageMetrics};
use crate::pipeline::assets::PageAssets;
use crate::pipeline::llm::{self, ClientRegistry, PageWindow};
use std::path::{Path, PathBuf};
use tracing::{info, Instrument};

/// Separator line between pages in the assembled document.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Convert a PDF document to Markdown, page by page.
///
/// Returns the whole-document Markdown plus one [`PageMetrics`] per page,
/// in page order. With fallback enabled (the default) a page whose model
/// call fails degrades to cleaned-up extracted text and the document still
/// completes; with fallback disabled the first failure aborts.
pub async fn convert_document(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfmarkError> {
    let span = tracing::info_span!("convert_document", pdf = %pdf_path.display());

    async move {
        let assets = PageAssets::extract(pdf_path, config.dpi).await?;
        let page_count = assets.page_count();

        let mut registry = ClientRegistry::new(config.api_timeout_secs);
        let mut md_pages: Vec<String> = Vec::with_capacity(page_count);
        let mut metrics: Vec<PageMetrics> = Vec::with_capacity(page_count);
        let mut prev_markdown: Option<String> = None;

        let texts = assets.page_texts();
        let images = assets.image_paths();

        for i in 0..page_count {
            let prev = i.checked_sub(1);
            let window = PageWindow {
                page_num: i + 1,
                prev_text: prev.map(|p| texts[p].as_str()),
                prev_image: prev.map(|p| images[p].as_path()),
                curr_text: texts[i].as_str(),
                curr_image: images[i].as_path(),
                next_text: texts.get(i + 1).map(String::as_str),
                next_image: images.get(i + 1).map(PathBuf::as_path),
                prev_markdown: prev_markdown.as_deref(),
            };

            info!(
                page = i + 1,
                pages = page_count,
                has_prev = prev.is_some(),
                has_next = i + 1 < page_count,
                "page start"
            );

            let (markdown, page_metrics) = llm::convert_page(&mut registry, &window, config).await?;

            prev_markdown = Some(markdown.clone());
            md_pages.push(markdown);
            metrics.push(page_metrics);
        }

        // Join while the bundle is still alive: a page's window references
        // its neighbour's image, so no temp file may vanish before the
        // last page has converted.
        let markdown = join_pages(&md_pages);
        info!(pages = page_count, chars = markdown.len(), "document assembled");

        Ok(ConversionOutput { markdown, metrics })
    }
    .instrument(span)
    .await
}

/// Join per-page Markdown with the page separator: each page stripped of
/// surrounding newlines, the whole trimmed, exactly one trailing newline.
pub fn join_pages(pages: &[String]) -> String {
    let joined = pages
        .iter()
        .map(|p| p.trim_matches('\n'))
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR);
    format!("{}\n", joined.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_single_page() {
        let pages = vec!["# Title\n\nbody\n".to_string()];
        assert_eq!(join_pages(&pages), "# Title\n\nbody\n");
    }

    #[test]
    fn join_uses_separator_and_single_trailing_newline() {
        let pages = vec!["one\n".to_string(), "two\n".to_string(), "three\n".to_string()];
        assert_eq!(join_pages(&pages), "one\n\n---\n\ntwo\n\n---\n\nthree\n");
    }

    #[test]
    fn join_strips_page_edge_newlines_only_once() {
        let pages = vec!["\n\nalpha\n\n".to_string(), "beta".to_string()];
        let joined = join_pages(&pages);
        assert_eq!(joined, "alpha\n\n---\n\nbeta\n");
        assert!(!joined.ends_with("\n\n"));
    }

    #[test]
    fn join_empty_document() {
        assert_eq!(join_pages(&[]), "\n");
    }

    #[test]
    fn page_content_is_not_inlined_across_pages() {
        // The separator is the only thing between pages; neighbouring page
        // text never leaks into another page's slot.
        let pages = vec!["page one".to_string(), "page two".to_string()];
        let joined = join_pages(&pages);
        let parts: Vec<&str> = joined.trim_end().split(PAGE_SEPARATOR).collect();
        assert_eq!(parts, vec!["page one", "page two"]);
    }
}
