//! Prompts for the per-page Markdown conversion.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the conversion rules requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the assembled prompt
//!    directly without a live model call, so a regression in the context
//!    sections is caught immediately.

/// System message sent with every page conversion.
pub const SYSTEM_PROMPT: &str = "You are a document conversion assistant. Convert ONLY the \
current PDF page into precise, high-quality Markdown. Preserve structure such as headings, \
tables, lists, bold text, and callouts. Use surrounding pages only for context; do not \
repeat their content. Return Markdown only — no explanations or code fences.";

/// Fixed conversion rules embedded in the user prompt.
const CONVERSION_RULES: &str = "Rules:\n\
- Use ATX headings only (#, ##, ###).\n\
- Preserve lists, numbering, and callouts.\n\
- Reconstruct tables as GitHub-flavored Markdown with a header row, a separator row, and data rows.\n\
- Keep the column count consistent across every row of a table; invent a placeholder header row only when the table has none.\n\
- Do not invent content that is not on the page.\n\
- Do not repeat a heading that already appeared on the previous page.\n\
- Separate blocks with blank lines.";

/// Labelled context section; absent or empty bodies render a literal `None`.
fn section(title: &str, body: Option<&str>) -> String {
    let value = match body {
        Some(b) if !b.is_empty() => b,
        _ => "None",
    };
    format!("## {title}\n{value}")
}

/// Assemble the full instruction prompt for one page.
///
/// The current page is the only one to transcribe; the neighbouring texts
/// and the previous page's generated Markdown are continuity context.
pub fn build_page_prompt(
    prev_markdown: Option<&str>,
    prev_text: Option<&str>,
    curr_text: &str,
    next_text: Option<&str>,
) -> String {
    [
        "Convert ONLY the current PDF page into Markdown. Use the extracted text and the \
         attached page images to reflect structure. Do NOT include content from other pages. \
         Respond with Markdown only."
            .to_string(),
        CONVERSION_RULES.to_string(),
        section("Previous Page Markdown", prev_markdown),
        section("Previous Page Text", prev_text),
        section("Current Page Text", Some(curr_text)),
        section("Next Page Text", next_text),
    ]
    .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_sections_render_none() {
        let prompt = build_page_prompt(None, None, "body of page one", None);
        assert!(prompt.contains("## Previous Page Markdown\nNone"));
        assert!(prompt.contains("## Previous Page Text\nNone"));
        assert!(prompt.contains("## Current Page Text\nbody of page one"));
        assert!(prompt.contains("## Next Page Text\nNone"));
    }

    #[test]
    fn empty_current_text_renders_none_placeholder() {
        let prompt = build_page_prompt(None, None, "", None);
        assert!(prompt.contains("## Current Page Text\nNone"));
    }

    #[test]
    fn present_sections_carry_their_bodies() {
        let prompt = build_page_prompt(
            Some("# Chapter 1\n"),
            Some("chapter one text"),
            "page two text",
            Some("page three text"),
        );
        assert!(prompt.contains("## Previous Page Markdown\n# Chapter 1\n"));
        assert!(prompt.contains("## Previous Page Text\nchapter one text"));
        assert!(prompt.contains("## Next Page Text\npage three text"));
    }

    #[test]
    fn rules_are_embedded() {
        let prompt = build_page_prompt(None, None, "x", None);
        assert!(prompt.contains("ATX headings only"));
        assert!(prompt.contains("placeholder header"));
    }
}
