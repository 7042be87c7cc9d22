//! Result types: per-page metrics and the assembled document.

use serde::{Deserialize, Serialize};

/// Metrics recorded for one converted page.
///
/// Token counts are `None` when the provider did not report usage or the
/// page went through the fallback path (which makes no API call at all).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Model identifier the page was (or would have been) converted with.
    pub model: String,
    /// Prompt tokens consumed, if the provider reported them.
    pub input_tokens: Option<u64>,
    /// Completion tokens produced, if the provider reported them.
    pub output_tokens: Option<u64>,
    /// Total tokens, if the provider reported them.
    pub total_tokens: Option<u64>,
    /// Wall-clock duration of the page conversion, fallback included.
    pub duration_ms: u64,
    /// True when the page was produced by the deterministic text-cleanup
    /// path instead of the model.
    pub fallback: bool,
}

impl PageMetrics {
    /// A metrics record for a page that skipped the model entirely.
    pub fn fallback(model: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            model: model.into(),
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            duration_ms,
            fallback: true,
        }
    }

    /// True when the provider reported no usage at all for this page.
    pub fn missing_usage(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }
}

/// The complete result of a document conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Whole-document Markdown: pages joined by `\n\n---\n\n`, trimmed,
    /// terminated by exactly one newline.
    pub markdown: String,
    /// One entry per page, in page order.
    pub metrics: Vec<PageMetrics>,
}

impl ConversionOutput {
    /// Sum of reported input tokens across pages.
    pub fn total_input_tokens(&self) -> u64 {
        self.metrics.iter().filter_map(|m| m.input_tokens).sum()
    }

    /// Sum of reported output tokens across pages.
    pub fn total_output_tokens(&self) -> u64 {
        self.metrics.iter().filter_map(|m| m.output_tokens).sum()
    }

    /// Sum of reported total tokens across pages.
    pub fn total_tokens(&self) -> u64 {
        self.metrics.iter().filter_map(|m| m.total_tokens).sum()
    }

    /// Total wall-clock page-conversion time in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.metrics.iter().map(|m| m.duration_ms).sum()
    }

    /// Number of pages with no usage reported.
    pub fn pages_without_usage(&self) -> usize {
        self.metrics.iter().filter(|m| m.missing_usage()).count()
    }

    /// Number of pages produced by the fallback path.
    pub fn fallback_pages(&self) -> usize {
        self.metrics.iter().filter(|m| m.fallback).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(input: Option<u64>, output: Option<u64>, total: Option<u64>, fb: bool) -> PageMetrics {
        PageMetrics {
            model: "gpt-5".into(),
            input_tokens: input,
            output_tokens: output,
            total_tokens: total,
            duration_ms: 100,
            fallback: fb,
        }
    }

    #[test]
    fn totals_skip_missing_usage() {
        let out = ConversionOutput {
            markdown: "x\n".into(),
            metrics: vec![
                page(Some(10), Some(20), Some(30), false),
                page(None, None, None, true),
                page(Some(5), None, Some(7), false),
            ],
        };
        assert_eq!(out.total_input_tokens(), 15);
        assert_eq!(out.total_output_tokens(), 20);
        assert_eq!(out.total_tokens(), 37);
        assert_eq!(out.pages_without_usage(), 1);
        assert_eq!(out.fallback_pages(), 1);
        assert_eq!(out.total_duration_ms(), 300);
    }

    #[test]
    fn partially_reported_usage_is_not_missing() {
        assert!(!page(Some(1), None, None, false).missing_usage());
        assert!(page(None, None, None, true).missing_usage());
    }
}
