//! Configuration for PDF-to-Markdown conversion.
//!
//! All behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`] or loaded from the environment with
//! [`ConversionConfig::from_env`]. Keeping every knob in one struct makes it
//! trivial to share a config across the pipeline and to diff two runs when
//! their outputs differ.
//!
//! Provider credentials are deliberately *not* stored here — they are read
//! from the environment at call time by [`crate::pipeline::llm`], so a page
//! converted after the operator exports `OPENAI_API_KEY` picks it up without
//! rebuilding the config.

use crate::error::PdfmarkError;

/// Model used when neither the config nor `PDFMARK_MODEL` names one.
pub const DEFAULT_MODEL: &str = "gpt-5";

/// Configuration for a PDF-to-Markdown conversion.
///
/// # Example
/// ```rust
/// use pdfmark::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(150)
///     .model("gpt-5")
///     .allow_fallback(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    ///
    /// Applied as a `dpi / 72` scale factor against each page's native size.
    /// 150 keeps text sharp enough for a vision model while the per-page PNG
    /// stays well below typical API upload limits.
    pub dpi: u32,

    /// Model identifier override, e.g. "gpt-5". If `None`, `PDFMARK_MODEL`
    /// from the environment is used, else [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Degrade to deterministic text cleanup when the model is unreachable.
    /// Default: true.
    ///
    /// With this off, a missing credential or an unrecoverable API failure
    /// aborts the whole document conversion and nothing is written.
    pub allow_fallback: bool,

    /// Total call attempts when the provider rate-limits (HTTP 429). Default: 6.
    pub max_attempts: u32,

    /// Base retry delay in seconds (exponential backoff). Default: 2.
    pub retry_base_secs: u64,

    /// Retry delay ceiling in seconds. Default: 30.
    pub retry_cap_secs: u64,

    /// Per-call HTTP timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            model: None,
            allow_fallback: true,
            max_attempts: 6,
            retry_base_secs: 2,
            retry_cap_secs: 30,
            api_timeout_secs: 120,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with the recognised `PDFMARK_*` environment keys.
    ///
    /// * `PDFMARK_MODEL` — model identifier override.
    /// * `PDFMARK_ALLOW_FALLBACK` — fallback enabled unless the value is
    ///   exactly `"0"`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("PDFMARK_MODEL") {
            if !model.is_empty() {
                config.model = Some(model);
            }
        }
        if let Ok(v) = std::env::var("PDFMARK_ALLOW_FALLBACK") {
            config.allow_fallback = v != "0";
        }
        config
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn allow_fallback(mut self, v: bool) -> Self {
        self.config.allow_fallback = v;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_base_secs(mut self, secs: u64) -> Self {
        self.config.retry_base_secs = secs;
        self
    }

    pub fn retry_cap_secs(mut self, secs: u64) -> Self {
        self.config.retry_cap_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PdfmarkError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(PdfmarkError::Internal(format!(
                "DPI must be 72-400, got {}",
                c.dpi
            )));
        }
        Ok(self.config)
    }
}
