//! The per-page unit of work: model interaction, retry, and fallback.
//!
//! This module converts one page's context window into a model call and
//! returns Markdown for that page only, plus its [`PageMetrics`]. Prompt
//! wording lives in [`crate::prompts`] so it can change without touching
//! the retry or error-handling logic here.
//!
//! ## Retry Strategy
//!
//! Only HTTP 429 is retried — rate limiting is the one transient class the
//! provider hands back under load. The backoff sequence with the defaults
//! (base 2 s, cap 30 s, 6 attempts) is 2 s → 4 s → 8 s → 16 s → 30 s.
//! Everything else is an unrecoverable call failure: with fallback enabled
//! it degrades that one page, otherwise it aborts the document.
//!
//! ## Fallback
//!
//! `fallback_markdown` is a deterministic passthrough of the extracted text
//! layer: trim, collapse 3+ newline runs to a blank line, one trailing
//! newline. It makes no network call and reports no token usage.

use crate::config::{ConversionConfig, DEFAULT_MODEL};
use crate::error::PdfmarkError;
use crate::output::PageMetrics;
use crate::pipeline::encode;
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn, Instrument};

/// Context window for one page: the current page's materials, the
/// neighbours' where they exist, and the previous page's generated
/// Markdown.
///
/// `page_num` is 1-based and used only for logging.
pub struct PageWindow<'a> {
    pub page_num: usize,
    pub prev_text: Option<&'a str>,
    pub prev_image: Option<&'a Path>,
    pub curr_text: &'a str,
    pub curr_image: &'a Path,
    pub next_text: Option<&'a str>,
    pub next_image: Option<&'a Path>,
    pub prev_markdown: Option<&'a str>,
}

// ── Provider settings ────────────────────────────────────────────────────

/// Provider credentials and endpoint, resolved from the environment at
/// call time.
#[derive(Debug, Clone)]
pub(crate) enum ProviderSettings {
    OpenAi { api_key: String, base_url: String },
    Azure {
        endpoint: String,
        api_key: String,
        api_version: String,
    },
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl ProviderSettings {
    /// Azure when `AZURE_OPENAI_ENDPOINT` is set, else direct OpenAI.
    ///
    /// Missing credentials surface as [`PdfmarkError::MissingCredentials`]
    /// so the caller can decide between fallback and abort before any
    /// network traffic happens.
    pub(crate) fn from_env() -> Result<Self, PdfmarkError> {
        if let Some(endpoint) = env_non_empty("AZURE_OPENAI_ENDPOINT") {
            let api_key = env_non_empty("AZURE_OPENAI_API_KEY").ok_or_else(|| {
                PdfmarkError::MissingCredentials {
                    hint: "AZURE_OPENAI_API_KEY must be set when AZURE_OPENAI_ENDPOINT is used"
                        .into(),
                }
            })?;
            let api_version =
                env_non_empty("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| "preview".into());
            return Ok(ProviderSettings::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key,
                api_version,
            });
        }

        let api_key = env_non_empty("OPENAI_API_KEY").ok_or_else(|| {
            PdfmarkError::MissingCredentials {
                hint: "OPENAI_API_KEY must be set for OpenAI access".into(),
            }
        })?;
        let base_url =
            env_non_empty("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
        Ok(ProviderSettings::OpenAi {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self, model: &str) -> String {
        match self {
            ProviderSettings::OpenAi { base_url, .. } => {
                format!("{base_url}/chat/completions")
            }
            ProviderSettings::Azure {
                endpoint,
                api_version,
                ..
            } => format!(
                "{endpoint}/openai/deployments/{model}/chat/completions?api-version={api_version}"
            ),
        }
    }
}

// ── Model resolution ─────────────────────────────────────────────────────

/// Strip known gateway/provider namespace prefixes from a model identifier.
fn normalize_model(name: &str) -> &str {
    let name = name.strip_prefix("gateway/openai:").unwrap_or(name);
    name.strip_prefix("openai:").unwrap_or(name)
}

/// Resolve the model identifier: config override, else `PDFMARK_MODEL`,
/// else the fixed default. Under Azure, `AZURE_OPENAI_DEPLOYMENT` wins
/// because the URL routes by deployment name, not model name.
pub fn resolve_model(config: &ConversionConfig) -> String {
    let name = config
        .model
        .clone()
        .or_else(|| env_non_empty("PDFMARK_MODEL"))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let mut name = normalize_model(&name).to_string();

    if env_non_empty("AZURE_OPENAI_ENDPOINT").is_some() {
        if let Some(deployment) = env_non_empty("AZURE_OPENAI_DEPLOYMENT") {
            name = deployment;
        }
    }
    name
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Bounded exponential backoff wrapping only the network call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total call attempts, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.retry_base_secs),
            multiplier: 2,
            cap: Duration::from_secs(config.retry_cap_secs),
        }
    }

    /// Delay to sleep before attempt `n` (2-based; attempt 1 has no delay).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2);
        let factor = self.multiplier.saturating_pow(exponent);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(self.cap);
        delay.min(self.cap)
    }
}

// ── Client registry ──────────────────────────────────────────────────────

/// One HTTP client per distinct model identifier, built lazily.
///
/// Owned by the pipeline entry point and passed down, so there is no
/// hidden global state while the "construct once per model" behaviour is
/// preserved. Not shared across threads; the pipeline is sequential.
pub struct ClientRegistry {
    timeout: Duration,
    clients: HashMap<String, LlmClient>,
}

impl ClientRegistry {
    pub fn new(api_timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(api_timeout_secs),
            clients: HashMap::new(),
        }
    }

    /// Number of clients constructed so far.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn get_or_create(
        &mut self,
        model: &str,
        settings: &ProviderSettings,
    ) -> Result<&LlmClient, PdfmarkError> {
        match self.clients.entry(model.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                debug!(model, "constructing LLM client");
                let client = LlmClient::new(model, settings, self.timeout)?;
                Ok(v.insert(client))
            }
        }
    }
}

/// A configured HTTP client bound to one chat-completions endpoint.
struct LlmClient {
    http: reqwest::Client,
    url: String,
    auth: AuthHeader,
}

enum AuthHeader {
    Bearer(String),
    ApiKey(String),
}

impl LlmClient {
    fn new(
        model: &str,
        settings: &ProviderSettings,
        timeout: Duration,
    ) -> Result<Self, PdfmarkError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PdfmarkError::Internal(format!("HTTP client: {e}")))?;
        let auth = match settings {
            ProviderSettings::OpenAi { api_key, .. } => AuthHeader::Bearer(api_key.clone()),
            ProviderSettings::Azure { api_key, .. } => AuthHeader::ApiKey(api_key.clone()),
        };
        Ok(Self {
            http,
            url: settings.chat_url(model),
            auth,
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, PdfmarkError> {
        let request = self.http.post(&self.url).json(body);
        let request = match &self.auth {
            AuthHeader::Bearer(key) => request.bearer_auth(key),
            AuthHeader::ApiKey(key) => request.header("api-key", key),
        };
        request
            .send()
            .await
            .map_err(|e| PdfmarkError::LlmApiError {
                message: e.to_string(),
            })
    }
}

// ── Request / response plumbing ──────────────────────────────────────────

/// Chat-completions request: system prompt, one user turn with the
/// instruction text and up to three page images as data-URI parts.
fn build_request_body(model: &str, prompt: &str, image_uris: &[String]) -> Value {
    let mut content = vec![json!({ "type": "text", "text": prompt })];
    for uri in image_uris {
        content.push(json!({ "type": "image_url", "image_url": { "url": uri } }));
    }
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": prompts::SYSTEM_PROMPT },
            { "role": "user", "content": content },
        ],
    })
}

/// Issue the model call, retrying only the rate-limit class.
async fn call_model(
    client: &LlmClient,
    body: &Value,
    policy: &RetryPolicy,
) -> Result<Value, PdfmarkError> {
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let delay = policy.delay_before(attempt);
            warn!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_secs = delay.as_secs(),
                "rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
        }

        let response = client.post(body).await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            continue;
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let snippet: String = detail.chars().take(200).collect();
            return Err(PdfmarkError::LlmApiError {
                message: format!("HTTP {status}: {snippet}"),
            });
        }
        return response
            .json::<Value>()
            .await
            .map_err(|e| PdfmarkError::LlmApiError {
                message: format!("invalid response body: {e}"),
            });
    }

    Err(PdfmarkError::RateLimited {
        attempts: policy.max_attempts,
    })
}

/// Token usage pulled defensively out of the raw response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenUsage {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
}

const USAGE_CONTAINER_KEYS: [&str; 3] = ["usage", "result_usage", "usage_info"];
const INPUT_TOKEN_KEYS: [&str; 2] = ["input_tokens", "prompt_tokens"];
const OUTPUT_TOKEN_KEYS: [&str; 2] = ["output_tokens", "completion_tokens"];
const TOTAL_TOKEN_KEYS: [&str; 1] = ["total_tokens"];

/// Usage metadata shape varies by provider and gateway. Try each known
/// container key, then each known field name, first match wins; no match
/// yields `None`, never an error.
pub(crate) fn extract_usage(response: &Value) -> TokenUsage {
    let usage = USAGE_CONTAINER_KEYS
        .iter()
        .find_map(|k| response.get(*k))
        .filter(|v| !v.is_null());
    let Some(usage) = usage else {
        return TokenUsage::default();
    };

    let field = |keys: &[&str]| keys.iter().find_map(|k| usage.get(*k).and_then(Value::as_u64));

    TokenUsage {
        input: field(&INPUT_TOKEN_KEYS),
        output: field(&OUTPUT_TOKEN_KEYS),
        total: field(&TOTAL_TOKEN_KEYS),
    }
}

fn extract_content(response: &Value) -> Result<String, PdfmarkError> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PdfmarkError::LlmApiError {
            message: "response has no message content".into(),
        })
}

// ── Fallback ─────────────────────────────────────────────────────────────

static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Deterministic text cleanup used when the model is unavailable: trim,
/// collapse 3+ consecutive newlines to exactly 2, and end a non-empty
/// result with exactly one newline. Empty or whitespace-only input yields
/// an empty string. Idempotent.
pub fn fallback_markdown(text: &str) -> String {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return String::new();
    }
    let collapsed = NEWLINE_RUNS.replace_all(cleaned, "\n\n");
    format!("{collapsed}\n")
}

// ── Page conversion ──────────────────────────────────────────────────────

/// Convert one page to Markdown.
///
/// Missing credentials and unrecoverable call failures degrade to
/// [`fallback_markdown`] when `config.allow_fallback` is set; otherwise
/// the error propagates and aborts the document. The credentials check
/// runs before any network call.
pub async fn convert_page(
    registry: &mut ClientRegistry,
    window: &PageWindow<'_>,
    config: &ConversionConfig,
) -> Result<(String, PageMetrics), PdfmarkError> {
    let start = Instant::now();
    let model = resolve_model(config);

    let settings = match ProviderSettings::from_env() {
        Ok(s) => s,
        Err(err) => {
            if config.allow_fallback {
                warn!(
                    model,
                    page = window.page_num,
                    reason = %err,
                    "credentials missing, using fallback markdown"
                );
                let markdown = fallback_markdown(window.curr_text);
                let metrics = PageMetrics::fallback(model, start.elapsed().as_millis() as u64);
                return Ok((markdown, metrics));
            }
            return Err(err);
        }
    };

    let prompt = prompts::build_page_prompt(
        window.prev_markdown,
        window.prev_text,
        window.curr_text,
        window.next_text,
    );

    let mut image_uris = Vec::with_capacity(3);
    for path in [window.prev_image, Some(window.curr_image), window.next_image]
        .into_iter()
        .flatten()
    {
        image_uris.push(encode::encode_image(path)?);
    }

    let policy = RetryPolicy::from_config(config);
    let body = build_request_body(&model, &prompt, &image_uris);
    let client = registry.get_or_create(&model, &settings)?;

    let span = tracing::info_span!(
        "convert_page",
        model = %model,
        page = window.page_num,
        has_prev = window.prev_text.is_some(),
        has_next = window.next_text.is_some(),
    );

    let outcome = async {
        let response = call_model(client, &body, &policy).await?;
        let content = extract_content(&response)?;
        let usage = extract_usage(&response);
        Ok::<_, PdfmarkError>((content, usage))
    }
    .instrument(span)
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok((content, usage)) => {
            let markdown = format!("{}\n", content.trim());
            debug!(
                page = window.page_num,
                chars = markdown.len(),
                "page converted"
            );
            Ok((
                markdown,
                PageMetrics {
                    model,
                    input_tokens: usage.input,
                    output_tokens: usage.output,
                    total_tokens: usage.total,
                    duration_ms,
                    fallback: false,
                },
            ))
        }
        Err(err) if config.allow_fallback && err.is_page_recoverable() => {
            warn!(
                model,
                page = window.page_num,
                error = %err,
                "model call failed, using fallback markdown"
            );
            Ok((
                fallback_markdown(window.curr_text),
                PageMetrics::fallback(model, duration_ms),
            ))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── fallback_markdown ────────────────────────────────────────────────

    #[test]
    fn fallback_empty_input_yields_empty_string() {
        assert_eq!(fallback_markdown(""), "");
        assert_eq!(fallback_markdown("   \n\n  \t "), "");
    }

    #[test]
    fn fallback_trims_and_appends_single_newline() {
        assert_eq!(fallback_markdown("  hello  "), "hello\n");
        assert_eq!(fallback_markdown("hello\n\n\n"), "hello\n");
    }

    #[test]
    fn fallback_collapses_newline_runs() {
        assert_eq!(fallback_markdown("a\n\n\nb"), "a\n\nb\n");
        assert_eq!(fallback_markdown("a\n\n\n\n\n\nb"), "a\n\nb\n");
        // two newlines stay untouched
        assert_eq!(fallback_markdown("a\n\nb"), "a\n\nb\n");
    }

    #[test]
    fn fallback_is_idempotent() {
        for input in ["", "  x ", "a\n\n\n\nb\nc", "one\n\ntwo\n\n\nthree\n"] {
            let once = fallback_markdown(input);
            assert_eq!(fallback_markdown(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn fallback_output_has_no_long_newline_runs() {
        let out = fallback_markdown("a\n\n\n\nb\n\n\n\n\nc");
        assert!(!out.contains("\n\n\n"));
        assert!(out.ends_with('\n'));
        assert!(!out.ends_with("\n\n"));
    }

    // ── model resolution ─────────────────────────────────────────────────

    #[test]
    fn normalize_strips_gateway_prefixes() {
        assert_eq!(normalize_model("gateway/openai:gpt-5"), "gpt-5");
        assert_eq!(normalize_model("openai:gpt-5"), "gpt-5");
        assert_eq!(normalize_model("gpt-5"), "gpt-5");
        assert_eq!(normalize_model("anthropic:claude"), "anthropic:claude");
    }

    // ── retry policy ─────────────────────────────────────────────────────

    #[test]
    fn retry_delays_grow_exponentially_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
            multiplier: 2,
            cap: Duration::from_secs(30),
        };
        let delays: Vec<u64> = (2..=6).map(|a| policy.delay_before(a).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 30]);
    }

    #[test]
    fn retry_policy_from_config_uses_knobs() {
        let config = crate::config::ConversionConfig::builder()
            .max_attempts(4)
            .retry_base_secs(1)
            .retry_cap_secs(5)
            .build()
            .expect("valid config");
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
        assert_eq!(policy.delay_before(6), Duration::from_secs(5));
    }

    // ── usage extraction ─────────────────────────────────────────────────

    #[test]
    fn usage_absent_yields_all_none() {
        let response = json!({ "choices": [] });
        assert_eq!(extract_usage(&response), TokenUsage::default());
    }

    #[test]
    fn usage_null_yields_all_none() {
        let response = json!({ "usage": null });
        assert_eq!(extract_usage(&response), TokenUsage::default());
    }

    #[test]
    fn usage_openai_field_names() {
        let response = json!({
            "usage": { "prompt_tokens": 120, "completion_tokens": 45, "total_tokens": 165 }
        });
        let usage = extract_usage(&response);
        assert_eq!(usage.input, Some(120));
        assert_eq!(usage.output, Some(45));
        assert_eq!(usage.total, Some(165));
    }

    #[test]
    fn usage_responses_api_field_names() {
        let response = json!({
            "usage": { "input_tokens": 10, "output_tokens": 20, "total_tokens": 30 }
        });
        let usage = extract_usage(&response);
        assert_eq!(usage.input, Some(10));
        assert_eq!(usage.output, Some(20));
    }

    #[test]
    fn usage_alternate_container_keys() {
        let a = json!({ "result_usage": { "input_tokens": 7 } });
        assert_eq!(extract_usage(&a).input, Some(7));

        let b = json!({ "usage_info": { "total_tokens": 9 } });
        assert_eq!(extract_usage(&b).total, Some(9));
    }

    #[test]
    fn usage_partial_fields_are_independent() {
        let response = json!({ "usage": { "completion_tokens": 5 } });
        let usage = extract_usage(&response);
        assert_eq!(usage.input, None);
        assert_eq!(usage.output, Some(5));
        assert_eq!(usage.total, None);
    }

    #[test]
    fn usage_non_integer_values_are_none() {
        let response = json!({ "usage": { "prompt_tokens": "lots" } });
        assert_eq!(extract_usage(&response).input, None);
    }

    // ── request / response shape ─────────────────────────────────────────

    #[test]
    fn request_body_layout() {
        let body = build_request_body(
            "gpt-5",
            "convert this page",
            &["data:image/png;base64,AAAA".to_string()],
        );
        assert_eq!(body["model"], "gpt-5");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        let content = body["messages"][1]["content"]
            .as_array()
            .expect("content parts");
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
    }

    #[test]
    fn request_body_skips_absent_images() {
        let body = build_request_body("gpt-5", "p", &[]);
        let content = body["messages"][1]["content"]
            .as_array()
            .expect("content parts");
        assert_eq!(content.len(), 1);
    }

    #[test]
    fn content_extraction() {
        let response = json!({
            "choices": [ { "message": { "content": "# Page\n" } } ]
        });
        assert_eq!(extract_content(&response).expect("content"), "# Page\n");

        let empty = json!({ "choices": [] });
        assert!(extract_content(&empty).is_err());
    }

    // ── azure url shape ──────────────────────────────────────────────────

    #[test]
    fn chat_urls() {
        let openai = ProviderSettings::OpenAi {
            api_key: "k".into(),
            base_url: "https://api.openai.com/v1".into(),
        };
        assert_eq!(
            openai.chat_url("gpt-5"),
            "https://api.openai.com/v1/chat/completions"
        );

        let azure = ProviderSettings::Azure {
            endpoint: "https://acme.openai.azure.com".into(),
            api_key: "k".into(),
            api_version: "preview".into(),
        };
        assert_eq!(
            azure.chat_url("my-deployment"),
            "https://acme.openai.azure.com/openai/deployments/my-deployment/chat/completions?api-version=preview"
        );
    }
}
