use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ai::{AiCapability, GroundingResult, SourceCitation};
use crate::error::AiError;

const PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct GeminiClientConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl GeminiClientConfig {
    /// Required:
    /// - `GOOGLE_API_KEY`
    ///
    /// Optional:
    /// - `GEMINI_MODEL` (default: "gemini-2.0-flash")
    /// - `GEMINI_BASE_URL`, `GEMINI_TIMEOUT_SECS`, `GEMINI_MAX_RETRIES`,
    ///   `GEMINI_RETRY_INITIAL_MS`, `GEMINI_RETRY_MAX_MS`, `GEMINI_MAX_ERROR_BODY_BYTES`
    pub fn from_env() -> Result<Self, AiError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` passes the process environment.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, AiError> {
        let api_key = var("GOOGLE_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AiError::Config("GOOGLE_API_KEY environment variable is required".to_string())
            })?;

        let model =
            var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string());

        let base_url = var("GEMINI_BASE_URL").unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });

        let default_timeout = var("GEMINI_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let max_retries = var("GEMINI_MAX_RETRIES")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let initial_backoff = var("GEMINI_RETRY_INITIAL_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = var("GEMINI_RETRY_MAX_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = var("GEMINI_MAX_ERROR_BODY_BYTES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        })
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiClientConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .user_agent("shop-search/gemini")
            .build()?;
        info!(model = %config.model, "gemini client initialized");
        Ok(Self { config, http })
    }

    pub async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AiError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        self.request_with_retry(|| {
            let req = request.clone();
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .post(&url)
                    .header("x-goog-api-key", &self.config.api_key)
                    .timeout(self.config.default_timeout)
                    .json(&req)
                    .send()
                    .await?;
                Self::parse_json_response(resp, self.config.max_error_body_bytes).await
            }
        })
        .await
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, AiError> {
        if resp.status().is_success() {
            let json = resp.json::<T>().await?;
            return Ok(json);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> AiError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        upstream_error(status, body)
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "gemini request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl AiCapability for GeminiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn grounding_search(&self, prompt: &str) -> Result<GroundingResult, AiError> {
        info!(prompt_chars = prompt.chars().count(), model = %self.config.model, "grounding search");
        debug!(prompt = %preview(prompt), "grounding search prompt");

        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            tools: Some(vec![Tool {
                google_search: GoogleSearch {},
            }]),
            generation_config: None,
        };

        let response = self
            .generate_content(request)
            .await
            .inspect_err(|e| error!(error = %e, "grounding search failed"))?;
        response.log_metadata("grounding search");
        let result = response.into_grounding_result()?;

        info!(
            response_chars = result.text.chars().count(),
            sources = result.sources.len(),
            "grounding search completed"
        );
        debug!(response = %preview(&result.text), "grounding search response");
        Ok(result)
    }

    async fn generate_json(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String, AiError> {
        debug!(prompt = %preview(prompt), "structured prompt");

        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            tools: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_json_schema: schema,
            }),
        };

        let response = self
            .generate_content(request)
            .await
            .inspect_err(|e| error!(error = %e, "structured generation failed"))?;
        response.log_metadata("structured generation");
        let text = response.text().ok_or(AiError::EmptyResponse)?;
        debug!(raw_json = %preview(&text), "structured response");
        Ok(text)
    }
}

/// Decode a non-success reply, preferring Google's `{"error": {...}}` envelope.
fn upstream_error(status: StatusCode, body: String) -> AiError {
    match serde_json::from_str::<GoogleErrorEnvelope>(&body) {
        Ok(parsed) => AiError::Upstream {
            status,
            message: parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string()),
        },
        Err(_) => AiError::UpstreamBody { status, body },
    }
}

fn should_retry(err: &AiError) -> bool {
    match err {
        AiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        AiError::Upstream { status, .. } | AiError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        AiError::EmptyResponse
        | AiError::Validation { .. }
        | AiError::Config(_) => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(b) => {
            let end = b.len().min(max_bytes);
            String::from_utf8_lossy(&b[..end]).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorObject,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorObject {
    message: Option<String>,
    #[allow(dead_code)]
    code: Option<i64>,
    #[allow(dead_code)]
    status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_json_schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    pub web_search_queries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u64>,
    pub candidates_token_count: Option<u64>,
    pub total_token_count: Option<u64>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn sources(&self) -> Vec<SourceCitation> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        web.uri.as_ref().map(|uri| SourceCitation {
                            url: uri.clone(),
                            title: web.title.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn web_search_queries(&self) -> &[String] {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| meta.web_search_queries.as_slice())
            .unwrap_or_default()
    }

    fn log_metadata(&self, call: &str) {
        let finish_reason = self
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("unknown");
        let usage = self.usage_metadata.as_ref();
        info!(
            call,
            finish_reason,
            prompt_tokens = usage.and_then(|u| u.prompt_token_count),
            candidates_tokens = usage.and_then(|u| u.candidates_token_count),
            total_tokens = usage.and_then(|u| u.total_token_count),
            web_search_queries = ?self.web_search_queries(),
            "gemini response metadata"
        );
    }

    fn into_grounding_result(self) -> Result<GroundingResult, AiError> {
        let text = self.text().ok_or(AiError::EmptyResponse)?;
        Ok(GroundingResult {
            text,
            sources: self.sources(),
        })
    }
}
