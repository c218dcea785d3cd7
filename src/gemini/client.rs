use std::env;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::response::{extract_embeddings, extract_text};
use super::types::{
    ApiError, BatchEmbedRequest, BatchEmbedResponse, Content, EmbedContentRequest,
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, TaskType,
};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Upper bound on `requests` per `batchEmbedContents` call.
const MAX_EMBED_BATCH: usize = 100;
const EMBED_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey")]
    ApiKeyNotSet,

    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("expected {expected} embeddings, got {got}")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Single-prompt text generation.
/// Implemented by `GeminiClient` for production; mock implementations used in tests.
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeminiError>;
}

/// Text embedding for retrieval. Documents and queries use different task types.
pub trait Embedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GeminiError>;
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GeminiError>;
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

trait ApiResponse {
    fn api_error(&self) -> Option<&ApiError>;
}

impl ApiResponse for GenerateContentResponse {
    fn api_error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }
}

impl ApiResponse for BatchEmbedResponse {
    fn api_error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }
}

#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    embedding_model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl GeminiClient {
    pub fn from_env(http: Client) -> Result<Self, GeminiError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| GeminiError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(GeminiError::ApiKeyNotSet);
        }
        let model = env_or("GEMINI_MODEL", DEFAULT_MODEL);
        let embedding_model = env_or("GEMINI_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL);
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model: strip_models_prefix(&model).to_string(),
            embedding_model: strip_models_prefix(&embedding_model).to_string(),
            base_url: API_BASE.to_string(),
            temperature: None,
        }
        .with_temperature(env_temperature()))
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: base_url.to_string(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post<Req, Resp>(&self, model: &str, method: &str, body: &Req) -> Result<Resp, GeminiError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + ApiResponse,
    {
        let url = format!("{}/{model}:{method}", self.base_url);

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(method, "Gemini API rate limited");
            return Err(GeminiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<Resp>(&text)
                && let Some(err) = body.api_error()
            {
                let classified = classify_api_error(err);
                warn!(error = %classified, method, "Gemini API error");
                return Err(classified);
            }
            let snippet: String = text.chars().take(200).collect();
            warn!(status = %status, method, "Gemini API error (no structured body)");
            return Err(GeminiError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: Resp = response.json().await?;

        if let Some(err) = body.api_error() {
            let classified = classify_api_error(err);
            warn!(error = %classified, method, "Gemini API error in 200 response");
            return Err(classified);
        }

        Ok(body)
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>, GeminiError> {
        let model_path = format!("models/{}", self.embedding_model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| EmbedContentRequest {
                    model: model_path.clone(),
                    content: Content::user_text(t),
                    task_type,
                })
                .collect(),
        };

        let response: BatchEmbedResponse = with_retry(|| {
            self.post(&self.embedding_model, "batchEmbedContents", &request)
        })
        .await?;

        let embeddings = extract_embeddings(response);
        if embeddings.len() != texts.len() {
            return Err(GeminiError::EmbeddingCount {
                expected: texts.len(),
                got: embeddings.len(),
            });
        }
        debug!(count = embeddings.len(), ?task_type, "embedded batch");
        Ok(embeddings)
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: self
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        };

        let response: GenerateContentResponse =
            with_retry(|| self.post(&self.model, "generateContent", &request)).await?;
        debug!(model = %self.model, "gemini generation complete");

        // A filtered or truncated reply is empty text, not an error.
        Ok(extract_text(&response).unwrap_or_default())
    }
}

impl Embedder for GeminiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GeminiError> {
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(MAX_EMBED_BATCH))
            .map(|batch| self.embed_batch(batch, TaskType::RetrievalDocument))
            .buffered(EMBED_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, GeminiError> {
        let mut embeddings = self
            .embed_batch(&[text.to_string()], TaskType::RetrievalQuery)
            .await?;
        embeddings.pop().ok_or(GeminiError::EmbeddingCount {
            expected: 1,
            got: 0,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// `GEMINI_TEMPERATURE`, when set to a number in `0.0..=2.0`.
fn env_temperature() -> Option<f32> {
    let raw = env::var("GEMINI_TEMPERATURE").ok()?;
    match raw.trim().parse::<f32>() {
        Ok(t) if (0.0..=2.0).contains(&t) => Some(t),
        _ => {
            warn!(value = %raw, "ignoring invalid GEMINI_TEMPERATURE");
            None
        }
    }
}

fn strip_models_prefix(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

async fn with_retry<T, F, Fut>(op: F) -> Result<T, GeminiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GeminiError>>,
{
    let mut last_err = None;
    for attempt in 0..MAX_RETRIES {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retriable(&e) => {
                last_err = Some(e);
                if attempt + 1 < MAX_RETRIES {
                    let delay_ms = jittered_backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms, "retrying after transient error"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or(GeminiError::RateLimited))
}

fn is_retriable(e: &GeminiError) -> bool {
    matches!(
        e,
        GeminiError::RateLimited
            | GeminiError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_api_error(err: &ApiError) -> GeminiError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match err.code {
        Some(429) => GeminiError::RateLimited,
        Some(403) => GeminiError::QuotaExhausted(message),
        Some(code) => GeminiError::Api { code, message },
        None => GeminiError::Api {
            code: 0,
            message: format!("Unknown error (no status code): {message}"),
        },
    }
}
