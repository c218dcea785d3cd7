use std::env;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{ScoredPassage, VectorRecord, VectorStore, VectorStoreError};

const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Records per upsert request; keeps request bodies well under the 2 MB limit
/// for 768-dimensional vectors with passage text.
const UPSERT_BATCH: usize = 100;

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<MatchMetadata>,
}

/// Read side of the stored metadata; vectors written by other tools may lack `text`.
#[derive(Debug, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: Option<String>,
}

/// Pinecone data-plane client bound to one index.
///
/// The index host is taken from `PINECONE_INDEX_HOST` when set; otherwise it is
/// looked up once through the control plane (`GET /indexes/{name}`).
#[derive(Debug)]
pub struct PineconeClient {
    http: Client,
    api_key: ApiKey,
    index_name: String,
    control_url: String,
    host: OnceCell<String>,
}

impl PineconeClient {
    pub fn from_env(http: Client, index_name: &str) -> Result<Self, VectorStoreError> {
        let api_key = env::var("PINECONE_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(VectorStoreError::ApiKeyNotSet)?;
        let host = env::var("PINECONE_INDEX_HOST")
            .ok()
            .map(|h| normalize_host(&h))
            .filter(|h| !h.is_empty());

        Ok(Self {
            http,
            api_key: ApiKey(api_key),
            index_name: index_name.to_string(),
            control_url: CONTROL_PLANE.to_string(),
            host: OnceCell::new_with(host),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, index_name: &str, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            index_name: index_name.to_string(),
            control_url: base_url.to_string(),
            host: OnceCell::new_with(Some(base_url.to_string())),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_control_plane(http: Client, index_name: &str, control_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            index_name: index_name.to_string(),
            control_url: control_url.to_string(),
            host: OnceCell::new(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("Api-Key", &self.api_key.0)
            .header("X-Pinecone-API-Version", API_VERSION)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
    }

    async fn host(&self) -> Result<&str, VectorStoreError> {
        self.host
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", self.control_url, self.index_name);
                let response = self.authed(self.http.get(&url)).send().await?;
                let response = check_status(response, &self.index_name).await?;
                let desc: IndexDescription = response.json().await?;
                let host = normalize_host(&desc.host);
                info!(index = %self.index_name, host = %host, "resolved Pinecone index host");
                Ok::<_, VectorStoreError>(host)
            })
            .await
            .map(String::as_str)
    }
}

fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

async fn check_status(response: Response, index_name: &str) -> Result<Response, VectorStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 | 403 => Err(VectorStoreError::Unauthorized),
        404 => Err(VectorStoreError::IndexNotFound(index_name.to_string())),
        code => {
            let text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&text);
            warn!(code, %message, "Pinecone API error");
            Err(VectorStoreError::Api { code, message })
        }
    }
}

/// Pinecone errors come as `{"message": ..}` or `{"error": {"message": ..}}`.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error").and_then(|e| e.get("message")))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

impl VectorStore for PineconeClient {
    async fn upsert(
        &self,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<usize, VectorStoreError> {
        let host = self.host().await?;
        let url = format!("{host}/vectors/upsert");

        let mut total = 0;
        for batch in records.chunks(UPSERT_BATCH) {
            let body = UpsertRequest {
                vectors: batch,
                namespace,
            };
            let response = self.authed(self.http.post(&url)).json(&body).send().await?;
            let response = check_status(response, &self.index_name).await?;
            let parsed: UpsertResponse = response.json().await?;
            total += parsed.upserted_count;
        }

        debug!(namespace, upserted = total, "upsert complete");
        Ok(total)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, VectorStoreError> {
        let host = self.host().await?;
        let body = QueryRequest {
            vector,
            top_k,
            namespace,
            include_metadata: true,
            include_values: false,
        };

        let response = self
            .authed(self.http.post(format!("{host}/query")))
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, &self.index_name).await?;
        let parsed: QueryResponse = response.json().await?;

        let passages: Vec<ScoredPassage> = parsed
            .matches
            .into_iter()
            .filter_map(|m| match m.metadata.and_then(|meta| meta.text) {
                Some(text) if !text.trim().is_empty() => Some(ScoredPassage {
                    id: m.id,
                    score: m.score,
                    text,
                }),
                _ => {
                    warn!(id = %m.id, "match without passage text skipped");
                    None
                }
            })
            .collect();

        debug!(namespace, matches = passages.len(), "query complete");
        Ok(passages)
    }
}
