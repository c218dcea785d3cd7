//! arXiv metadata search: the first pipeline stage.

mod feed;
pub mod format;
pub mod urls;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use feed::parse_feed;
pub use format::{format_papers, format_search_error};

const API_URL: &str = "https://export.arxiv.org/api/query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ArxivError {
    #[error("invalid query URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("arXiv API returned status {0}")]
    Status(u16),

    #[error("could not parse arXiv feed: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("arXiv API error: {0}")]
    Api(String),
}

/// One search hit from the arXiv index.
#[derive(Debug, Clone, PartialEq)]
pub struct Paper {
    /// Canonical abs URL, e.g. `http://arxiv.org/abs/2005.11401v4`.
    pub entry_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub published: Option<String>,
    pub pdf_url: String,
}

/// Paper discovery by title/abstract relevance.
/// Implemented by `ArxivClient` for production; mock implementations used in tests.
pub trait PaperSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, ArxivError>;
}

#[derive(Clone, Debug)]
pub struct ArxivClient {
    http: Client,
    api_url: String,
}

impl ArxivClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_url: format!("{base_url}/api/query"),
        }
    }
}

impl PaperSearch for ArxivClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, ArxivError> {
        let url = url::Url::parse_with_params(
            &self.api_url,
            &[
                ("search_query", query),
                ("start", "0"),
                ("max_results", &max_results.to_string()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ],
        )?;

        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "arXiv API error");
            return Err(ArxivError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let papers = parse_feed(&body)?;
        debug!(count = papers.len(), "arXiv feed parsed");
        Ok(papers)
    }
}

/// Runs a search and renders it as the text blob the selection prompt consumes.
/// Never fails: errors are rendered into the returned text.
pub async fn search_as_text(search: &impl PaperSearch, query: &str, max_results: usize) -> String {
    info!(query = %query, max_results, "searching arXiv");
    match search.search(query, max_results).await {
        Ok(papers) => {
            info!(results = papers.len(), "arXiv search complete");
            for paper in &papers {
                debug!(
                    title = %paper.title,
                    authors = %paper.authors.join(", "),
                    published = paper.published.as_deref().unwrap_or("unknown"),
                    "candidate paper"
                );
            }
            format_papers(&papers)
        }
        Err(e) => {
            warn!(error = %e, "arXiv search failed");
            format_search_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSearch;

    impl PaperSearch for FailingSearch {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<Paper>, ArxivError> {
            Err(ArxivError::Status(503))
        }
    }

    struct EmptySearch;

    impl PaperSearch for EmptySearch {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<Paper>, ArxivError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn search_failure_becomes_text() {
        let text = search_as_text(&FailingSearch, "anything", 5).await;
        assert_eq!(
            text,
            "An error occurred while searching ArXiv: arXiv API returned status 503"
        );
    }

    #[tokio::test]
    async fn empty_search_reports_no_results() {
        let text = search_as_text(&EmptySearch, "anything", 5).await;
        assert_eq!(text, "No results found on ArXiv.");
    }
}
