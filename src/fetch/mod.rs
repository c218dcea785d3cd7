//! Paper retrieval: guarded download into a transient file, then text loading
//! by document kind (PDF, HTML, plain text).

mod extractor;
mod guard;
pub mod transient;

use std::path::PathBuf;

use encoding_rs::{Encoding, UTF_8};
use reqwest::Client;
use tracing::{debug, info, warn};

pub(crate) use guard::{DnsResolver, TokioDnsResolver};
use guard::{check_url, redact_credentials};
use transient::TransientFile;

const MAX_DOCUMENT_BYTES: usize = 50_000_000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked: internal/private host not allowed")]
    InternalHost,

    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("download failed: status {0}")]
    Status(u16),

    #[error("document too large (>{} bytes)", MAX_DOCUMENT_BYTES)]
    TooLarge,

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("transient file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("document contains no extractable text")]
    EmptyDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Html,
    Text,
}

impl DocumentKind {
    fn suffix(self) -> &'static str {
        match self {
            DocumentKind::Pdf => ".pdf",
            DocumentKind::Html => ".html",
            DocumentKind::Text => ".txt",
        }
    }

    /// Magic bytes win over the declared type: arXiv mirrors sometimes serve
    /// PDFs as `application/octet-stream`.
    fn detect(content_type: Option<&str>, body: &[u8]) -> Result<Self, FetchError> {
        if body.starts_with(b"%PDF-") {
            return Ok(DocumentKind::Pdf);
        }
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        match mime.as_str() {
            "application/pdf" => Ok(DocumentKind::Pdf),
            "text/html" | "application/xhtml+xml" => Ok(DocumentKind::Html),
            "text/plain" | "text/markdown" => Ok(DocumentKind::Text),
            "" => Err(FetchError::UnsupportedContentType("(none)".to_string())),
            other => Err(FetchError::UnsupportedContentType(other.to_string())),
        }
    }
}

fn charset_of(content_type: Option<&str>) -> Option<String> {
    content_type?
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
}

fn decode(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|c| Encoding::for_label(c.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = encoding.name(), "document contained undecodable bytes");
    }
    text.into_owned()
}

/// A downloaded paper held in a transient file.
#[derive(Debug)]
pub struct Document {
    pub url: String,
    pub kind: DocumentKind,
    charset: Option<String>,
    file: TransientFile,
}

impl Document {
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    /// Extracts the document's text. PDF pages are joined with newlines.
    pub async fn load_text(&self) -> Result<String, FetchError> {
        let text = match self.kind {
            DocumentKind::Pdf => {
                let path = self.file.path().to_path_buf();
                let pages = tokio::task::spawn_blocking(move || {
                    pdf_extract::extract_text_by_pages(&path).map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| FetchError::Pdf(format!("extractor aborted: {e}")))?
                .map_err(FetchError::Pdf)?;
                debug!(pages = pages.len(), "extracted PDF text");
                pages.join("\n")
            }
            DocumentKind::Html => {
                let bytes = tokio::fs::read(self.file.path()).await?;
                let html = decode(&bytes, self.charset.as_deref());
                extractor::html_to_text(&html, Some(&self.url))
            }
            DocumentKind::Text => {
                let bytes = tokio::fs::read(self.file.path()).await?;
                decode(&bytes, self.charset.as_deref())
            }
        };

        if text.trim().is_empty() {
            return Err(FetchError::EmptyDocument);
        }
        Ok(text)
    }

    pub fn discard(self) -> Result<(), FetchError> {
        Ok(self.file.remove()?)
    }
}

/// Downloads papers into `work_dir`.
#[derive(Clone, Debug)]
pub struct Fetcher {
    http: Client,
    work_dir: PathBuf,
    allow_private_hosts: bool,
}

impl Fetcher {
    pub fn new(http: Client, work_dir: PathBuf, allow_private_hosts: bool) -> Self {
        Self {
            http,
            work_dir,
            allow_private_hosts,
        }
    }

    pub async fn download(
        &self,
        url: &str,
        resolver: &impl DnsResolver,
    ) -> Result<Document, FetchError> {
        check_url(url, self.allow_private_hosts, resolver).await?;

        let fetched = fetch_bytes(&self.http, url).await?;

        // Redirects may land somewhere the original URL would not have been allowed.
        if fetched.final_url != url {
            check_url(&fetched.final_url, self.allow_private_hosts, resolver).await?;
        }

        let kind = DocumentKind::detect(fetched.content_type.as_deref(), &fetched.body)?;
        let charset = charset_of(fetched.content_type.as_deref());

        let dir = self.work_dir.clone();
        let body = fetched.body;
        let file = tokio::task::spawn_blocking(move || {
            TransientFile::create(&dir, kind.suffix(), &body)
        })
        .await
        .map_err(|e| FetchError::Io(std::io::Error::other(e)))??;

        info!(
            url = %redact_credentials(&fetched.final_url),
            ?kind,
            "document downloaded"
        );
        Ok(Document {
            url: fetched.final_url,
            kind,
            charset,
            file,
        })
    }
}

struct Fetched {
    final_url: String,
    content_type: Option<String>,
    body: Vec<u8>,
}

async fn fetch_bytes(client: &Client, url: &str) -> Result<Fetched, FetchError> {
    let response = client
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(len) = response.content_length()
        && len as usize > MAX_DOCUMENT_BYTES
    {
        return Err(FetchError::TooLarge);
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_DOCUMENT_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    debug!(bytes = body.len(), "download complete");
    Ok(Fetched {
        final_url,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_by_magic_bytes() {
        assert_eq!(
            DocumentKind::detect(Some("application/octet-stream"), b"%PDF-1.5\n...").unwrap(),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn detects_kind_from_content_type() {
        assert_eq!(
            DocumentKind::detect(Some("application/pdf"), b"").unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::detect(Some("text/html; charset=utf-8"), b"<html>").unwrap(),
            DocumentKind::Html
        );
        assert_eq!(
            DocumentKind::detect(Some("Text/Plain"), b"words").unwrap(),
            DocumentKind::Text
        );
    }

    #[test]
    fn rejects_unknown_content_types() {
        assert!(matches!(
            DocumentKind::detect(Some("image/png"), b"\x89PNG"),
            Err(FetchError::UnsupportedContentType(t)) if t == "image/png"
        ));
        assert!(matches!(
            DocumentKind::detect(None, b"???"),
            Err(FetchError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn parses_charset_parameter() {
        assert_eq!(
            charset_of(Some("text/plain; charset=\"ISO-8859-1\"")).as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(charset_of(Some("text/plain")), None);
        assert_eq!(charset_of(None), None);
    }

    #[test]
    fn decodes_latin1() {
        assert_eq!(decode(b"na\xefve", Some("iso-8859-1")), "naïve");
        assert_eq!(decode("naïve".as_bytes(), None), "naïve");
    }
}
