//! arXiv URL helpers: abs→pdf rewriting and identifier extraction.

const ARXIV_HOSTS: &[&str] = &["arxiv.org", "www.arxiv.org", "export.arxiv.org"];
const MAX_NAMESPACE_LEN: usize = 64;

fn parse_arxiv(raw: &str) -> Option<url::Url> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    ARXIV_HOSTS.contains(&host.as_str()).then_some(parsed)
}

/// Rewrites arXiv abstract pages to their PDF and upgrades them to HTTPS.
/// Non-arXiv URLs are returned unchanged.
pub fn document_url(raw: &str) -> String {
    let Some(mut parsed) = parse_arxiv(raw) else {
        return raw.to_string();
    };

    let pdf_path = parsed
        .path()
        .strip_prefix("/abs/")
        .map(|rest| format!("/pdf/{rest}"));
    if let Some(pdf_path) = pdf_path {
        parsed.set_path(&pdf_path);
    }
    if parsed.scheme() == "http" {
        let _ = parsed.set_scheme("https");
    }
    parsed.to_string()
}

/// `http://arxiv.org/pdf/2005.11401v4.pdf` → `2005.11401v4`.
pub fn arxiv_id(raw: &str) -> Option<String> {
    let parsed = parse_arxiv(raw)?;
    let path = parsed.path();
    let id = path
        .strip_prefix("/abs/")
        .or_else(|| path.strip_prefix("/pdf/"))?;
    let id = id.trim_end_matches('/').trim_end_matches(".pdf");
    (!id.is_empty()).then(|| id.to_string())
}

/// Vector-store namespace for a document: the arXiv id when there is one,
/// otherwise the URL reduced to `[A-Za-z0-9._-]`.
pub fn namespace_for(raw: &str) -> String {
    if let Some(id) = arxiv_id(raw) {
        return id.replace('/', "-");
    }

    let stripped = raw
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut ns: String = stripped
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    ns.truncate(MAX_NAMESPACE_LEN);
    let ns = ns.trim_matches('-').to_string();
    if ns.is_empty() {
        "default".to_string()
    } else {
        ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_url_becomes_https_pdf() {
        assert_eq!(
            document_url("http://arxiv.org/abs/2307.09288v2"),
            "https://arxiv.org/pdf/2307.09288v2"
        );
    }

    #[test]
    fn pdf_url_is_only_upgraded() {
        assert_eq!(
            document_url("http://arxiv.org/pdf/2307.09288"),
            "https://arxiv.org/pdf/2307.09288"
        );
    }

    #[test]
    fn foreign_urls_are_untouched() {
        let url = "http://example.com/abs/paper.pdf";
        assert_eq!(document_url(url), url);
        assert_eq!(document_url("URL not found"), "URL not found");
    }

    #[test]
    fn extracts_ids_from_abs_and_pdf() {
        assert_eq!(
            arxiv_id("http://arxiv.org/abs/2005.11401v4").as_deref(),
            Some("2005.11401v4")
        );
        assert_eq!(
            arxiv_id("https://arxiv.org/pdf/2005.11401v4.pdf").as_deref(),
            Some("2005.11401v4")
        );
        assert_eq!(
            arxiv_id("https://arxiv.org/abs/hep-th/9901001").as_deref(),
            Some("hep-th/9901001")
        );
        assert!(arxiv_id("https://example.com/abs/1").is_none());
    }

    #[test]
    fn namespace_prefers_arxiv_id() {
        assert_eq!(namespace_for("http://arxiv.org/pdf/2005.11401v4"), "2005.11401v4");
        assert_eq!(
            namespace_for("https://arxiv.org/abs/hep-th/9901001"),
            "hep-th-9901001"
        );
    }

    #[test]
    fn namespace_sanitizes_other_urls() {
        assert_eq!(
            namespace_for("https://example.com/papers/a b?.pdf"),
            "example.com-papers-a-b-.pdf"
        );
        assert_eq!(namespace_for("://"), "default");
        assert!(namespace_for(&format!("https://x.org/{}", "a".repeat(200))).len() <= 64);
    }
}
