//! Atom feed decoding for the arXiv query API.

use serde::Deserialize;

use super::{ArxivError, Paper};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

/// arXiv reports query errors as a regular feed with a single entry whose id
/// points under `/api/errors`.
fn is_error_entry(entry: &Entry) -> bool {
    entry.id.contains("/api/errors")
}

pub(super) fn parse_feed(xml: &str) -> Result<Vec<Paper>, ArxivError> {
    let feed: Feed = quick_xml::de::from_str(xml)?;

    if let Some(err) = feed.entries.iter().find(|e| is_error_entry(e)) {
        return Err(ArxivError::Api(collapse_whitespace(&err.summary)));
    }

    Ok(feed.entries.into_iter().map(into_paper).collect())
}

fn into_paper(entry: Entry) -> Paper {
    let pdf_url = entry
        .links
        .iter()
        .find(|l| l.title.as_deref() == Some("pdf"))
        .map(|l| l.href.clone())
        .unwrap_or_else(|| entry.id.replacen("/abs/", "/pdf/", 1));

    Paper {
        title: collapse_whitespace(&entry.title),
        summary: collapse_whitespace(&entry.summary),
        authors: entry
            .authors
            .into_iter()
            .map(|a| collapse_whitespace(&a.name))
            .filter(|n| !n.is_empty())
            .collect(),
        published: entry.published,
        entry_id: entry.id,
        pdf_url,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <link href="http://arxiv.org/api/query?search_query%3Drag" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query: search_query=rag</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2024-05-01T00:00:00-04:00</updated>
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">2</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2005.11401v4</id>
    <updated>2021-04-12T15:42:15Z</updated>
    <published>2020-05-22T17:24:36Z</published>
    <title>Retrieval-Augmented Generation for
  Knowledge-Intensive NLP Tasks</title>
    <summary>  Large pre-trained language models have been shown to store factual
knowledge in their parameters &amp; achieve state-of-the-art results.
</summary>
    <author>
      <name>Patrick Lewis</name>
    </author>
    <author>
      <name>Ethan Perez</name>
    </author>
    <link title="doi" href="http://dx.doi.org/10.1000/xyz" rel="related"/>
    <arxiv:comment xmlns:arxiv="http://arxiv.org/schemas/atom">Accepted at NeurIPS 2020</arxiv:comment>
    <link href="http://arxiv.org/abs/2005.11401v4" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2005.11401v4" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2312.10997v5</id>
    <published>2023-12-18T07:47:33Z</published>
    <title>Retrieval-Augmented Generation for Large Language Models: A Survey</title>
    <summary>A survey of RAG.</summary>
    <author>
      <name>Yunfan Gao</name>
    </author>
    <link href="http://arxiv.org/abs/2312.10997v5" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_with_collapsed_whitespace() {
        let papers = parse_feed(SAMPLE_FEED).unwrap();

        assert_eq!(papers.len(), 2);
        let first = &papers[0];
        assert_eq!(
            first.title,
            "Retrieval-Augmented Generation for Knowledge-Intensive NLP Tasks"
        );
        assert_eq!(first.entry_id, "http://arxiv.org/abs/2005.11401v4");
        assert!(first.summary.starts_with("Large pre-trained language models"));
        assert!(first.summary.contains("parameters & achieve"));
        assert_eq!(first.authors, vec!["Patrick Lewis", "Ethan Perez"]);
        assert_eq!(first.published.as_deref(), Some("2020-05-22T17:24:36Z"));
    }

    #[test]
    fn pdf_link_is_preferred_over_doi_link() {
        let papers = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(papers[0].pdf_url, "http://arxiv.org/pdf/2005.11401v4");
    }

    #[test]
    fn missing_pdf_link_is_derived_from_abs_id() {
        let papers = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(papers[1].pdf_url, "http://arxiv.org/pdf/2312.10997v5");
    }

    #[test]
    fn empty_feed_yields_no_papers() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: nothing</title>
  <id>http://arxiv.org/api/empty</id>
</feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn error_entry_becomes_api_error() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
    <title>Error</title>
    <summary>incorrect id format for 1234</summary>
    <link href="http://arxiv.org/api/errors#incorrect_id_format_for_1234" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;
        match parse_feed(xml) {
            Err(ArxivError::Api(msg)) => assert_eq!(msg, "incorrect id format for 1234"),
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        assert!(matches!(
            parse_feed("<feed><entry><id>x</entry>"),
            Err(ArxivError::Parse(_))
        ));
    }
}
