use dom_smoothie::{Config, Readability};
use tracing::warn;

/// Converts an HTML paper page (arXiv HTML rendering, a journal landing page)
/// to Markdown text. Readability isolates the article body; pages it does not
/// consider readable are converted whole.
pub(super) fn html_to_text(html: &str, url: Option<&str>) -> String {
    let body = readable_body(html, url).unwrap_or_else(|| html.to_string());
    html2md::rewrite_html(&body, false)
}

fn readable_body(html: &str, url: Option<&str>) -> Option<String> {
    let mut readability = match Readability::new(html, url, Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "readability init failed, converting whole page");
            return None;
        }
    };

    if !readability.is_probably_readable() {
        return None;
    }

    match readability.parse() {
        Ok(article) => Some(article.content.to_string()),
        Err(e) => {
            warn!(%e, "readability parse failed, converting whole page");
            None
        }
    }
}
