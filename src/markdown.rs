/// Collapse line breaks so a value stays on its Markdown list line.
pub(crate) fn sanitize_line(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// The source section every report ends with.
pub(crate) fn citation_block(title: &str, url: &str) -> String {
    format!(
        "**Source:**\n- **Title:** {}\n- **URL:** {}",
        sanitize_line(title),
        sanitize_line(url)
    )
}

/// Appends the citation block unless the report already carries it verbatim.
/// Nothing is added when the title or URL is blank.
pub(crate) fn ensure_citation(report: String, title: &str, url: &str) -> String {
    if title.trim().is_empty() || url.trim().is_empty() {
        return report;
    }
    let block = citation_block(title, url);
    if report.contains(&block) {
        return report;
    }
    let body = report.trim_end();
    if body.is_empty() {
        block
    } else {
        format!("{body}\n\n{block}")
    }
}
