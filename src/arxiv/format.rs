use std::fmt::Display;

use super::Paper;

pub const NO_RESULTS: &str = "No results found on ArXiv.";
const RECORD_SEPARATOR: &str = "\n\n---\n\n";

pub fn format_papers(papers: &[Paper]) -> String {
    if papers.is_empty() {
        return NO_RESULTS.to_string();
    }

    papers
        .iter()
        .map(|p| {
            format!(
                "Title: {}\nID: {}\nAbstract: {}\nPDF URL: {}",
                p.title, p.entry_id, p.summary, p.pdf_url
            )
        })
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR)
}

pub fn format_search_error(err: &impl Display) -> String {
    format!("An error occurred while searching ArXiv: {err}")
}
