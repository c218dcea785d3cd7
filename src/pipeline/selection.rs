use std::sync::LazyLock;

use regex::Regex;

pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const URL_NOT_FOUND: &str = "URL not found";

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub title: String,
    pub url: String,
}

/// Reads the selector's `Title: <t> | URL: <u>` line.
///
/// Anything other than exactly two ` | `-separated parts falls back to
/// [`TITLE_NOT_FOUND`] and the first URL in the text (or [`URL_NOT_FOUND`]).
pub fn parse_selection(response: &str) -> Selection {
    let text = response.trim();
    let parts: Vec<&str> = text.split(" | ").collect();
    if let [title, url] = parts.as_slice() {
        return Selection {
            title: title.replace("Title: ", "").trim().to_string(),
            url: url.replace("URL: ", "").trim().to_string(),
        };
    }

    let url = URL_PATTERN
        .find(text)
        .map_or_else(|| URL_NOT_FOUND.to_string(), |m| m.as_str().to_string());
    Selection {
        title: TITLE_NOT_FOUND.to_string(),
        url,
    }
}
