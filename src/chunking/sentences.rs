use std::sync::LazyLock;

use regex::Regex;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!]\s+").expect("sentence boundary pattern is valid"));

/// Splits after `.`, `?` or `!` when followed by whitespace. The punctuation
/// stays with its sentence; the whitespace is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // punctuation is one ASCII byte
        let end = m.start() + 1;
        sentences.push(&text[start..end]);
        start = m.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Each sentence joined with up to `buffer` neighbours on either side.
pub fn combine_with_neighbours(sentences: &[&str], buffer: usize) -> Vec<String> {
    (0..sentences.len())
        .map(|i| {
            let lo = i.saturating_sub(buffer);
            let hi = (i + buffer + 1).min(sentences.len());
            sentences[lo..hi].join(" ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        assert_eq!(
            split_sentences("RAG retrieves passages. Does it help? Yes!  It does."),
            vec!["RAG retrieves passages.", "Does it help?", "Yes!", "It does."]
        );
    }

    #[test]
    fn decimal_points_do_not_split() {
        assert_eq!(
            split_sentences("Accuracy rose to 91.4 percent. Recall too."),
            vec!["Accuracy rose to 91.4 percent.", "Recall too."]
        );
    }

    #[test]
    fn newlines_count_as_whitespace() {
        assert_eq!(
            split_sentences("First line.\nSecond line"),
            vec!["First line.", "Second line"]
        );
    }

    #[test]
    fn trailing_whitespace_after_last_sentence_is_dropped() {
        assert_eq!(split_sentences("Only one. "), vec!["Only one."]);
    }

    #[test]
    fn text_without_punctuation_is_one_sentence() {
        assert_eq!(split_sentences("no punctuation here"), vec!["no punctuation here"]);
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn combines_one_neighbour_each_side() {
        let combined = combine_with_neighbours(&["A.", "B.", "C.", "D."], 1);
        assert_eq!(combined, vec!["A. B.", "A. B. C.", "B. C. D.", "C. D."]);
    }

    #[test]
    fn zero_buffer_is_identity() {
        let combined = combine_with_neighbours(&["A.", "B."], 0);
        assert_eq!(combined, vec!["A.", "B."]);
    }
}
