//! Semantic chunking: sentence boundaries where the embedding distance between
//! neighbouring sentence windows exceeds a percentile threshold.

mod sentences;

use tracing::debug;

use crate::gemini::{Embedder, GeminiError};
pub use sentences::split_sentences;
use sentences::combine_with_neighbours;

pub const DEFAULT_BREAKPOINT_PERCENTILE: f64 = 95.0;
pub const DEFAULT_BUFFER_SIZE: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("embedding sentences failed: {0}")]
    Embedding(#[from] GeminiError),

    #[error("sentence embeddings have mismatched dimensions ({0} vs {1})")]
    DimensionMismatch(usize, usize),
}

#[derive(Debug, Clone, Copy)]
pub struct SemanticChunker {
    buffer_size: usize,
    breakpoint_percentile: f64,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_BREAKPOINT_PERCENTILE)
    }
}

impl SemanticChunker {
    pub fn new(buffer_size: usize, breakpoint_percentile: f64) -> Self {
        Self {
            buffer_size,
            breakpoint_percentile: breakpoint_percentile.clamp(0.0, 100.0),
        }
    }

    pub async fn split(
        &self,
        text: &str,
        embedder: &impl Embedder,
    ) -> Result<Vec<String>, ChunkError> {
        let sentences = split_sentences(text);
        if sentences.len() <= 1 {
            return Ok(sentences.into_iter().map(str::to_string).collect());
        }

        let windows = combine_with_neighbours(&sentences, self.buffer_size);
        let embeddings = embedder.embed_documents(&windows).await?;

        let distances = embeddings
            .windows(2)
            .map(|pair| cosine_distance(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        let threshold = percentile(&distances, self.breakpoint_percentile);
        let breakpoints: Vec<usize> = distances
            .iter()
            .enumerate()
            .filter(|(_, d)| **d > threshold)
            .map(|(i, _)| i)
            .collect();

        debug!(
            sentences = sentences.len(),
            breakpoints = breakpoints.len(),
            threshold,
            "semantic split"
        );

        let mut chunks = Vec::with_capacity(breakpoints.len() + 1);
        let mut start = 0;
        for bp in breakpoints {
            chunks.push(sentences[start..=bp].join(" "));
            start = bp + 1;
        }
        if start < sentences.len() {
            chunks.push(sentences[start..].join(" "));
        }
        Ok(chunks)
    }
}

/// `1 - cos(a, b)`. A zero vector has similarity 0 with everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64, ChunkError> {
    if a.len() != b.len() {
        return Err(ChunkError::DimensionMismatch(a.len(), b.len()));
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Ok(1.0);
    }
    Ok(1.0 - dot / (na.sqrt() * nb.sqrt()))
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Two-dimensional "topic" embedding: occurrences of `cat` and `bond`.
    struct TopicEmbedder {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl TopicEmbedder {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Embedder for TopicEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GeminiError> {
            self.calls.lock().unwrap().push(texts.to_vec());
            Ok(texts
                .iter()
                .map(|t| vec![t.matches("cat").count() as f32, t.matches("bond").count() as f32])
                .collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, GeminiError> {
            unreachable!("chunker never embeds queries")
        }
    }

    const TWO_TOPICS: &str = "The cat sleeps. A cat purrs. Every cat hunts. \
        The bond yields. A bond matures. Every bond trades.";

    #[tokio::test]
    async fn splits_at_topic_shift() {
        let embedder = TopicEmbedder::new();
        let chunks = SemanticChunker::default()
            .split(TWO_TOPICS, &embedder)
            .await
            .unwrap();

        assert_eq!(
            chunks,
            vec![
                "The cat sleeps. A cat purrs. Every cat hunts.",
                "The bond yields. A bond matures. Every bond trades.",
            ]
        );
    }

    #[tokio::test]
    async fn embeds_buffered_windows() {
        let embedder = TopicEmbedder::new();
        SemanticChunker::default()
            .split("A cat. A bond. A cat.", &embedder)
            .await
            .unwrap();

        let calls = embedder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["A cat. A bond.", "A cat. A bond. A cat.", "A bond. A cat."]);
    }

    #[tokio::test]
    async fn single_sentence_skips_embedding() {
        let embedder = TopicEmbedder::new();
        let chunks = SemanticChunker::default()
            .split("Just one sentence without a break", &embedder)
            .await
            .unwrap();

        assert_eq!(chunks, vec!["Just one sentence without a break"]);
        assert!(embedder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_text_has_no_chunks() {
        let embedder = TopicEmbedder::new();
        let chunks = SemanticChunker::default().split("", &embedder).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn chunks_preserve_every_sentence_in_order() {
        let embedder = TopicEmbedder::new();
        let text = "A cat. A bond. A cat. A bond. A cat.";
        let chunks = SemanticChunker::new(1, 50.0)
            .split(text, &embedder)
            .await
            .unwrap();

        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [0.0, 0.1, 0.2, 0.1, 0.0];
        assert!((percentile(&values, 50.0) - 0.1).abs() < 1e-12);
        assert!((percentile(&values, 100.0) - 0.2).abs() < 1e-12);
        assert!((percentile(&values, 95.0) - 0.18).abs() < 1e-12);
        assert_eq!(percentile(&[0.4], 95.0), 0.4);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn cosine_distance_basics() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).unwrap().abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 1.0);
        assert!(matches!(
            cosine_distance(&[1.0], &[1.0, 0.0]),
            Err(ChunkError::DimensionMismatch(1, 2))
        ));
    }
}
