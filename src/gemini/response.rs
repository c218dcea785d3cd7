use tracing::warn;

use super::types::{BatchEmbedResponse, GenerateContentResponse};

/// Concatenates the text parts of the first candidate.
/// Returns `None` when the model produced no text (safety filter, empty candidate list).
pub fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.as_ref().and_then(|c| c.first());

    let text = candidate
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty());

    if text.is_none() {
        let reason = candidate
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("none");
        warn!(finish_reason = reason, "Gemini returned no text");
    }

    text
}

/// Pulls the embedding vectors out of a batch response, in request order.
pub fn extract_embeddings(response: BatchEmbedResponse) -> Vec<Vec<f32>> {
    response
        .embeddings
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.values)
        .collect()
}
