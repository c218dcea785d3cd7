//! Gemini REST client: text generation and retrieval embeddings.

pub mod client;
mod response;
pub mod types;

pub use client::{Embedder, GeminiClient, GeminiError, TextGenerator};
