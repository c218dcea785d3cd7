//! The four-stage research run: search, select, process, generate.

mod prompts;
mod selection;
mod state;

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::arxiv::urls::{document_url, namespace_for};
use crate::arxiv::{PaperSearch, search_as_text};
use crate::chunking::{ChunkError, DEFAULT_BUFFER_SIZE, SemanticChunker};
use crate::config::ResearchConfig;
use crate::fetch::{Document, FetchError, Fetcher, TokioDnsResolver};
use crate::gemini::{Embedder, GeminiError, TextGenerator};
use crate::markdown::ensure_citation;
use crate::vectorstore::{PassageMetadata, VectorRecord, VectorStore, VectorStoreError};

pub use selection::{Selection, parse_selection};
pub use state::ResearchState;

/// Queries issued while freshly upserted vectors are not yet visible.
const INDEX_SETTLE_ATTEMPTS: u32 = 5;
const INDEX_SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Gemini(#[from] GeminiError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Chunk(#[from] ChunkError),

    #[error("{0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("'{0}' was read before the stage that produces it ran")]
    MissingField(&'static str),

    #[error("'{0}' was already written by an earlier stage")]
    AlreadyWritten(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SearchPapers,
    SelectBestPaper,
    ProcessPaper,
    GenerateReport,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::SearchPapers,
        Stage::SelectBestPaper,
        Stage::ProcessPaper,
        Stage::GenerateReport,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::SearchPapers => "search_papers",
            Stage::SelectBestPaper => "select_best_paper",
            Stage::ProcessPaper => "process_paper",
            Stage::GenerateReport => "generate_report",
        }
    }

    /// Status line shown while the stage runs.
    pub fn label(self) -> &'static str {
        match self {
            Stage::SearchPapers => "Searching for relevant academic papers...",
            Stage::SelectBestPaper => "Analyzing search results to select the best paper...",
            Stage::ProcessPaper => "Downloading, processing, and reading the selected paper...",
            Stage::GenerateReport => "Synthesizing the findings into a final report...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ResearchPipeline<S, G, E, V> {
    search: S,
    generator: G,
    embedder: E,
    store: V,
    fetcher: Fetcher,
    chunker: SemanticChunker,
    config: ResearchConfig,
    index_settle: Duration,
}

impl<S, G, E, V> ResearchPipeline<S, G, E, V>
where
    S: PaperSearch,
    G: TextGenerator,
    E: Embedder,
    V: VectorStore,
{
    pub fn new(
        search: S,
        generator: G,
        embedder: E,
        store: V,
        http: Client,
        config: ResearchConfig,
    ) -> Self {
        let fetcher = Fetcher::new(http, config.work_dir.clone(), config.allow_private_hosts);
        let chunker = SemanticChunker::new(DEFAULT_BUFFER_SIZE, config.breakpoint_percentile);
        Self {
            search,
            generator,
            embedder,
            store,
            fetcher,
            chunker,
            config,
            index_settle: INDEX_SETTLE_DELAY,
        }
    }

    /// Runs every stage in order, calling `on_stage` before each one.
    pub async fn run(
        &self,
        question: &str,
        mut on_stage: impl FnMut(Stage),
    ) -> Result<ResearchState, PipelineError> {
        let mut state = ResearchState::new(question);
        for stage in Stage::ALL {
            on_stage(stage);
            info!(stage = %stage, "stage started");
            match stage {
                Stage::SearchPapers => self.search_papers(&mut state).await?,
                Stage::SelectBestPaper => self.select_best_paper(&mut state).await?,
                Stage::ProcessPaper => self.process_paper(&mut state).await?,
                Stage::GenerateReport => self.generate_report(&mut state).await?,
            }
        }
        Ok(state)
    }

    async fn search_papers(&self, state: &mut ResearchState) -> Result<(), PipelineError> {
        let results = search_as_text(&self.search, state.question(), self.config.max_results).await;
        state.set_search_results(results)
    }

    async fn select_best_paper(&self, state: &mut ResearchState) -> Result<(), PipelineError> {
        let prompt = prompts::selection_prompt(state.question(), state.search_results()?);
        let response = self.generator.generate(&prompt).await?;
        let Selection { title, url } = parse_selection(&response);
        info!(title = %title, url = %url, "paper selected");
        state.set_selection(title, url)
    }

    async fn process_paper(&self, state: &mut ResearchState) -> Result<(), PipelineError> {
        let source = state.selected_source_id()?.to_string();
        let title = state.selected_title()?.to_string();
        let url = document_url(&source);
        let namespace = self
            .config
            .namespace
            .clone()
            .unwrap_or_else(|| namespace_for(&source));
        info!(url = %url, namespace = %namespace, index = %self.config.index_name, "processing paper");

        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(FetchError::from)?;
        let document = self.fetcher.download(&url, &TokioDnsResolver).await?;

        let outcome = self
            .index_and_retrieve(&document, &namespace, &title, state.question())
            .await;
        let removed = document.discard();
        if let Err(e) = &removed {
            warn!(error = %e, "could not remove transient paper file");
        }
        let passages = outcome?;
        removed?;

        info!(passages = passages.len(), "passages retrieved");
        state.set_retrieved_passages(passages)
    }

    async fn index_and_retrieve(
        &self,
        document: &Document,
        namespace: &str,
        title: &str,
        question: &str,
    ) -> Result<Vec<String>, PipelineError> {
        debug!(path = %document.path().display(), kind = ?document.kind, "loading paper text");
        let text = document.load_text().await?;
        let chunks = self.chunker.split(&text, &self.embedder).await?;
        info!(chunks = chunks.len(), chars = text.len(), "paper chunked");

        let vectors = self.embedder.embed_documents(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(GeminiError::EmbeddingCount {
                expected: chunks.len(),
                got: vectors.len(),
            }
            .into());
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, values))| VectorRecord {
                id: format!("{namespace}-{i}"),
                values,
                metadata: PassageMetadata {
                    text,
                    title: title.to_string(),
                    source: document.url.clone(),
                },
            })
            .collect();

        let upserted = if records.is_empty() {
            0
        } else {
            self.store.upsert(namespace, &records).await?
        };
        debug!(upserted, namespace, "chunks indexed");

        let query = self.embedder.embed_query(question).await?;
        let top_k = self.config.top_k;
        let mut matches = self.store.query(namespace, &query, top_k).await?;
        let mut attempt = 1;
        while matches.is_empty() && upserted > 0 && attempt < INDEX_SETTLE_ATTEMPTS {
            debug!(attempt, "index has no matches yet, waiting");
            tokio::time::sleep(self.index_settle).await;
            matches = self.store.query(namespace, &query, top_k).await?;
            attempt += 1;
        }

        for m in &matches {
            debug!(id = %m.id, score = m.score, "retrieved passage");
        }
        Ok(matches.into_iter().take(top_k).map(|m| m.text).collect())
    }

    async fn generate_report(&self, state: &mut ResearchState) -> Result<(), PipelineError> {
        let title = state.selected_title()?;
        let url = state.selected_source_id()?;
        let context = state.retrieved_passages()?.join("\n\n");

        let prompt = prompts::report_prompt(state.question(), title, url, &context);
        let report = self.generator.generate(&prompt).await?;
        let report = ensure_citation(report, title, url);
        state.set_report(report)
    }
}
