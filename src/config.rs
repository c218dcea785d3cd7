//! Command-line surface and run configuration.
//!
//! Credentials are read from the environment by each client
//! (`GEMINI_API_KEY`, `PINECONE_API_KEY`, ...); everything that tunes a run
//! is a flag here and ends up in [`ResearchConfig`].

use std::path::PathBuf;

use clap::builder::TypedValueParser as _;
use clap::{Args, Parser, Subcommand};

use crate::chunking::DEFAULT_BREAKPOINT_PERCENTILE;

pub const DEFAULT_INDEX: &str = "academic-papers";
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_TOP_K: usize = 4;

/// Settings for one research run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchConfig {
    /// Pinecone index receiving the chunk vectors.
    pub index_name: String,
    /// Fixed namespace; derived from the paper URL when `None`.
    pub namespace: Option<String>,
    pub max_results: usize,
    pub top_k: usize,
    pub breakpoint_percentile: f64,
    /// Directory holding the transient paper file.
    pub work_dir: PathBuf,
    pub allow_private_hosts: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX.to_string(),
            namespace: None,
            max_results: DEFAULT_MAX_RESULTS,
            top_k: DEFAULT_TOP_K,
            breakpoint_percentile: DEFAULT_BREAKPOINT_PERCENTILE,
            work_dir: std::env::temp_dir(),
            allow_private_hosts: false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "paper-scout",
    version,
    about = "Answer research questions from the single most relevant arXiv paper",
    long_about = "Searches arXiv, lets Gemini pick the best paper, indexes its text in \
                  Pinecone and writes a cited report from the passages closest to the question.

ENVIRONMENT:
  GEMINI_API_KEY           required for `report`
  GEMINI_MODEL             text model (default gemini-2.5-flash)
  GEMINI_EMBEDDING_MODEL   embedding model (default embedding-001)
  GEMINI_TEMPERATURE       sampling temperature, 0.0 to 2.0 (default: model default)
  PINECONE_API_KEY         required for `report`
  PINECONE_INDEX_HOST      data-plane host; looked up from the index name when unset

A .env file in the working directory is loaded first."
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline and print a Markdown report
    Report {
        /// Research question in natural language
        question: String,

        /// Also write the report to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: ReportOptions,
    },

    /// Search arXiv and print the results the selector would see
    Search {
        query: String,

        /// Number of papers to list
        #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RESULTS,
              value_parser = clap::value_parser!(u16).range(1..=50).map(usize::from))]
        max_results: usize,
    },

    /// Show whether the API keys are configured
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct ReportOptions {
    /// Pinecone index name
    #[arg(long = "index", env = "PINECONE_INDEX", default_value = DEFAULT_INDEX)]
    pub index_name: String,

    /// Pinecone namespace (default: derived from the paper's arXiv id)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Number of arXiv results offered to the selector
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RESULTS,
          value_parser = clap::value_parser!(u16).range(1..=50).map(usize::from))]
    pub max_results: usize,

    /// Passages retrieved for the report
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP_K,
          value_parser = clap::value_parser!(u16).range(1..=50).map(usize::from))]
    pub top_k: usize,

    /// Distance percentile above which a sentence gap becomes a chunk boundary
    #[arg(long, value_name = "P", default_value_t = DEFAULT_BREAKPOINT_PERCENTILE,
          value_parser = parse_percentile)]
    pub breakpoint_percentile: f64,

    /// Directory for the transient paper file (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Allow downloads from loopback and private network addresses
    #[arg(long)]
    pub allow_private_hosts: bool,
}

impl From<ReportOptions> for ResearchConfig {
    fn from(opts: ReportOptions) -> Self {
        let defaults = ResearchConfig::default();
        Self {
            index_name: opts.index_name,
            namespace: opts.namespace.filter(|ns| !ns.trim().is_empty()),
            max_results: opts.max_results,
            top_k: opts.top_k,
            breakpoint_percentile: opts.breakpoint_percentile,
            work_dir: opts.work_dir.unwrap_or(defaults.work_dir),
            allow_private_hosts: opts.allow_private_hosts,
        }
    }
}

fn parse_percentile(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0..=100"))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("please enter a research question first")]
    BlankQuestion,
}

/// Trimmed research question; blank input is rejected before any client is built.
pub fn research_question(raw: &str) -> Result<&str, ConfigError> {
    let question = raw.trim();
    if question.is_empty() {
        return Err(ConfigError::BlankQuestion);
    }
    Ok(question)
}

/// First four characters of a secret, for `check` output.
pub fn key_preview(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}...")
}

impl Cli {
    /// Default `EnvFilter` directive for the chosen verbosity.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "paper_scout=debug"
        } else if self.quiet {
            "paper_scout=warn"
        } else {
            "paper_scout=info"
        }
    }
}
