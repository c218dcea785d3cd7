mod arxiv;
mod chunking;
mod config;
mod fetch;
mod gemini;
mod markdown;
mod pipeline;
mod vectorstore;

pub const USER_AGENT: &str = concat!("paper-scout/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::{info, warn};

use arxiv::{ArxivClient, search_as_text};
use config::{Cli, Command, ResearchConfig, key_preview, research_question};
use gemini::GeminiClient;
use pipeline::ResearchPipeline;
use vectorstore::PineconeClient;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout; sized for full-paper PDF downloads.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;
const CREDENTIALS: [&str; 2] = ["GEMINI_API_KEY", "PINECONE_API_KEY"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.log_directive().parse()?),
        )
        .init();

    if let Err(e) = &dotenv
        && !e.not_found()
    {
        warn!("could not load .env: {e}");
    }

    run(cli)
        .await
        .inspect_err(|e| tracing::error!("{e}"))
}

fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let quiet = cli.quiet;
    match cli.command {
        Command::Report {
            question,
            output,
            options,
        } => {
            let question = research_question(&question)?;

            let config = ResearchConfig::from(options);
            let http = http_client()?;
            let gemini = GeminiClient::from_env(http.clone())?;
            let pinecone = PineconeClient::from_env(http.clone(), &config.index_name)?;
            info!(model = gemini.model(), index = pinecone.index_name(), "starting research");

            let pipeline = ResearchPipeline::new(
                ArxivClient::new(http.clone()),
                gemini.clone(),
                gemini,
                pinecone,
                http,
                config,
            );
            let state = pipeline
                .run(question, |stage| {
                    if !quiet {
                        eprintln!("{}", stage.label());
                    }
                })
                .await?;
            let report = state.report()?;

            if let Some(path) = output {
                tokio::fs::write(&path, report).await?;
                info!(path = %path.display(), "report written");
            }
            if !quiet {
                eprintln!("Report generated successfully!");
            }
            println!("{report}");
        }

        Command::Search { query, max_results } => {
            let client = ArxivClient::new(http_client()?);
            println!("{}", search_as_text(&client, &query, max_results).await);
        }

        Command::Check => {
            let mut missing = Vec::new();
            for name in CREDENTIALS {
                match std::env::var(name).ok().filter(|v| !v.trim().is_empty()) {
                    Some(key) => println!("{name}: loaded, starts with {}", key_preview(key.trim())),
                    None => {
                        println!("{name}: not set (check your .env file)");
                        missing.push(name);
                    }
                }
            }
            if !missing.is_empty() {
                return Err(format!("missing credentials: {}", missing.join(", ")).into());
            }
        }
    }
    Ok(())
}
