//! # KB Assistant CLI (`kba`)
//!
//! ## Usage
//!
//! ```bash
//! kba --config ./config/kba.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kba ingest` | Walk the corpus, chunk and embed it, build the vector index |
//! | `kba ask <agent> "<question>"` | One-shot grounded answer (writer/code/reviewer) |
//! | `kba serve` | Start the HTTP API with session memory and streaming |
//!
//! `ask` builds the index first if it does not exist yet, so a fresh
//! checkout works without a separate ingest step.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use kb_assistant::agent::AgentId;
use kb_assistant::config::load_config;
use kb_assistant::llm::OllamaClient;
use kb_assistant::memory::SessionStore;
use kb_assistant::query::QueryEngine;
use kb_assistant::{index, ingest, server};

/// KB Assistant — a local-first retrieval-augmented research assistant.
#[derive(Parser)]
#[command(
    name = "kba",
    about = "KB Assistant — retrieval-augmented answers over a local document corpus",
    version,
    long_about = "KB Assistant indexes a local document corpus (markdown, plain text, PDF), \
    retrieves diverse relevant passages per question via MMR-based vector search, and answers \
    through a local Ollama model. Serves a JSON/NDJSON HTTP API with per-session chat memory."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kba.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from the corpus directory.
    ///
    /// Walks the corpus root, splits every recognized document into
    /// overlapping chunks, embeds them, and appends them to the persisted
    /// index. An empty corpus is reported and skipped.
    Ingest,

    /// Ask a one-shot question as the given agent.
    Ask {
        /// Agent identifier: `writer`, `code`, or `reviewer`.
        agent: String,

        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve (defaults to the configured k).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kb_assistant=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);

    let ollama = Arc::new(OllamaClient::new(&config.models)?);

    match cli.command {
        Commands::Ingest => {
            ingest::build_index(&config, ollama.as_ref()).await?;
        }

        Commands::Ask { agent, question, k } => {
            let agent = AgentId::from_str(&agent)?;

            // Build the index on first use.
            let pool = index::connect(&config.index).await?;
            if index::count(&pool).await? == 0 {
                ingest::build_index(&config, ollama.as_ref()).await?;
            }

            let engine = QueryEngine::new(
                Arc::clone(&config),
                pool,
                ollama.clone(),
                ollama.clone(),
                Arc::new(SessionStore::new()),
            );

            let outcome = engine.ask(agent, &question, None, k).await?;
            println!("{}", outcome.answer);
            if !outcome.sources.is_empty() {
                println!("\nSOURCES:\n{}", outcome.sources);
            }
        }

        Commands::Serve => {
            let pool = index::connect(&config.index).await?;
            let engine = Arc::new(QueryEngine::new(
                Arc::clone(&config),
                pool,
                ollama.clone(),
                ollama.clone(),
                Arc::new(SessionStore::new()),
            ));
            server::run_server(config, engine).await?;
        }
    }

    Ok(())
}
