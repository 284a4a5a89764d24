//! # KB Assistant
//!
//! A local-first retrieval-augmented research assistant. It indexes a
//! document corpus into a persisted vector index, retrieves a diverse
//! top-k of chunks per question via maximal-marginal-relevance selection,
//! and generates grounded answers through a local Ollama model — one-shot
//! over the CLI or multi-turn (with per-session memory and streaming
//! delivery) over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌──────────┐
//! │ Corpus  │──▶│   Ingest      │──▶│  SQLite   │
//! │ md/pdf  │   │ chunk+embed  │   │ vectors   │
//! └─────────┘   └──────────────┘   └────┬─────┘
//!                                       │
//!                 ┌────────────┐   ┌────▼─────┐
//!                 │  Session   │◀─▶│  Query    │◀── agent profile
//!                 │  memory    │   │  engine   │──▶ Ollama chat
//!                 └────────────┘   └────┬─────┘
//!                                       │
//!                      ┌────────────────┤
//!                      ▼                ▼
//!                 ┌──────────┐    ┌───────────┐
//!                 │   CLI    │    │   HTTP    │
//!                 │  (kba)   │    │ ask/stream│
//!                 └──────────┘    └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kba ingest                    # chunk + embed the corpus
//! kba ask writer "question"     # one-shot grounded answer
//! kba serve                     # HTTP API with sessions + streaming
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Corpus loading, source normalization, scope tagging |
//! | [`chunk`] | Recursive separator-preference text splitter |
//! | [`llm`] | Embedding and chat capabilities (Ollama) |
//! | [`index`] | Persisted vector index (SQLite) |
//! | [`ingest`] | Offline index-building pipeline |
//! | [`retrieve`] | MMR-diversified vector retrieval |
//! | [`agent`] | Agent identifiers and profiles |
//! | [`memory`] | Bounded per-session conversation history |
//! | [`query`] | Query orchestration and source citations |
//! | [`stream`] | Delta/done/error streaming events |
//! | [`server`] | HTTP API |

pub mod agent;
pub mod chunk;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod memory;
pub mod query;
pub mod retrieve;
pub mod server;
pub mod stream;
