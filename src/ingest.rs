//! Ingestion pipeline orchestration.
//!
//! Coordinates the full offline flow: corpus walk → metadata
//! normalization and scope tagging → chunking → embedding → append into
//! the persisted vector index. An empty corpus is reported and skipped,
//! never treated as an error.

use anyhow::Result;
use uuid::Uuid;

use crate::chunk::Splitter;
use crate::config::Config;
use crate::index::{self, ChunkRecord};
use crate::llm::Embedder;
use crate::loader;

/// Chunks embedded per provider call.
const EMBED_BATCH: usize = 32;

/// Builds (or extends) the vector index from the corpus root.
/// Returns the number of chunks indexed; 0 means the corpus was empty.
pub async fn build_index(config: &Config, embedder: &dyn Embedder) -> Result<usize> {
    let root = &config.corpus.root;
    std::fs::create_dir_all(root)?;

    let docs = loader::load_corpus(root)?;
    if docs.is_empty() {
        println!(
            "{} is empty. Add at least one .md/.txt/.pdf first.",
            root.display()
        );
        return Ok(0);
    }
    let doc_count = docs.len();

    let splitter = Splitter::new(config.chunking.max_chars, config.chunking.overlap_chars);

    // Normalize, tag, and chunk. Chunks inherit their parent document's
    // metadata unchanged; a missing source falls back to "unknown" so
    // every chunk carries a non-empty citation key.
    struct PendingChunk {
        content: String,
        source: String,
        page: Option<i64>,
        scope: loader::Scope,
    }

    let mut pending = Vec::new();
    for doc in docs {
        let tagged = loader::normalize(root, doc);
        for content in splitter.split(&tagged.content) {
            pending.push(PendingChunk {
                content,
                source: tagged.source.clone().unwrap_or_else(|| "unknown".to_string()),
                page: tagged.page,
                scope: tagged.scope,
            });
        }
    }

    let pool = index::connect(&config.index).await?;

    let mut indexed = 0usize;
    for batch in pending.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let records: Vec<ChunkRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                content: chunk.content.clone(),
                source: chunk.source.clone(),
                page: chunk.page,
                scope: chunk.scope,
                embedding,
            })
            .collect();

        index::append(&pool, &records).await?;
        indexed += records.len();
    }

    pool.close().await;

    println!("ingest {}", root.display());
    println!("  documents loaded: {}", doc_count);
    println!("  chunks indexed: {}", indexed);
    println!("ok");

    Ok(indexed)
}
