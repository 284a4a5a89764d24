//! Query orchestration: retrieval + conversational context + generation.
//!
//! [`QueryEngine::ask`] is the single entry point behind both wire
//! endpoints and the CLI. It resolves the agent profile, folds recent
//! session turns into the question, retrieves grounding chunks using the
//! augmented question as the embedding query, invokes the chat model, and
//! records the completed turn. Generation failures propagate; they are
//! never retried or swallowed here.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::debug;

use crate::agent::AgentId;
use crate::config::Config;
use crate::error::QueryError;
use crate::index;
use crate::llm::{ChatModel, Embedder};
use crate::memory::SessionStore;
use crate::retrieve::{retrieve, RetrievedChunk};

/// Citation snippets are truncated to this many characters.
const MAX_SNIPPET_CHARS: usize = 220;

/// Framing instruction prepended to the question when prior turns exist.
const CONTINUATION_FRAME: &str =
    "You are continuing an ongoing conversation. Use the context below to stay consistent.";

/// A completed answer with its deduplicated source listing.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub answer: String,
    pub sources: String,
}

pub struct QueryEngine {
    config: Arc<Config>,
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    sessions: Arc<SessionStore>,
}

impl QueryEngine {
    pub fn new(
        config: Arc<Config>,
        pool: SqlitePool,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            pool,
            embedder,
            chat,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Whether the persisted index holds at least one vector.
    pub async fn index_ready(&self) -> Result<bool, QueryError> {
        let n = index::count(&self.pool).await.map_err(QueryError::Internal)?;
        Ok(n > 0)
    }

    /// Answers `question` as `agent`, optionally continuing the session
    /// identified by `session_id`. `k` falls back to the configured
    /// direct-query default.
    pub async fn ask(
        &self,
        agent: AgentId,
        question: &str,
        session_id: Option<&str>,
        k: Option<usize>,
    ) -> Result<AskOutcome, QueryError> {
        let profile = agent.profile(&self.config.models);
        let k = k.unwrap_or(self.config.retrieval.k);

        // Fold recent turns into the question. The augmented text is also
        // the embedding query; long histories can dilute retrieval
        // relevance (known limitation of the conversational path).
        let question_for_model = match session_id {
            Some(sid) => {
                let ctx = self
                    .sessions
                    .build_context(sid, self.config.memory.context_turns);
                if ctx.is_empty() {
                    question.to_string()
                } else {
                    format!(
                        "{frame}\n\n=== Conversation context (most recent last) ===\n{ctx}\n=== End context ===\n\nUser: {question}",
                        frame = CONTINUATION_FRAME,
                    )
                }
            }
            None => question.to_string(),
        };

        let chunks = retrieve(
            &self.pool,
            self.embedder.as_ref(),
            &question_for_model,
            k,
            self.config.retrieval.fetch_k(k),
            self.config.retrieval.mmr_lambda,
        )
        .await?;
        debug!(agent = %agent, k, retrieved = chunks.len(), "retrieval complete");

        let context = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Context:\n{context}\n\nUser request:\n{question_for_model}\n"
        );

        let answer = self
            .chat
            .generate(&profile.model, profile.temperature, profile.system, &prompt)
            .await
            .map_err(|e| QueryError::Generation(e.to_string()))?;

        let sources = format_sources(&chunks);

        // The stored turn is the original question, not the augmented one.
        if let Some(sid) = session_id {
            self.sessions.append_turn(sid, question, &answer);
        }

        Ok(AskOutcome { answer, sources })
    }
}

/// Formats one citation line per unique source, first-seen order.
/// The dedup key is `(source, page)` when a page is present, else the
/// source alone; page numbers render 1-based.
pub fn format_sources(chunks: &[RetrievedChunk]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut lines = Vec::new();

    for chunk in chunks {
        let snippet = truncate_snippet(&chunk.content);

        let (key, line) = match chunk.page {
            Some(page) => (
                format!("{}:{}", chunk.source, page),
                format!("- {} (p.{}): {}", chunk.source, page + 1, snippet),
            ),
            None => (
                chunk.source.clone(),
                format!("- {}: {}", chunk.source, snippet),
            ),
        };

        if seen.insert(key) {
            lines.push(line);
        }
    }

    lines.join("\n")
}

fn truncate_snippet(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > MAX_SNIPPET_CHARS {
        let cut: String = flat.chars().take(MAX_SNIPPET_CHARS).collect();
        format!("{}…", cut)
    } else {
        flat.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Scope;

    fn chunk(content: &str, source: &str, page: Option<i64>) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source: source.to_string(),
            page,
            scope: Scope::Public,
            relevance: 0.5,
        }
    }

    #[test]
    fn test_sources_dedup_by_source_and_page() {
        let chunks = vec![
            chunk("first passage", "doc.pdf", Some(2)),
            chunk("second passage same page", "doc.pdf", Some(2)),
            chunk("different page", "doc.pdf", Some(3)),
        ];
        let sources = format_sources(&chunks);
        let lines: Vec<&str> = sources.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- doc.pdf (p.3): first passage"));
        assert!(lines[1].starts_with("- doc.pdf (p.4): different page"));
    }

    #[test]
    fn test_sources_page_renders_one_based() {
        let chunks = vec![chunk("text", "doc.pdf", Some(2))];
        assert_eq!(format_sources(&chunks), "- doc.pdf (p.3): text");
    }

    #[test]
    fn test_sources_without_page_dedup_by_source() {
        let chunks = vec![
            chunk("alpha", "notes.md", None),
            chunk("beta", "notes.md", None),
            chunk("gamma", "other.md", None),
        ];
        let sources = format_sources(&chunks);
        let lines: Vec<&str> = sources.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "- notes.md: alpha");
        assert_eq!(lines[1], "- other.md: gamma");
    }

    #[test]
    fn test_sources_first_seen_order_preserved() {
        let chunks = vec![
            chunk("z", "z.md", None),
            chunk("a", "a.md", None),
            chunk("m", "m.md", None),
        ];
        let sources = format_sources(&chunks);
        let lines: Vec<&str> = sources.lines().collect();
        assert_eq!(lines[0], "- z.md: z");
        assert_eq!(lines[1], "- a.md: a");
        assert_eq!(lines[2], "- m.md: m");
    }

    #[test]
    fn test_snippet_truncated_with_ellipsis() {
        let long = "x".repeat(400);
        let chunks = vec![chunk(&long, "big.md", None)];
        let sources = format_sources(&chunks);
        assert!(sources.ends_with('…'));
        // "- big.md: " prefix + 220 chars + ellipsis
        let snippet = sources.strip_prefix("- big.md: ").unwrap();
        assert_eq!(snippet.chars().count(), MAX_SNIPPET_CHARS + 1);
    }

    #[test]
    fn test_snippet_newlines_flattened() {
        let chunks = vec![chunk("line one\nline two", "doc.md", None)];
        assert_eq!(format_sources(&chunks), "- doc.md: line one line two");
    }

    #[test]
    fn test_empty_chunks_empty_sources() {
        assert_eq!(format_sources(&[]), "");
    }
}
