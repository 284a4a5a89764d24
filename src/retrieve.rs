//! Diversity-aware retrieval over the vector index.
//!
//! Embeds the query, fetches an oversampled candidate set ranked by cosine
//! similarity, then applies maximal-marginal-relevance selection so the
//! final top-k balances relevance against redundancy with already-selected
//! chunks.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::index::{self, cosine_similarity, ChunkRecord};
use crate::llm::Embedder;
use crate::loader::Scope;

/// A chunk selected for grounding context, in selection order.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub page: Option<i64>,
    pub scope: Scope,
    /// Cosine similarity to the query.
    pub relevance: f32,
}

/// Retrieves at most `k` chunks for `query`. An empty or missing index is
/// a valid, non-error outcome: the result is simply empty.
pub async fn retrieve(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    fetch_k: usize,
    mmr_lambda: f32,
) -> Result<Vec<RetrievedChunk>> {
    let records = index::load_all(pool).await?;
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed(query).await?;

    // Rank by similarity and keep the oversampled candidate set.
    // The sort is stable, so equal-similarity candidates keep index order.
    let mut scored: Vec<(f32, ChunkRecord)> = records
        .into_iter()
        .map(|r| (cosine_similarity(&query_vec, &r.embedding), r))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(fetch_k);

    let relevance: Vec<f32> = scored.iter().map(|(s, _)| *s).collect();
    let embeddings: Vec<&[f32]> = scored.iter().map(|(_, r)| r.embedding.as_slice()).collect();

    let picked = mmr_select(&relevance, &embeddings, k, mmr_lambda);

    Ok(picked
        .into_iter()
        .map(|i| {
            let (score, record) = &scored[i];
            RetrievedChunk {
                content: record.content.clone(),
                source: record.source.clone(),
                page: record.page,
                scope: record.scope,
                relevance: *score,
            }
        })
        .collect())
}

/// Maximal-marginal-relevance selection.
///
/// Iteratively picks the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`
/// until `k` are chosen or candidates are exhausted. Ties go to the
/// earlier candidate (candidate-set order is the stable tie-break).
/// Returns indices into the candidate set, in selection order.
pub fn mmr_select(relevance: &[f32], embeddings: &[&[f32]], k: usize, lambda: f32) -> Vec<usize> {
    let n = relevance.len();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(n));
    let mut remaining: Vec<usize> = (0..n).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &cand) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(embeddings[cand], embeddings[s]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let score = lambda * relevance[cand] - (1.0 - lambda) * redundancy;
            // Strict comparison keeps the earliest candidate on ties.
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmr_picks_most_relevant_first() {
        let e1 = [1.0f32, 0.0];
        let e2 = [0.0f32, 1.0];
        let e3 = [0.7f32, 0.7];
        let embeddings: Vec<&[f32]> = vec![&e1, &e2, &e3];
        let relevance = vec![0.9, 0.5, 0.8];

        let picked = mmr_select(&relevance, &embeddings, 3, 0.6);
        assert_eq!(picked[0], 0);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_mmr_penalizes_near_duplicates() {
        // Candidates 0 and 1 are identical vectors; 2 is orthogonal but
        // slightly less relevant. MMR should interleave rather than take
        // both duplicates first.
        let dup_a = [1.0f32, 0.0];
        let dup_b = [1.0f32, 0.0];
        let other = [0.0f32, 1.0];
        let embeddings: Vec<&[f32]> = vec![&dup_a, &dup_b, &other];
        let relevance = vec![0.95, 0.94, 0.70];

        let picked = mmr_select(&relevance, &embeddings, 2, 0.5);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn test_mmr_exhausts_candidates() {
        let e1 = [1.0f32, 0.0];
        let e2 = [0.0f32, 1.0];
        let embeddings: Vec<&[f32]> = vec![&e1, &e2];
        let relevance = vec![0.5, 0.4];

        let picked = mmr_select(&relevance, &embeddings, 10, 0.6);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_mmr_returns_exactly_k_distinct() {
        // 24-candidate set, k = 4: exactly 4 distinct indices come back.
        let vectors: Vec<Vec<f32>> = (0..24)
            .map(|i| {
                let angle = i as f32 * 0.1;
                vec![angle.cos(), angle.sin()]
            })
            .collect();
        let embeddings: Vec<&[f32]> = vectors.iter().map(|v| v.as_slice()).collect();
        let relevance: Vec<f32> = (0..24).map(|i| 1.0 - i as f32 * 0.01).collect();

        let picked = mmr_select(&relevance, &embeddings, 4, 0.6);
        assert_eq!(picked.len(), 4);
        let mut dedup = picked.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), 4, "duplicate candidate selected");
        assert!(picked.iter().all(|&i| i < 24));
    }

    #[test]
    fn test_mmr_ties_stable() {
        let same = [1.0f32, 0.0];
        let embeddings: Vec<&[f32]> = vec![&same, &same, &same];
        let relevance = vec![0.5, 0.5, 0.5];

        let picked = mmr_select(&relevance, &embeddings, 1, 0.6);
        assert_eq!(picked, vec![0]);
    }

    #[test]
    fn test_mmr_empty_candidates() {
        let picked = mmr_select(&[], &[], 4, 0.6);
        assert!(picked.is_empty());
    }
}
