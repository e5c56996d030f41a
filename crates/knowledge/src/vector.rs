//! Vector similarity and diversity-aware search utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Top-k similarity search
//! - Maximal Marginal Relevance (MMR) re-ranking

use crate::store::{Passage, ScoredPassage};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank passages by cosine similarity to a query embedding.
///
/// Returns at most `limit` passages sorted by descending similarity.
pub fn similarity_search(passages: &[Passage], query_embedding: &[f32], limit: usize) -> Vec<ScoredPassage> {
    let mut scored: Vec<ScoredPassage> = passages
        .iter()
        .map(|p| ScoredPassage {
            score: cosine_similarity(&p.embedding, query_embedding),
            passage: p.clone(),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Maximal Marginal Relevance search.
///
/// Takes the `fetch_k` most similar passages, then greedily picks `k` of
/// them maximising `lambda * sim(query, d) - (1 - lambda) * max sim(d, picked)`.
/// `lambda = 1.0` degenerates to plain similarity order.
pub fn mmr_search(
    passages: &[Passage],
    query_embedding: &[f32],
    k: usize,
    fetch_k: usize,
    lambda: f32,
) -> Vec<ScoredPassage> {
    let mut candidates = similarity_search(passages, query_embedding, fetch_k.max(k));
    let mut selected: Vec<ScoredPassage> = Vec::with_capacity(k);

    while selected.len() < k && !candidates.is_empty() {
        let mut best_idx = 0;
        let mut best_value = f32::NEG_INFINITY;

        for (i, candidate) in candidates.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.passage.embedding, &s.passage.embedding))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let value = lambda * candidate.score - (1.0 - lambda) * redundancy;
            if value > best_value {
                best_value = value;
                best_idx = i;
            }
        }

        selected.push(candidates.remove(best_idx));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, embedding: Vec<f32>) -> Passage {
        Passage {
            id: id.into(),
            source: "刑法.txt".into(),
            content: format!("内容 {id}"),
            embedding,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn similarity_search_ranks_and_limits() {
        let query = vec![1.0, 0.0, 0.0];
        let passages = vec![
            passage("a", vec![0.0, 1.0, 0.0]),
            passage("b", vec![1.0, 0.0, 0.0]),
            passage("c", vec![0.5, 0.5, 0.0]),
        ];

        let results = similarity_search(&passages, &query, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].passage.id, "b");
        assert_eq!(results[1].passage.id, "c");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn mmr_prefers_diverse_results() {
        let query = vec![1.0, 0.0, 0.0];
        let passages = vec![
            passage("near1", vec![1.0, 0.1, 0.0]),
            passage("near2", vec![1.0, 0.1, 0.01]), // almost a duplicate of near1
            passage("other", vec![1.0, 0.0, 0.5]),
        ];

        let plain = similarity_search(&passages, &query, 2);
        assert_eq!(plain[1].passage.id, "near2");

        let diverse = mmr_search(&passages, &query, 2, 10, 0.5);
        assert_eq!(diverse.len(), 2);
        assert_eq!(diverse[0].passage.id, "near1");
        assert_eq!(diverse[1].passage.id, "other");
    }

    #[test]
    fn mmr_with_lambda_one_is_similarity_order() {
        let query = vec![1.0, 0.0];
        let passages: Vec<_> = (0..6)
            .map(|i| passage(&format!("p{i}"), vec![1.0, i as f32 * 0.2]))
            .collect();
        let mmr: Vec<_> = mmr_search(&passages, &query, 3, 10, 1.0)
            .into_iter()
            .map(|s| s.passage.id)
            .collect();
        let plain: Vec<_> = similarity_search(&passages, &query, 3)
            .into_iter()
            .map(|s| s.passage.id)
            .collect();
        assert_eq!(mmr, plain);
    }

    #[test]
    fn mmr_on_small_store_returns_everything() {
        let passages = vec![passage("only", vec![1.0])];
        assert_eq!(mmr_search(&passages, &[1.0], 3, 10, 0.5).len(), 1);
        assert!(mmr_search(&[], &[1.0], 3, 10, 0.5).is_empty());
    }
}
