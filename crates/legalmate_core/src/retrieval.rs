use crate::index::CorpusIndex;
use crate::model::MatchResult;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("corpus is empty, no entry can match")]
    EmptyCorpus,
}

/// Cosine of the angle between `a` and `b`, in [-1, 1]. Zero-norm, empty,
/// non-finite or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, aa, bb), (x, y)| {
            (d + (x * y), aa + (x * x), bb + (y * y))
        });

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let score = dot / (na.sqrt() * nb.sqrt());
    if score.is_nan() {
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}

/// Best-scoring entry for `query`. Ties go to the lowest entry index.
pub fn match_query(query: &[f32], index: &CorpusIndex) -> Result<MatchResult, MatchError> {
    let mut best: Option<MatchResult> = None;

    for (entry_index, embedding) in index.embeddings().iter().enumerate() {
        let score = cosine_similarity(query, embedding);
        match best {
            Some(b) if score <= b.score => {}
            _ => best = Some(MatchResult { entry_index, score }),
        }
    }

    best.ok_or(MatchError::EmptyCorpus)
}

/// Up to `k` entries ranked by descending score; ties keep corpus order.
pub fn top_k(query: &[f32], index: &CorpusIndex, k: usize) -> Vec<MatchResult> {
    let mut scored: Vec<MatchResult> = index
        .embeddings()
        .iter()
        .enumerate()
        .map(|(entry_index, embedding)| MatchResult {
            entry_index,
            score: cosine_similarity(query, embedding),
        })
        .collect();

    // stable sort
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}
