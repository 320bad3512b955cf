use super::{cosine_similarity, Record};

/// Outcome of a nearest-neighbour scan
#[derive(Debug, Clone, Copy)]
pub struct QueryResult<'a> {
    /// Highest scoring record, `None` when there were no candidates
    pub best: Option<&'a Record>,
    pub score: f32,
}

impl<'a> QueryResult<'a> {
    pub fn no_match() -> Self {
        QueryResult {
            best: None,
            score: f32::NEG_INFINITY,
        }
    }

    pub fn text(&self) -> Option<&'a str> {
        self.best.map(|record| record.text.as_str())
    }
}

/// Brute-force cosine scan over a borrowed snapshot of records.
///
/// Holds no state between calls. Replacing the linear scan with an index only
/// has to preserve the signatures below.
pub struct SimilarityEngine;

impl SimilarityEngine {
    /// Score one candidate, warning when its vector cannot be compared
    pub fn score(query: &[f32], record: &Record) -> f32 {
        if record.embedding.len() != query.len() {
            tracing::warn!(
                record = %record.id,
                expected = query.len(),
                actual = record.embedding.len(),
                "record embedding does not match query dimension, scoring 0"
            );
        }
        cosine_similarity(query, &record.embedding)
    }

    /// Return the record most similar to `query`.
    ///
    /// Single pass; only a strictly greater score replaces the current best, so
    /// among equal scores the earliest record wins.
    pub fn best_match<'a>(query: &[f32], records: &'a [Record]) -> QueryResult<'a> {
        let mut result = QueryResult::no_match();

        for record in records {
            let similarity = Self::score(query, record);
            tracing::debug!(record = %record.id, similarity, "scored candidate");
            if similarity > result.score {
                result = QueryResult {
                    best: Some(record),
                    score: similarity,
                };
            }
        }

        result
    }

    /// Return the `top_k` most similar records, best first.
    ///
    /// Equal scores keep insertion order, so `rank(q, r, 1)` agrees with
    /// [`SimilarityEngine::best_match`].
    pub fn rank<'a>(query: &[f32], records: &'a [Record], top_k: usize) -> Vec<(f32, &'a Record)> {
        let mut results: Vec<(f32, &Record)> = records
            .iter()
            .map(|record| (Self::score(query, record), record))
            .collect();

        // Stable sort keeps earlier records ahead on ties
        results.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }
}
