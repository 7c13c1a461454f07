//! Nearest-neighbor gallery matching with a combined L2 / cosine rule.

use crate::embedding::NormalizedEmbedding;
use crate::types::{EnrolledIdentity, MatchResult};
use serde::{Deserialize, Serialize};

/// Acceptance thresholds. A match is accepted if either criterion holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    /// Accept when the best L2 distance is at or below this.
    pub max_l2_distance: f32,
    /// Accept when the best cosine similarity is at or above this.
    pub min_similarity: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            max_l2_distance: 0.75,
            min_similarity: 0.6,
        }
    }
}

/// Strategy for comparing a query embedding against a gallery of enrolled faces.
pub trait Matcher: Send + Sync {
    fn find_best_match(&self, query: &NormalizedEmbedding, gallery: &[EnrolledIdentity]) -> MatchResult;
}

/// Scores of one gallery entry against the query.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CandidateScore {
    index: usize,
    l2_distance: f32,
    similarity: f32,
}

/// Running bests across the gallery. The two bests are tracked
/// independently and may come from different entries.
#[derive(Debug, Clone, Copy)]
struct Bests {
    l2_index: Option<usize>,
    l2_distance: f32,
    similarity: f32,
}

impl Bests {
    fn new() -> Self {
        Self {
            l2_index: None,
            l2_distance: f32::INFINITY,
            similarity: -1.0,
        }
    }

    // Strict comparisons: on ties the earliest entry wins.
    fn observe(&mut self, score: CandidateScore) {
        if score.l2_distance < self.l2_distance {
            self.l2_distance = score.l2_distance;
            self.l2_index = Some(score.index);
        }
        if score.similarity > self.similarity {
            self.similarity = score.similarity;
        }
    }

    /// Index of the accepted entry, if any.
    ///
    /// The L2-best entry is returned even when only the cosine criterion
    /// holds, and that cosine may belong to a different entry.
    fn accepted(&self, thresholds: &MatchThresholds) -> Option<usize> {
        let idx = self.l2_index?;
        let by_l2 = self.l2_distance <= thresholds.max_l2_distance;
        let by_cosine = self.similarity >= thresholds.min_similarity;
        (by_l2 || by_cosine).then_some(idx)
    }
}

/// Linear-scan matcher accepting on L2 distance OR cosine similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DualMetricMatcher {
    thresholds: MatchThresholds,
}

impl DualMetricMatcher {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }
}

impl Matcher for DualMetricMatcher {
    fn find_best_match(&self, query: &NormalizedEmbedding, gallery: &[EnrolledIdentity]) -> MatchResult {
        if gallery.is_empty() {
            return MatchResult::no_match();
        }
        if query.is_degenerate() {
            tracing::warn!(dim = query.len(), "query embedding is degenerate; no match");
            return MatchResult::no_match();
        }

        let mut bests = Bests::new();

        for (index, identity) in gallery.iter().enumerate() {
            if identity.embedding.len() != query.len() {
                tracing::warn!(
                    id = %identity.id,
                    stored_dim = identity.embedding.len(),
                    query_dim = query.len(),
                    "skipping gallery entry with mismatched embedding dimension"
                );
                continue;
            }

            let stored = identity.embedding.normalize();
            if stored.is_degenerate() {
                tracing::warn!(id = %identity.id, "skipping gallery entry with zero-norm embedding");
                continue;
            }
            let score = CandidateScore {
                index,
                l2_distance: query.euclidean_distance(&stored),
                similarity: query.similarity(&stored),
            };
            tracing::debug!(
                name = %identity.name,
                l2 = score.l2_distance,
                cosine = score.similarity,
                "compared gallery entry"
            );
            bests.observe(score);
        }

        let accepted = bests.accepted(&self.thresholds);
        tracing::debug!(
            best_l2 = bests.l2_distance,
            best_cosine = bests.similarity,
            candidate = ?bests.l2_index.map(|i| gallery[i].name.as_str()),
            accepted = accepted.is_some(),
            "gallery match decided"
        );

        MatchResult {
            identity: accepted.map(|i| gallery[i].clone()),
            l2_distance: bests.l2_distance,
            similarity: bests.similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedding;

    fn identity(id: &str, values: Vec<f32>) -> EnrolledIdentity {
        EnrolledIdentity {
            id: id.into(),
            name: format!("person-{id}"),
            image_ref: format!("file:///faces/{id}.jpg"),
            embedding: Embedding::new(values),
            created_at: String::new(),
        }
    }

    fn query(values: &[f32]) -> NormalizedEmbedding {
        Embedding::new(values.to_vec()).normalize()
    }

    #[test]
    fn test_empty_gallery() {
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &[]);
        assert!(!result.is_match());
        assert_eq!(result, MatchResult::no_match());
    }

    #[test]
    fn test_exact_match() {
        let values = vec![0.3, -1.2, 0.7, 2.0];
        let gallery = vec![identity("a", values.clone())];
        let result = DualMetricMatcher::default().find_best_match(&query(&values), &gallery);
        assert!(result.is_match());
        assert_eq!(result.identity.as_ref().map(|i| i.id.as_str()), Some("a"));
        assert!(result.l2_distance.abs() < 1e-6);
        assert!((result.similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stored_embedding_normalized_before_compare() {
        // Same direction, different scale: still an exact match.
        let gallery = vec![identity("a", vec![30.0, 40.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[3.0, 4.0]), &gallery);
        assert!(result.is_match());
        assert!(result.l2_distance.abs() < 1e-6);
    }

    #[test]
    fn test_no_match_when_both_criteria_fail() {
        let gallery = vec![identity("a", vec![0.0, 1.0, 0.0]), identity("b", vec![0.0, 0.0, 1.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0, 0.0]), &gallery);
        assert!(!result.is_match());
        assert!((result.l2_distance - 2f32.sqrt()).abs() < 1e-6);
        assert!(result.similarity.abs() < 1e-6);
    }

    #[test]
    fn test_closest_entry_wins() {
        let gallery = vec![
            identity("far", vec![0.0, 1.0]),
            identity("near", vec![0.95, 0.05]),
            identity("mid", vec![0.6, 0.4]),
        ];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &gallery);
        assert_eq!(result.identity.map(|i| i.id), Some("near".to_string()));
    }

    #[test]
    fn test_tie_keeps_first_entry() {
        let gallery = vec![identity("first", vec![1.0, 0.0]), identity("second", vec![2.0, 0.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &gallery);
        assert_eq!(result.identity.map(|i| i.id), Some("first".to_string()));
    }

    #[test]
    fn test_cosine_trigger_returns_l2_best() {
        // A has the lowest L2 distance, B the highest cosine. Acceptance is
        // triggered by B's cosine, yet A is returned.
        let mut bests = Bests::new();
        bests.observe(CandidateScore { index: 0, l2_distance: 0.9, similarity: 0.55 });
        bests.observe(CandidateScore { index: 1, l2_distance: 0.95, similarity: 0.65 });

        assert_eq!(bests.l2_index, Some(0));
        assert!((bests.similarity - 0.65).abs() < 1e-6);
        assert_eq!(bests.accepted(&MatchThresholds::default()), Some(0));
    }

    #[test]
    fn test_thresholds_inclusive() {
        let t = MatchThresholds::default();

        let mut by_l2 = Bests::new();
        by_l2.observe(CandidateScore { index: 0, l2_distance: 0.75, similarity: 0.1 });
        assert_eq!(by_l2.accepted(&t), Some(0));

        let mut by_cos = Bests::new();
        by_cos.observe(CandidateScore { index: 0, l2_distance: 1.2, similarity: 0.6 });
        assert_eq!(by_cos.accepted(&t), Some(0));

        let mut neither = Bests::new();
        neither.observe(CandidateScore { index: 0, l2_distance: 0.76, similarity: 0.59 });
        assert_eq!(neither.accepted(&t), None);
    }

    #[test]
    fn test_zero_stored_embedding_never_matches() {
        let gallery = vec![identity("blank", vec![0.0, 0.0, 0.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0, 0.0]), &gallery);
        assert!(!result.is_match());
        assert_eq!(result, MatchResult::no_match());
    }

    #[test]
    fn test_zero_query_never_matches() {
        let gallery = vec![identity("blank", vec![0.0; 4]), identity("a", vec![1.0, 0.0, 0.0, 0.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[0.0; 4]), &gallery);
        assert!(!result.is_match());
        assert_eq!(result, MatchResult::no_match());
    }

    #[test]
    fn test_zero_entry_is_never_the_candidate() {
        // A zero entry sits at L2 1.0 from any unit vector, closer than this
        // real entry, but the reported distance must be the real entry's.
        let gallery = vec![identity("blank", vec![0.0, 0.0]), identity("a", vec![-0.6, 0.8])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &gallery);
        assert!(!result.is_match());
        assert!((result.l2_distance - 3.2f32.sqrt()).abs() < 1e-5);
        assert!((result.similarity + 0.6).abs() < 1e-5);

        let gallery = vec![identity("blank", vec![0.0, 0.0]), identity("b", vec![0.8, 0.6])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &gallery);
        assert_eq!(result.identity.map(|i| i.id), Some("b".to_string()));
    }

    #[test]
    fn test_dimension_mismatch_skipped() {
        let gallery = vec![identity("short", vec![1.0]), identity("ok", vec![1.0, 0.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &gallery);
        assert_eq!(result.identity.map(|i| i.id), Some("ok".to_string()));

        let only_bad = vec![identity("short", vec![1.0])];
        let result = DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &only_bad);
        assert!(!result.is_match());
    }

    #[test]
    fn test_custom_thresholds() {
        let gallery = vec![identity("a", vec![0.8, 0.6])];
        let strict = DualMetricMatcher::new(MatchThresholds {
            max_l2_distance: 0.1,
            min_similarity: 0.99,
        });
        assert!(!strict.find_best_match(&query(&[1.0, 0.0]), &gallery).is_match());
        assert!(DualMetricMatcher::default().find_best_match(&query(&[1.0, 0.0]), &gallery).is_match());
    }

    #[test]
    fn test_matcher_is_pure() {
        let gallery = vec![identity("a", vec![0.9, 0.1, 0.2]), identity("b", vec![0.1, 0.9, 0.3])];
        let p = query(&[1.0, 0.2, 0.1]);
        let snapshot = gallery.clone();
        let m = DualMetricMatcher::default();
        let first = m.find_best_match(&p, &gallery);
        let second = m.find_best_match(&p, &gallery);
        assert_eq!(first, second);
        assert_eq!(gallery, snapshot);
    }
}
