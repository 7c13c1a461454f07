//! Embedding vectors and the distance metrics used to compare them.
//!
//! An [`Embedding`] is whatever the embedder produced. A
//! [`NormalizedEmbedding`] can only be obtained through
//! [`Embedding::normalize`], so every comparison in the matcher happens
//! between two vectors that are unit length or exactly all-zero.

use serde::{Deserialize, Serialize};

/// Raw face embedding as produced by the embedder (typically 512-dimensional).
///
/// An empty embedding means "no signature available" and is never treated
/// as a zero vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean norm of the raw values.
    pub fn norm(&self) -> f32 {
        l2_norm(&self.values)
    }

    /// Scale to unit length.
    ///
    /// A zero-norm input yields an all-zero vector of the same length. The
    /// matcher refuses to match such a vector, whether query or stored.
    pub fn normalize(&self) -> NormalizedEmbedding {
        let norm = self.norm();
        if norm == 0.0 {
            tracing::warn!(dim = self.values.len(), "embedding has zero norm; using zero vector");
            return NormalizedEmbedding {
                values: vec![0.0; self.values.len()],
            };
        }
        NormalizedEmbedding {
            values: self.values.iter().map(|v| v / norm).collect(),
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// Unit-length embedding, or the all-zero fallback for degenerate input.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEmbedding {
    values: Vec<f32>,
}

impl NormalizedEmbedding {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when normalization fell back to the zero vector.
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Euclidean distance to `other`.
    pub fn euclidean_distance(&self, other: &NormalizedEmbedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// Returns -1.0 when either side has zero norm so a degenerate vector can
    /// never be accepted on this metric.
    pub fn similarity(&self, other: &NormalizedEmbedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return -1.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}
