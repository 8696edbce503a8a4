use std::cmp::Ordering;

use common::error::AppError;
use serde::{Deserialize, Serialize};

/// Exact nearest-neighbor structure over a document's chunk embeddings.
///
/// A flat scan with squared Euclidean distance is deliberate: per-document
/// corpora stay in the tens to low hundreds of chunks, so an approximate
/// structure would add complexity without measurable benefit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Builds the index from the full embedding matrix at once. The chunk set
    /// is regenerated wholesale on re-indexing, so there is no append path.
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self, AppError> {
        let dimension = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| AppError::Validation("cannot index an empty embedding set".into()))?;

        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(AppError::Validation(format!(
                "embedding dimension mismatch: expected {dimension}, got {}",
                bad.len()
            )));
        }

        Ok(Self { dimension, vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the `min(k, len)` nearest vector indices by ascending squared
    /// Euclidean distance. Ties are broken by lower chunk index, which keeps
    /// result order a strict function of the input.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, AppError> {
        if query.len() != self.dimension {
            return Err(AppError::Validation(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k.min(self.vectors.len()));
        Ok(scored)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
