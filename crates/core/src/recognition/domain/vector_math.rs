//! Similarity primitives over fixed-length embedding vectors.
//!
//! Embeddings are compared by cosine similarity, which for L2-normalized
//! vectors is the plain dot product.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    #[error("cannot compute a centroid of zero vectors")]
    Empty,
    #[error("vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Scales `v` to unit length in place. A zero vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize(&mut out);
    out
}

/// Dot product of L2-normalized vectors equals cosine similarity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum())
}

/// Element-wise mean of `vectors`, normalized to unit length.
pub fn centroid<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Vec<f32>, VectorError> {
    let first = vectors.first().ok_or(VectorError::Empty)?.as_ref();
    let dim = first.len();

    let mut sum = vec![0.0f64; dim];
    for v in vectors {
        let v = v.as_ref();
        if v.len() != dim {
            return Err(VectorError::DimensionMismatch {
                left: dim,
                right: v.len(),
            });
        }
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += *x as f64;
        }
    }

    let count = vectors.len() as f64;
    let mut mean: Vec<f32> = sum.into_iter().map(|s| (s / count) as f32).collect();
    l2_normalize(&mut mean);
    Ok(mean)
}
