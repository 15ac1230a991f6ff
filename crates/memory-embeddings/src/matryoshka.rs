//! Dimension truncation for search-time vectors (spec §4.D). Full-width
//! embeddings are stored; a truncated, renormalized prefix is used for the
//! coarse nearest-neighbor pass so candidate generation is cheaper.

use memory_core::error::{MemoryError, MemoryResult};

pub const SEARCH_DIMS_SMALL: usize = 256;
pub const SEARCH_DIMS_MEDIUM: usize = 384;

/// Truncates `v` to `dims` and renormalizes to unit length. A zero vector
/// stays zero rather than producing NaN.
pub fn truncate(v: &[f32], dims: usize) -> MemoryResult<Vec<f32>> {
    if dims > v.len() {
        return Err(MemoryError::InvalidInput(format!(
            "cannot truncate a {}-d vector to {dims} dims",
            v.len()
        )));
    }
    let mut out = v[..dims].to_vec();
    let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in out.iter_mut() {
            *x /= norm;
        }
    }
    Ok(out)
}

pub fn validate_dimensions(v: &[f32], expected: usize) -> MemoryResult<()> {
    if v.len() != expected {
        return Err(MemoryError::InvalidInput(format!(
            "expected a {expected}-d vector, got {}",
            v.len()
        )));
    }
    Ok(())
}

/// Cosine similarity over the shared prefix when lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb)).clamp(-1.0, 1.0)
}
