//! Dense vector helpers shared by the semantic cache and the in-memory knowledge store.

/// Cosine similarity in `[-1, 1]`. Returns `0.0` for mismatched lengths or zero vectors.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Non-empty and every component finite.
#[inline]
pub fn is_well_formed(v: &[f32]) -> bool {
    !v.is_empty() && v.iter().all(|x| x.is_finite())
}
