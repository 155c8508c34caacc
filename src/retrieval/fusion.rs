//! Weighted score fusion of the vector and lexical hit lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::types::{CandidatePassage, FusionMode};
use crate::knowledge::StoreHit;

#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub vector: f32,
    pub lexical: f32,
    pub min_vector_similarity: f32,
}

/// Fuses both lists into one ranking.
///
/// Vector scores are clamped cosine similarities; hits under `min_vector_similarity` are
/// dropped. Lexical scores are divided by the list maximum. A passage present in one list
/// keeps that list's weighted score. When one list is empty the other carries full weight.
pub fn fuse(
    vector: &[StoreHit],
    lexical: &[StoreHit],
    weights: FusionWeights,
) -> (Vec<CandidatePassage>, FusionMode) {
    let vector_scores = best_by_id(vector.iter().filter_map(|hit| {
        let score = finite_or_zero(hit.score).clamp(0.0, 1.0);
        (score >= weights.min_vector_similarity).then_some((hit, score))
    }));

    let lexical_max = lexical
        .iter()
        .map(|h| finite_or_zero(h.score))
        .fold(0.0f32, f32::max);
    let lexical_scores = if lexical_max > 0.0 {
        best_by_id(lexical.iter().filter_map(|hit| {
            let score = finite_or_zero(hit.score);
            (score > 0.0).then_some((hit, score / lexical_max))
        }))
    } else {
        HashMap::new()
    };

    let (w_v, w_l, mode) = match (vector_scores.is_empty(), lexical_scores.is_empty()) {
        (false, false) => (weights.vector, weights.lexical, FusionMode::Hybrid),
        (false, true) => (1.0, 0.0, FusionMode::VectorOnly),
        (true, false) => (0.0, 1.0, FusionMode::LexicalOnly),
        (true, true) => return (Vec::new(), FusionMode::Empty),
    };

    let mut merged: HashMap<&str, CandidatePassage> = HashMap::new();
    for (&id, &(hit, score)) in &vector_scores {
        let mut c = candidate(hit);
        c.vector_score = Some(score);
        merged.insert(id, c);
    }
    for (&id, &(hit, score)) in &lexical_scores {
        merged
            .entry(id)
            .or_insert_with(|| candidate(hit))
            .lexical_score = Some(score);
    }

    let mut fused: Vec<CandidatePassage> = merged
        .into_values()
        .map(|mut c| {
            c.fused_score = w_v * c.vector_score.unwrap_or(0.0) + w_l * c.lexical_score.unwrap_or(0.0);
            c
        })
        .collect();
    sort_fused(&mut fused);
    (fused, mode)
}

/// Fused score descending, then newer `updated_at`, then id ascending.
pub fn sort_fused(candidates: &mut [CandidatePassage]) {
    candidates.sort_by(compare_fused);
}

pub fn compare_fused(a: &CandidatePassage, b: &CandidatePassage) -> Ordering {
    b.fused_score
        .partial_cmp(&a.fused_score)
        .unwrap_or(Ordering::Equal)
        // Some(_) > None, so dated passages outrank undated ones on a tie.
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn best_by_id<'a>(
    hits: impl Iterator<Item = (&'a StoreHit, f32)>,
) -> HashMap<&'a str, (&'a StoreHit, f32)> {
    let mut best: HashMap<&str, (&StoreHit, f32)> = HashMap::new();
    for (hit, score) in hits {
        best.entry(hit.passage_id.as_str())
            .and_modify(|cur| {
                if score > cur.1 {
                    *cur = (hit, score);
                }
            })
            .or_insert((hit, score));
    }
    best
}

fn candidate(hit: &StoreHit) -> CandidatePassage {
    CandidatePassage {
        id: hit.passage_id.clone(),
        content: hit.content.clone(),
        source_document: hit.source_document.clone(),
        updated_at: hit.updated_at,
        vector_score: None,
        lexical_score: None,
        fused_score: 0.0,
        rerank_score: None,
    }
}

#[inline]
fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}
