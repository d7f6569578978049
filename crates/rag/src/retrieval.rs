use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub index: usize,
    pub score: f32,
    pub text: String,
}

/// Scores every row against `query` and keeps the best `top_k`, highest score
/// first. Equal scores keep the lower row index first.
pub fn rank_top_k(query: &[f32], rows: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (idx, cosine_similarity(query, row)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k.min(rows.len()));
    scored
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}
