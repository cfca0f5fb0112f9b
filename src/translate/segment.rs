//! Token-budget segmentation.
//!
//! Text longer than the budget is cut into consecutive, non-overlapping token
//! runs. Translated pieces are rejoined with a single space in input order.

/// Consecutive token runs of at most `budget` tokens covering `tokens` exactly once
pub fn split_tokens(tokens: &[String], budget: usize) -> Vec<&[String]> {
    if tokens.is_empty() {
        return Vec::new();
    }
    tokens.chunks(budget.max(1)).collect()
}

pub fn rejoin<S: AsRef<str>>(pieces: &[S]) -> String {
    pieces
        .iter()
        .map(|piece| piece.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}
