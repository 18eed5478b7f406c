// Reciprocal Rank Fusion (RRF)

use std::collections::{HashMap, HashSet};

use crate::types::FusedResult;

/// Standard RRF constant (Cormack, Clarke & Buettcher, SIGIR 2009).
///
/// Larger values flatten the score curve so late positions count almost as
/// much as early ones; smaller values favour the head of each list.
pub const DEFAULT_RRF_K: usize = 60;

/// Merge any number of ranked lists into one ranking.
///
/// An item at 0-based position `p` of a list contributes `1 / (k + p + 1)`;
/// its score is the sum over every list it appears in. An id repeated within
/// one list only counts at its first position. Output is sorted by score,
/// descending, with ties kept in order of first appearance across the inputs.
pub fn fuse<S: AsRef<str>>(lists: &[Vec<S>], k: usize) -> Vec<FusedResult> {
    let k = k as f64;
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<FusedResult> = Vec::new();

    for list in lists {
        let mut seen_in_list: HashSet<usize> = HashSet::with_capacity(list.len());
        for (position, id) in list.iter().enumerate() {
            let id = id.as_ref();
            let slot = *slots.entry(id).or_insert_with(|| {
                fused.push(FusedResult { id: id.to_string(), score: 0.0 });
                fused.len() - 1
            });
            if !seen_in_list.insert(slot) {
                continue;
            }
            fused[slot].score += 1.0 / (k + position as f64 + 1.0);
        }
    }

    // Stable sort keeps first-appearance order among equal scores.
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}
