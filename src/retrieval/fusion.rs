//! Reciprocal Rank Fusion.
//!
//! Score-free merge of ranked lists: a document at 0-based rank `r` in one
//! list contributes `1 / (k + r)`; contributions sum across lists. Fusion is
//! commutative over the input lists, so hybrid legs may finish in any order
//! without changing the merged result.

use std::collections::HashMap;

use crate::store::PointId;

use super::types::SearchResultItem;

struct FusedEntry {
    item: SearchResultItem,
    rrf: f64,
    best_base_score: f32,
}

/// Fuses ranked result lists into one list ordered by summed RRF score.
///
/// Ties break on the higher base score seen for the document, then on id.
/// Every output item carries `rrf_score`; `score` keeps the best base score;
/// `degraded` is OR'd across the contributing lists (with reasons merged).
pub fn rrf_fuse(result_sets: Vec<Vec<SearchResultItem>>, k: usize) -> Vec<SearchResultItem> {
    let mut fused: HashMap<PointId, FusedEntry> = HashMap::new();

    for result_set in result_sets {
        for (rank, item) in result_set.into_iter().enumerate() {
            let contribution = 1.0 / (k + rank) as f64;

            match fused.get_mut(&item.id) {
                Some(entry) => {
                    entry.rrf += contribution;
                    entry.best_base_score = entry.best_base_score.max(item.score);
                    entry.item.score = entry.best_base_score;

                    if item.degraded {
                        entry
                            .item
                            .mark_degraded(item.degraded_reason.as_deref().unwrap_or("degraded"));
                    }
                }
                None => {
                    let best_base_score = item.score;
                    fused.insert(
                        item.id.clone(),
                        FusedEntry {
                            item,
                            rrf: contribution,
                            best_base_score,
                        },
                    );
                }
            }
        }
    }

    let mut entries: Vec<FusedEntry> = fused.into_values().collect();

    entries.sort_by(|a, b| {
        b.rrf
            .partial_cmp(&a.rrf)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.best_base_score
                    .partial_cmp(&a.best_base_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.item.id.cmp(&b.item.id))
    });

    entries
        .into_iter()
        .map(|entry| {
            let mut item = entry.item;
            item.rrf_score = Some(entry.rrf as f32);
            item
        })
        .collect()
}
