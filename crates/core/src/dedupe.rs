use crate::chunking::normalize;
use crate::models::Hit;
use std::collections::HashSet;

pub const DEFAULT_HEAD_LEN: usize = 200;

/// Drops near-duplicate hits that share a page and the same first
/// `head_len` characters of normalized snippet, keeping the lowest distance.
///
/// Overlapping index windows make such duplicates common. Hits that diverge
/// only after `head_len` characters are still treated as duplicates.
pub fn dedupe_hits(hits: Vec<Hit>, head_len: usize) -> Vec<Hit> {
    let mut ordered = hits;
    ordered.sort_by(|left, right| left.distance.total_cmp(&right.distance));

    let mut seen = HashSet::<(u32, String)>::new();
    ordered
        .into_iter()
        .filter(|hit| {
            let head = normalize(&hit.snippet).chars().take(head_len).collect::<String>();
            seen.insert((hit.page, head))
        })
        .collect()
}
