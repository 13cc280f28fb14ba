//! Edit-distance closest-match selection.

use crate::naming::normalize_name;

/// Return the candidate whose normalized name is closest to `query`.
///
/// `query` is expected to be normalized already. Distance is Levenshtein over
/// Unicode scalar values; ties go to the candidate that appears first. The
/// input is not reordered. Returns `None` only when `candidates` is empty.
pub fn closest_match<'a, T, F>(query: &str, candidates: &'a [T], name_of: F) -> Option<&'a T>
where
    F: Fn(&T) -> &str,
{
    let mut best: Option<(&'a T, usize)> = None;

    for candidate in candidates {
        let distance = strsim::levenshtein(query, &normalize_name(name_of(candidate)));
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(candidate, _)| candidate)
}
