//! Shared fuzzy matching for alias and entity resolution.
//!
//! Pure functions over in-memory candidates — no network, no side effects.

/// Case-insensitive similarity ratio between two strings, scaled to 0–100.
pub fn similarity(a: &str, b: &str) -> u8 {
    let ratio = strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase());
    (ratio * 100.0).round() as u8
}

/// Best-matching id among `(name, id)` candidates scoring at or above
/// `threshold`.
///
/// Among equally scored candidates the first in iteration order wins;
/// callers must not rely on tie order.
pub fn best_match<'a, I>(phrase: &str, candidates: I, threshold: u8) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut best: Option<(u8, &'a str)> = None;
    for (name, id) in candidates {
        let score = similarity(phrase, name);
        if score >= threshold && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, id));
        }
    }
    best.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_maximal() {
        assert_eq!(similarity("Kitchen Light", "kitchen light"), 100);
        // An exact candidate is selected at any threshold up to the maximum.
        let candidates = [
            ("hallway light", "light.hallway"),
            ("kitchen light", "light.kitchen_main"),
        ];
        assert_eq!(
            best_match("kitchen light", candidates, 100),
            Some("light.kitchen_main")
        );
    }

    #[test]
    fn test_below_threshold_is_none() {
        let candidates = [("garage door", "cover.garage")];
        assert_eq!(best_match("bedroom fan", candidates, 70), None);
    }

    #[test]
    fn test_close_match_wins() {
        let candidates = [
            ("front door lock", "lock.front_door"),
            ("back door lock", "lock.back_door"),
        ];
        assert_eq!(
            best_match("front door", candidates, 70),
            Some("lock.front_door")
        );
    }

    #[test]
    fn test_similarity_is_symmetric_on_case() {
        assert_eq!(similarity("ABC", "abc"), 100);
    }
}
