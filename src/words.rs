//! Static word pool tables for daily puzzle derivation.
//!
//! The tables are read-only and identical on every execution site. Category
//! order and per-category word order are load-bearing: puzzle derivation
//! consumes them positionally, so any reordering changes the puzzle every
//! seed produces.

/// Schema version of the word pool tables, recorded on stored puzzles.
pub const WORD_POOL_VERSION: &str = "1.0";

/// Category name paired with its ordered candidate words.
pub type Pool = (&'static str, &'static [&'static str]);

/// All word pools in canonical category order.
pub const WORD_POOLS: &[Pool] = &[
    (
        "nature",
        &[
            "mountain", "river", "forest", "ocean", "desert", "valley", "meadow", "canyon",
        ],
    ),
    (
        "weather",
        &[
            "rain", "snow", "wind", "storm", "thunder", "lightning", "fog", "mist",
        ],
    ),
    (
        "time",
        &[
            "dawn", "dusk", "midnight", "noon", "twilight", "sunrise", "sunset", "evening",
        ],
    ),
    (
        "seasons",
        &[
            "spring", "summer", "autumn", "winter", "harvest", "bloom", "frost", "thaw",
        ],
    ),
    (
        "emotions",
        &[
            "joy", "sorrow", "peace", "longing", "wonder", "fear", "hope", "love",
        ],
    ),
    (
        "elements",
        &[
            "fire", "water", "earth", "air", "stone", "flame", "wave", "breeze",
        ],
    ),
    (
        "creatures",
        &["bird", "fish", "deer", "wolf", "bear", "eagle", "fox", "owl"],
    ),
    (
        "plants",
        &[
            "tree", "flower", "grass", "leaf", "seed", "root", "branch", "petal",
        ],
    ),
];

/// Category names in canonical order.
pub fn category_names() -> Vec<&'static str> {
    WORD_POOLS.iter().map(|(name, _)| *name).collect()
}

/// Words of one category, or `None` for an unknown category.
pub fn pool_words(category: &str) -> Option<&'static [&'static str]> {
    WORD_POOLS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, words)| *words)
}

/// Every word across all pools, flattened in canonical order.
pub fn all_words() -> Vec<&'static str> {
    WORD_POOLS
        .iter()
        .flat_map(|(_, words)| words.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_eight_categories_of_eight_words() {
        assert_eq!(WORD_POOLS.len(), 8);
        for (name, words) in WORD_POOLS {
            assert_eq!(words.len(), 8, "category '{}' is not 8 words", name);
        }
    }

    #[test]
    fn test_words_are_unique_across_pools() {
        let flat = all_words();
        let unique: HashSet<_> = flat.iter().copied().collect();
        assert_eq!(flat.len(), 64);
        assert_eq!(unique.len(), 64);
    }

    #[test]
    fn test_words_are_lowercase() {
        for word in all_words() {
            assert_eq!(word, word.to_lowercase());
        }
    }

    #[test]
    fn test_pool_lookup() {
        assert_eq!(pool_words("nature").map(|w| w[0]), Some("mountain"));
        assert_eq!(pool_words("plants").map(|w| w[7]), Some("petal"));
        assert!(pool_words("minerals").is_none());
    }

    #[test]
    fn test_canonical_category_order() {
        assert_eq!(
            category_names(),
            vec![
                "nature",
                "weather",
                "time",
                "seasons",
                "emotions",
                "elements",
                "creatures",
                "plants"
            ]
        );
    }
}
