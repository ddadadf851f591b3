//! String similarity scoring for fuzzy device matching.
//!
//! Device names arrive with whitespace and punctuation noise ("EOS-R5 " vs
//! "EOS R5"), so database lookups score candidates instead of testing
//! equality. The strategy is selected once at construction: the
//! edit-distance scorer (strsim's Levenshtein) is the default, with a naive
//! character-position scorer available as a degraded fallback.

/// How similarity between two strings is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityStrategy {
    /// Normalized Levenshtein distance: `1 - distance / max_len`.
    #[default]
    EditDistance,
    /// Count of position-aligned matching characters over the longer length.
    CharacterMatch,
}

impl SimilarityStrategy {
    /// Score similarity between two strings in `[0, 1]`.
    ///
    /// Comparison is case-insensitive. Containment in either direction
    /// short-circuits to 0.9 before the strategy runs, which keeps model
    /// prefixes ("EOS R5" vs "Canon EOS R5") scoring high under both
    /// strategies.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let a = a.to_lowercase();
        let b = b.to_lowercase();

        if a == b {
            return 1.0;
        }
        if a.contains(&b) || b.contains(&a) {
            return 0.9;
        }

        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 1.0;
        }

        match self {
            SimilarityStrategy::EditDistance => {
                1.0 - (strsim::levenshtein(&a, &b) as f64 / max_len as f64)
            }
            SimilarityStrategy::CharacterMatch => {
                let matches = a
                    .chars()
                    .zip(b.chars())
                    .filter(|(ca, cb)| ca == cb)
                    .count();
                matches as f64 / max_len as f64
            }
        }
    }
}
