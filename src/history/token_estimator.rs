//! Deterministic, model-agnostic token estimation

/// Token estimator trait for different estimation heuristics
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }
}

/// Character-based estimator: one token per ~4 characters, rounded up.
///
/// Deterministic and independent of any model vocabulary. Absolute values are
/// within roughly ±25% of common BPE tokenizers for English prose, which is
/// acceptable because every strategy uses the same estimator, so relative
/// budget comparisons stay internally consistent.
pub struct CharBasedEstimator {
    chars_per_token: usize,
}

impl CharBasedEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharBasedEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_token)
    }
}

/// Word-based estimator (~1.3 tokens per word), alternative heuristic
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_based_empty_text_is_zero() {
        let estimator = CharBasedEstimator::default();
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_char_based_rounds_up() {
        let estimator = CharBasedEstimator::default();
        assert_eq!(estimator.estimate("abcd"), 1);
        assert_eq!(estimator.estimate("abcde"), 2);
        assert_eq!(estimator.estimate("a"), 1);
    }

    #[test]
    fn test_char_based_is_deterministic() {
        let estimator = CharBasedEstimator::default();
        let text = "The same text estimates identically every time.";
        assert_eq!(estimator.estimate(text), estimator.estimate(text));
    }

    #[test]
    fn test_word_based_estimator() {
        let estimator = WordBasedEstimator::default();
        assert_eq!(estimator.estimate("Hello world test"), 4); // 3 * 1.3 -> 4
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_batch_estimation() {
        let estimator = CharBasedEstimator::default();
        let tokens = estimator.estimate_batch(&["abcd", "", "abcdefgh"]);
        assert_eq!(tokens, vec![1, 0, 2]);
    }
}
