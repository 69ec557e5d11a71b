//! The default stop-word list. Loaded once, shared read-only (spec. 5, 9).

use std::collections::HashSet;

use lazy_static::lazy_static;

const WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "among", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "being", "between", "both", "but", "by", "can", "could", "did", "do",
    "does", "during", "each", "for", "from", "further", "had", "has", "have", "having", "he",
    "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
    "is", "it", "its", "itself", "me", "more", "most", "no", "nor", "not", "of", "off", "on",
    "once", "only", "or", "other", "our", "ours", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = WORDS.iter().copied().collect();
}

pub fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("and"));
        assert!(!is_stopword("mitochondria"));
    }
}
