//! The stopword table applied during word pre-processing.
//!
//! Treat this as configuration data: entries are compared against the
//! already-lowercased, punctuation-trimmed word.

use once_cell::sync::Lazy;
use std::collections::HashSet;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORD_LIST.iter().copied().collect());

/// Returns true if `word` is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

#[rustfmt::skip]
const STOPWORD_LIST: &[&str] = &[
    "'tis", "'twas", "a", "able", "about", "across", "after", "ain't", "all",
    "almost", "also", "am", "among", "an", "and", "any", "are", "aren't",
    "as", "at", "be", "because", "been", "but", "by", "can", "can't",
    "cannot", "could", "could've", "couldn't", "dear", "did", "didn't", "do",
    "does", "doesn't", "don't", "either", "else", "ever", "every", "for",
    "from", "get", "got", "had", "has", "hasn't", "have", "he", "he'd",
    "he'll", "he's", "her", "hers", "him", "his", "how", "how'd", "how'll",
    "how's", "however", "i", "i'd", "i'll", "i'm", "i've", "if", "in",
    "into", "is", "isn't", "it", "it's", "its", "just", "least", "let",
    "like", "likely", "may", "me", "might", "might've", "mightn't", "most",
    "must", "must've", "mustn't", "my", "neither", "no", "nor", "not", "of",
    "off", "often", "on", "only", "or", "other", "our", "own", "rather",
    "said", "say", "says", "shan't", "she", "she'd", "she'll", "she's",
    "should", "should've", "shouldn't", "since", "so", "some", "than",
    "that", "that'll", "that's", "the", "their", "them", "then", "there",
    "there's", "these", "they", "they'd", "they'll", "they're", "they've",
    "this", "tis", "to", "too", "twas", "us", "wants", "was", "wasn't",
    "we", "we'd", "we'll", "we're", "were", "weren't", "what", "what'd",
    "what's", "when", "when'd", "when'll", "when's", "where", "where'd",
    "where'll", "where's", "which", "while", "who", "who'd", "who'll",
    "who's", "whom", "why", "why'd", "why'll", "why's", "will", "with",
    "won't", "would", "would've", "wouldn't", "yet", "you", "you'd",
    "you'll", "you're", "you've", "your",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contractions_and_function_words_are_stopwords() {
        for word in ["the", "would've", "'tis", "shan't", "you'll"] {
            assert!(is_stopword(word), "{word} should be a stopword");
        }
    }

    #[test]
    fn content_words_are_not_stopwords() {
        for word in ["quick", "brown", "fox", "dracula"] {
            assert!(!is_stopword(word), "{word} should not be a stopword");
        }
    }

    #[test]
    fn table_has_no_duplicates() {
        assert_eq!(STOPWORD_LIST.len(), STOPWORDS.len());
    }
}
