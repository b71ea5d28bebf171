//! Text normalization shared by the map phase: Project Gutenberg boilerplate
//! stripping, word pre-processing and sort-key derivation.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod gutenberg;
mod stopwords;

pub use stopwords::is_stopword;

/// Punctuation trimmed from the ends of a word before filtering.
const TRIM_CHARS: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '\'', '"'];

/// Normalize one whitespace-separated token into an anagram candidate.
///
/// The token is lowercased and has punctuation and whitespace trimmed from
/// both ends. `None` is returned for tokens that are empty after trimming,
/// are stopwords, or contain any non-letter character (Unicode letters such
/// as `ç` are accepted; digits and symbols are not).
///
/// The function is idempotent: feeding a returned word back in yields the
/// same word.
pub fn pre_process_word(word: &str) -> Option<String> {
    let word = word.to_lowercase();
    let word = word.trim_matches(|c: char| TRIM_CHARS.contains(&c) || c.is_whitespace());

    if word.is_empty() || is_stopword(word) || !word.chars().all(char::is_alphabetic) {
        return None;
    }
    Some(word.to_string())
}

/// The characters of `word` sorted ascending, i.e. the key under which all
/// anagrams of `word` group together.
pub fn sorted_letters(word: &str) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(pre_process_word("TestString."), Some("teststring".to_string()));
        assert_eq!(pre_process_word("  (Hello!)  "), Some("hello".to_string()));
        assert_eq!(pre_process_word("\"'quoted'\""), Some("quoted".to_string()));
    }

    #[test]
    fn rejects_words_with_digits_or_symbols() {
        assert_eq!(pre_process_word("Test1String"), None);
        assert_eq!(pre_process_word("foo-bar"), None);
        assert_eq!(pre_process_word("o'clock"), None);
    }

    #[test]
    fn rejects_stopwords() {
        assert_eq!(pre_process_word("Would've"), None);
        assert_eq!(pre_process_word("The"), None);
        assert_eq!(pre_process_word("'Tis"), None);
    }

    #[test]
    fn rejects_empty_after_trimming() {
        assert_eq!(pre_process_word(""), None);
        assert_eq!(pre_process_word("..."), None);
        assert_eq!(pre_process_word("?!"), None);
    }

    #[test]
    fn accepts_unicode_letters() {
        assert_eq!(pre_process_word("garçon"), Some("garçon".to_string()));
        assert_eq!(pre_process_word("Ætheling"), Some("ætheling".to_string()));
    }

    #[test]
    fn pre_processing_is_idempotent() {
        for word in ["TestString.", "(Hello)", "garçon", "fox", "Quick!"] {
            let once = pre_process_word(word).unwrap();
            assert_eq!(pre_process_word(&once), Some(once.clone()));
        }
    }

    #[test]
    fn sorted_letters_orders_ascending() {
        assert_eq!(sorted_letters("quick"), "cikqu");
        assert_eq!(sorted_letters("brown"), "bnorw");
        assert_eq!(sorted_letters("fox"), "fox");
        assert_eq!(sorted_letters(""), "");
    }

    #[test]
    fn anagrams_share_a_sort_key() {
        assert_eq!(sorted_letters("care"), sorted_letters("race"));
        assert_eq!(sorted_letters("part"), sorted_letters("trap"));
        assert_ne!(sorted_letters("part"), sorted_letters("race"));
    }
}
