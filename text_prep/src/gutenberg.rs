//! Heuristic removal of Project Gutenberg boilerplate.
//!
//! Input books carry a licensing preamble and trailer that would otherwise
//! pollute the anagram groups. The markers come in two dialects; the exact
//! patterns below are load-bearing and must not be "fixed": fixtures depend
//! on the prose-form trailer winning over the starred form when both appear.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*.*START OF TH(E|IS) PROJECT GUTENBERG EBOOK.*\*\*\*")
        .expect("header pattern is valid")
});

static FOOTER_PROSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"End of[ th(e|is)]* Project Gutenberg").expect("footer pattern is valid"));

static FOOTER_MARKED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*.*END OF TH(E|IS) PROJECT GUTENBERG EBOOK.*\*\*\*")
        .expect("footer pattern is valid")
});

/// Strip the Gutenberg preamble and trailer from `text`, returning the book
/// body.
///
/// The preamble is everything up to and including the starred START marker
/// plus the character that follows it; the trailer starts at the prose-form
/// `End of … Project Gutenberg` line, or failing that at the starred END
/// marker. Text without markers is returned unchanged.
pub fn strip_header_and_footer(text: &str) -> &str {
    let text = match HEADER.find(text) {
        Some(m) => {
            let rest = &text[m.end()..];
            rest.char_indices().nth(1).map_or("", |(i, _)| &rest[i..])
        }
        None => text,
    };

    if let Some(m) = FOOTER_PROSE.find(text) {
        return &text[..m.start()];
    }
    match FOOTER_MARKED.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "the quick brown fox\njumps over the lazy dog\n";

    #[test]
    fn strips_header() {
        let text = format!(
            "some legalese\n*** START OF THE PROJECT GUTENBERG EBOOK DRACULA ***\n{BODY}"
        );
        assert_eq!(strip_header_and_footer(&text), BODY);
    }

    #[test]
    fn strips_this_dialect_header() {
        let text = format!(
            "preamble\n***START OF THIS PROJECT GUTENBERG EBOOK***\n{BODY}"
        );
        assert_eq!(strip_header_and_footer(&text), BODY);
    }

    #[test]
    fn strips_prose_footer() {
        let text = format!("{BODY}End of the Project Gutenberg EBook of Dracula\nlegalese\n");
        assert_eq!(strip_header_and_footer(&text), BODY);
    }

    #[test]
    fn strips_marked_footer() {
        let text = format!("{BODY}*** END OF THE PROJECT GUTENBERG EBOOK DRACULA ***\nlegalese\n");
        assert_eq!(strip_header_and_footer(&text), BODY);
    }

    #[test]
    fn prose_footer_wins_over_marked_footer() {
        // Both trailers present: the prose form decides the cut even though
        // the starred form appears first in the text.
        let text = format!(
            "{BODY}*** END OF THE PROJECT GUTENBERG EBOOK DRACULA ***\nEnd of the Project Gutenberg EBook\n"
        );
        let stripped = strip_header_and_footer(&text);
        assert!(stripped.starts_with(BODY));
        assert!(stripped.contains("END OF THE PROJECT GUTENBERG EBOOK"));
        assert!(!stripped.contains("End of the"));
    }

    #[test]
    fn strips_both_ends() {
        let text = format!(
            "preamble\n*** START OF THE PROJECT GUTENBERG EBOOK ***\n{BODY}End of Project Gutenberg\n"
        );
        assert_eq!(strip_header_and_footer(&text), BODY);
    }

    #[test]
    fn text_without_markers_is_unchanged() {
        assert_eq!(strip_header_and_footer(BODY), BODY);
    }

    #[test]
    fn header_at_end_of_text_leaves_nothing() {
        let text = "preamble\n*** START OF THE PROJECT GUTENBERG EBOOK ***";
        assert_eq!(strip_header_and_footer(text), "");
    }
}
