//! Punctuation-driven sentence splitting and word tokenization.
//!
//! Splitting is a plain heuristic: a sentence ends at `.`, `!` or `?` followed
//! by whitespace. Abbreviations ("Dr. Smith") and spaced decimals are split
//! too; that is an accepted limitation.

use crate::chunking::normalize;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub type TokenSet = HashSet<String>;

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("boundary pattern is valid"))
}

fn word() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("word pattern is valid"))
}

pub fn split_sentences(raw: &str) -> Vec<String> {
    let text = normalize(raw);
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in sentence_boundary().find_iter(&text) {
        // The terminator is ASCII, so it ends one byte after the match start.
        let end = boundary.start() + 1;
        push_fragment(&mut sentences, &text[start..end]);
        start = boundary.end();
    }
    push_fragment(&mut sentences, &text[start..]);

    sentences
}

fn push_fragment(sentences: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        sentences.push(fragment.to_string());
    }
}

/// Lowercased maximal runs of word characters.
pub fn word_tokens(text: &str) -> TokenSet {
    let lowered = text.to_lowercase();
    word()
        .find_iter(&lowered)
        .map(|token| token.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("The pump failed.  Why?\nCheck the seal! done");
        assert_eq!(
            sentences,
            vec!["The pump failed.", "Why?", "Check the seal!", "done"]
        );
    }

    #[test]
    fn punctuation_without_whitespace_does_not_split() {
        assert_eq!(split_sentences("Version 2.5 ships soon."), vec!["Version 2.5 ships soon."]);
    }

    #[test]
    fn abbreviations_split_as_documented() {
        assert_eq!(split_sentences("Ask Dr. Smith."), vec!["Ask Dr.", "Smith."]);
    }

    #[test]
    fn empty_input_has_no_sentences() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   (cid:9) ").is_empty());
    }

    #[test]
    fn tokens_are_lowercase_words() {
        let tokens = word_tokens("How long is the Warranty? 24-months, RMA_id");
        let expected: TokenSet = ["how", "long", "is", "the", "warranty", "24", "months", "rma_id"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn punctuation_only_has_no_tokens() {
        assert!(word_tokens("... !!! ?").is_empty());
    }
}
