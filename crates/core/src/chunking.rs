use crate::extractor::PageText;
use crate::models::{IngestionOptions, Passage};
use regex::Regex;
use std::sync::OnceLock;

fn cid_artifact() -> &'static Regex {
    static CID: OnceLock<Regex> = OnceLock::new();
    CID.get_or_init(|| Regex::new(r"\(cid:\d+\)").expect("cid pattern is valid"))
}

/// Strips `(cid:N)` glyph artifacts, collapses whitespace and rejoins stray
/// spaces before `.` and `,`. Idempotent.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_string();
    // Removing one artifact can splice together another, e.g. "(ci(cid:1)d:2)".
    while cid_artifact().is_match(&text) {
        text = cid_artifact().replace_all(&text, "").into_owned();
    }

    collapse_whitespace(&text)
        .replace(" .", ".")
        .replace(" ,", ",")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Overlapping word windows over one page of text.
///
/// Built by [`chunk_text`]; calling it again with the same input yields the
/// same windows, and the iterator itself can be cloned to restart.
#[derive(Debug, Clone)]
pub struct WordWindows {
    words: Vec<String>,
    max_words: usize,
    step: usize,
    start: usize,
}

impl Iterator for WordWindows {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.words.len() {
            return None;
        }

        let end = (self.start + self.max_words).min(self.words.len());
        let window = self.words[self.start..end].join(" ");
        self.start = self.start.saturating_add(self.step);
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.words.len().saturating_sub(self.start);
        let windows = remaining.div_ceil(self.step);
        (windows, Some(windows))
    }
}

impl ExactSizeIterator for WordWindows {}

pub fn chunk_text(text: &str, max_words: usize, overlap: usize) -> WordWindows {
    let max_words = max_words.max(1);
    WordWindows {
        words: normalize(text)
            .split(' ')
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect(),
        max_words,
        step: max_words.saturating_sub(overlap).max(1),
        start: 0,
    }
}

/// Turns extracted pages into passages, skipping pages that normalize to
/// nothing. `chunk_index` runs across the whole document.
pub fn build_passages(
    doc_id: &str,
    title: &str,
    pages: &[PageText],
    options: &IngestionOptions,
) -> Vec<Passage> {
    let mut passages = Vec::new();
    let mut cursor = 0u64;

    for page in pages {
        let normalized = normalize(&page.text);
        if normalized.is_empty() {
            continue;
        }

        for window in chunk_text(&normalized, options.max_words, options.overlap_words) {
            passages.push(Passage {
                doc_id: doc_id.to_string(),
                title: title.to_string(),
                page: page.number,
                text: window,
                chunk_index: cursor,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    passages
}

pub fn passage_id(passage: &Passage) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-p{}-{}-{}",
        passage.doc_id,
        passage.page,
        passage.chunk_index,
        &suffix[..6]
    )
}
