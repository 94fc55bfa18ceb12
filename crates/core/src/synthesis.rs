//! Extractive answer synthesis.
//!
//! Sentences from the retrieved snippets are scored against the question's
//! vocabulary, the best distinct ones are concatenated verbatim, and each
//! picked sentence contributes one citation.

use crate::chunking::normalize;
use crate::models::{CandidateSentence, Citation, Hit, SynthesizedAnswer};
use crate::sentences::{split_sentences, word_tokens, TokenSet};
use std::collections::HashSet;

pub const DEFAULT_MAX_SENTENCES: usize = 3;

/// Below this many candidates, zero-overlap sentences are still collected so
/// that poor matches yield some answer.
const MIN_CANDIDATES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentenceScore {
    pub overlap: usize,
    pub value: f64,
}

pub trait SentenceScorer: Send + Sync {
    fn score(&self, question: &TokenSet, sentence: &TokenSet) -> SentenceScore;
}

/// `|q ∩ s| / (1 + |s|)`: favours short, topically dense sentences.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapScorer;

impl SentenceScorer for OverlapScorer {
    fn score(&self, question: &TokenSet, sentence: &TokenSet) -> SentenceScore {
        let overlap = question.intersection(sentence).count();
        SentenceScore {
            overlap,
            value: overlap as f64 / (1.0 + sentence.len() as f64),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Synthesizer<S = OverlapScorer> {
    scorer: S,
}

impl<S: SentenceScorer> Synthesizer<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    pub fn synthesize(&self, question: &str, hits: &[Hit], max_sentences: usize) -> SynthesizedAnswer {
        let Some(first) = hits.first() else {
            return SynthesizedAnswer::default();
        };
        if max_sentences == 0 {
            return SynthesizedAnswer::default();
        }

        let mut candidates = self.candidates(question, hits);
        // Stable sort: equal scores keep encounter order.
        candidates.sort_by(|left, right| right.score.total_cmp(&left.score));

        let mut seen = HashSet::new();
        let mut picked: Vec<(String, Citation)> = Vec::new();
        for candidate in candidates {
            if picked.len() >= max_sentences {
                break;
            }
            if !seen.insert(candidate.sentence.to_lowercase()) {
                continue;
            }
            picked.push((
                candidate.sentence,
                Citation {
                    page: candidate.page,
                    title: candidate.title,
                },
            ));
        }

        if picked.is_empty() {
            picked.push((
                normalize(&first.snippet),
                Citation {
                    page: first.page,
                    title: first.title.clone(),
                },
            ));
        }

        let answer = picked
            .iter()
            .map(|(sentence, _)| sentence.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        SynthesizedAnswer {
            answer,
            citations: picked.into_iter().map(|(_, citation)| citation).collect(),
        }
    }

    pub fn candidates(&self, question: &str, hits: &[Hit]) -> Vec<CandidateSentence> {
        let question_tokens = word_tokens(question);
        let mut candidates = Vec::new();

        for hit in hits {
            for sentence in split_sentences(&hit.snippet) {
                let tokens = word_tokens(&sentence);
                if tokens.is_empty() {
                    continue;
                }

                let score = self.scorer.score(&question_tokens, &tokens);
                if score.overlap > 0 || candidates.len() < MIN_CANDIDATES {
                    candidates.push(CandidateSentence {
                        score: score.value,
                        sentence,
                        page: hit.page,
                        title: hit.title.clone(),
                    });
                }
            }
        }

        candidates
    }
}

pub fn synthesize(question: &str, hits: &[Hit], max_sentences: usize) -> SynthesizedAnswer {
    Synthesizer::<OverlapScorer>::default().synthesize(question, hits, max_sentences)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(page: u32, snippet: &str) -> Hit {
        Hit {
            snippet: snippet.to_string(),
            doc_id: "manual".to_string(),
            title: "manual.pdf".to_string(),
            page,
            distance: 0.3,
        }
    }

    #[test]
    fn empty_hits_give_empty_answer() {
        let answer = synthesize("anything", &[], DEFAULT_MAX_SENTENCES);
        assert_eq!(answer.answer, "");
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn warranty_sentence_is_answered_and_cited() {
        let hits = vec![
            hit(7, "Contact support for RMA requests. Shipping labels are emailed."),
            hit(
                3,
                "Registration is optional. The warranty period is 24 months. Keep your receipt.",
            ),
        ];

        let answer = synthesize("How long is the warranty?", &hits, 3);

        assert!(answer.answer.contains("The warranty period is 24 months."));
        assert!(answer.citations.iter().any(|citation| citation.page == 3));
        assert!(answer.answer.starts_with("The warranty period is 24 months."));
        assert_eq!(answer.citations[0].page, 3);
    }

    #[test]
    fn never_exceeds_max_sentences_or_repeats() {
        let hits = vec![
            hit(1, "Pumps need oil. PUMPS NEED OIL. Pumps need grease. Pumps run hot."),
            hit(2, "pumps need oil. Pumps hum."),
        ];

        let answer = synthesize("Do pumps need oil?", &hits, 3);

        assert!(answer.citations.len() <= 3);
        let lowered = answer.answer.to_lowercase();
        assert_eq!(lowered.matches("pumps need oil.").count(), 1);
    }

    #[test]
    fn zero_max_sentences_gives_empty_answer() {
        let hits = vec![hit(3, "The warranty period is 24 months. Nothing else matters.")];
        let answer = synthesize("warranty period", &hits, 0);
        assert!(answer.answer.is_empty());
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn citations_follow_pick_order_without_page_dedup() {
        let hits = vec![hit(4, "Valve A opens. Valve B closes.")];

        let answer = synthesize("valve", &hits, 3);

        assert_eq!(answer.citations.len(), 2);
        assert!(answer.citations.iter().all(|citation| citation.page == 4));
    }

    #[test]
    fn zero_overlap_still_collects_first_candidates() {
        let hits = vec![hit(2, "Alpha one. Beta two. Gamma three. Delta four. Epsilon five.")];

        let synthesizer = Synthesizer::<OverlapScorer>::default();
        let candidates = synthesizer.candidates("unrelated question", &hits);

        assert_eq!(candidates.len(), MIN_CANDIDATES);
        let answer = synthesizer.synthesize("unrelated question", &hits, 2);
        assert_eq!(answer.answer, "Alpha one. Beta two.");
    }

    #[test]
    fn falls_back_to_first_snippet_when_nothing_scores() {
        let hits = vec![hit(9, " ... "), hit(10, "")];

        let answer = synthesize("question", &hits, 3);

        assert_eq!(answer.answer, "...");
        assert_eq!(
            answer.citations,
            vec![Citation {
                page: 9,
                title: "manual.pdf".to_string()
            }]
        );
    }

    #[test]
    fn scorer_is_pluggable() {
        struct LongestFirst;

        impl SentenceScorer for LongestFirst {
            fn score(&self, _question: &TokenSet, sentence: &TokenSet) -> SentenceScore {
                SentenceScore {
                    overlap: 1,
                    value: sentence.len() as f64,
                }
            }
        }

        let hits = vec![hit(1, "Short. A much longer sentence here.")];
        let answer = Synthesizer::new(LongestFirst).synthesize("q", &hits, 1);
        assert_eq!(answer.answer, "A much longer sentence here.");
    }

    #[test]
    fn overlap_score_is_length_normalized() {
        let question = word_tokens("warranty period");
        let short = OverlapScorer.score(&question, &word_tokens("Warranty period applies."));
        let long = OverlapScorer.score(
            &question,
            &word_tokens("The warranty period applies to every single registered unit."),
        );
        assert_eq!(short.overlap, 2);
        assert_eq!(long.overlap, 2);
        assert!(short.value > long.value);
    }
}
