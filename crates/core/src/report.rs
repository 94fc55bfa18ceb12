use crate::chunking::normalize;
use crate::extractor::PageText;
use crate::models::IngestionOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: u32,
    pub chars: usize,
    pub words: usize,
    pub snippet: String,
}

/// Per-page extraction sanity check, run on every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfReport {
    pub pages_total: usize,
    pub pages_with_text: usize,
    /// Pages whose normalized text is shorter than the configured minimum.
    pub flagged_pages: Vec<u32>,
    pub preview: Vec<PageReport>,
}

pub fn analyze_pages(pages: &[PageText], options: &IngestionOptions) -> PdfReport {
    let per_page = pages
        .iter()
        .map(|page| {
            let text = normalize(&page.text);
            PageReport {
                page: page.number,
                chars: text.chars().count(),
                words: text.split(' ').filter(|word| !word.is_empty()).count(),
                snippet: text.chars().take(options.preview_chars).collect(),
            }
        })
        .collect::<Vec<_>>();

    let flagged_pages = per_page
        .iter()
        .filter(|page| page.chars < options.min_page_chars)
        .map(|page| page.page)
        .collect::<Vec<_>>();

    PdfReport {
        pages_total: per_page.len(),
        pages_with_text: per_page.len() - flagged_pages.len(),
        flagged_pages,
        preview: per_page.into_iter().take(options.preview_pages).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_text_pages_are_flagged() {
        let pages = (1..=7)
            .map(|number| PageText {
                number,
                text: if number % 2 == 0 {
                    "word ".repeat(40)
                } else {
                    "(cid:5) tiny".to_string()
                },
            })
            .collect::<Vec<_>>();

        let report = analyze_pages(&pages, &IngestionOptions::default());

        assert_eq!(report.pages_total, 7);
        assert_eq!(report.pages_with_text, 3);
        assert_eq!(report.flagged_pages, vec![1, 3, 5, 7]);
        assert_eq!(report.preview.len(), 5);
        assert_eq!(report.preview[0].snippet, "tiny");
        assert_eq!(report.preview[1].words, 40);
        assert_eq!(report.preview[1].snippet.chars().count(), 160);
    }

    #[test]
    fn empty_document_reports_nothing() {
        let report = analyze_pages(&[], &IngestionOptions::default());
        assert_eq!(report.pages_total, 0);
        assert!(report.flagged_pages.is_empty());
        assert!(report.preview.is_empty());
    }
}
