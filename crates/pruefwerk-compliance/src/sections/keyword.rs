// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keyword span heuristic: a section covers every page from its first keyword
// hit to its last. Hits on pages 3 and 9 count as 7 pages, even when nothing
// in between mentions the section. Cheap and predictable, not a boundary
// detector.

use async_trait::async_trait;
use pruefwerk_core::config::SectionRule;
use pruefwerk_core::error::PruefwerkError;
use pruefwerk_core::{Page, SectionCounts, SectionWindow};
use tracing::{debug, instrument};

use super::{SectionDetector, normalize};

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordDetector;

impl KeywordDetector {
    pub fn new() -> Self {
        Self
    }

    /// Pages on which each section's phrases occur, in policy order.
    #[instrument(skip_all, fields(pages = pages.len(), sections = sections.len()))]
    pub fn windows(&self, pages: &[Page], sections: &[SectionRule]) -> Vec<SectionWindow> {
        let texts: Vec<(u32, String)> = pages
            .iter()
            .map(|page| (page.index, normalize(&page.text)))
            .collect();

        sections
            .iter()
            .map(|rule| {
                let phrases: Vec<String> = rule
                    .search_phrases()
                    .iter()
                    .map(|phrase| normalize(phrase))
                    .collect();
                let mut window = SectionWindow::new(normalize(&rule.name));
                for (index, text) in &texts {
                    if phrases.iter().any(|phrase| text.contains(phrase.as_str())) {
                        window.record(*index);
                    }
                }
                debug!(section = %window.name, hits = ?window.pages, "keyword hits");
                window
            })
            .collect()
    }

    pub fn counts(&self, pages: &[Page], sections: &[SectionRule]) -> SectionCounts {
        self.windows(pages, sections)
            .into_iter()
            .map(|window| {
                let span = window.page_span();
                (window.name, span)
            })
            .collect()
    }
}

#[async_trait]
impl SectionDetector for KeywordDetector {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn detect(
        &self,
        pages: &[Page],
        sections: &[SectionRule],
    ) -> Result<SectionCounts, PruefwerkError> {
        Ok(self.counts(pages, sections))
    }
}
