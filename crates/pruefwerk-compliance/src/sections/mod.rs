// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Section detection: maps each policy section to the number of pages it
// spans, either from keyword hits or from an external text-generation model.

use async_trait::async_trait;
use pruefwerk_core::config::SectionRule;
use pruefwerk_core::error::PruefwerkError;
use pruefwerk_core::{Page, SectionCounts};

pub mod keyword;
pub mod semantic;

pub use keyword::KeywordDetector;
pub use semantic::{GeminiClient, SemanticDetector, TextGenerator};

/// Common contract of every section detection strategy.
///
/// Counts are keyed by the lowercase section name. A section the detector
/// has nothing to say about may be absent; callers read absence as 0.
#[async_trait]
pub trait SectionDetector: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn detect(
        &self,
        pages: &[Page],
        sections: &[SectionRule],
    ) -> Result<SectionCounts, PruefwerkError>;
}

/// Lowercase and collapse runs of whitespace to single spaces.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
