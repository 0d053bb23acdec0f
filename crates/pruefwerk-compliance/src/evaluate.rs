// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compliance evaluation: folds layout verdicts and section page counts into
// the final report. Pure: the same inputs always give the same report.

use std::collections::BTreeMap;

use pruefwerk_core::config::SectionRule;
use pruefwerk_core::{
    ComplianceReport, FormatReport, LayoutVerdicts, Policy, SectionCounts, Verdict,
};

use crate::sections::normalize;

#[derive(Debug, Clone)]
pub struct ComplianceEvaluator {
    policy: Policy,
}

impl ComplianceEvaluator {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Build the report for one document.
    ///
    /// When the file is not a PDF or could not be opened every entry fails
    /// and nothing else is consulted.
    pub fn evaluate(
        &self,
        file_is_valid_pdf: bool,
        extraction_succeeded: bool,
        layout: &LayoutVerdicts,
        counts: &SectionCounts,
    ) -> ComplianceReport {
        if !file_is_valid_pdf || !extraction_succeeded {
            return self.rejected();
        }

        let mut report = ComplianceReport {
            format: FormatReport {
                file_type: Verdict::Pass,
                font_size: layout.font_size,
                font_family: layout.font_family,
                margin: layout.margin,
            },
            content: BTreeMap::new(),
            error: None,
        };
        for rule in &self.policy.sections {
            let pages = counts.get(&normalize(&rule.name)).copied().unwrap_or(0);
            report.set_section(&rule.name, section_verdict(rule, pages), pages);
        }
        report
    }

    /// The all-`fail` report: every format check fails, every section 0/fail.
    pub fn rejected(&self) -> ComplianceReport {
        let mut report = ComplianceReport {
            format: FormatReport::all_fail(),
            content: BTreeMap::new(),
            error: None,
        };
        for rule in &self.policy.sections {
            report.set_section(&rule.name, Verdict::Fail, 0);
        }
        report
    }
}

/// Pass iff the section exists and stays within its page limit.
pub fn section_verdict(rule: &SectionRule, pages: u32) -> Verdict {
    Verdict::from_bool(pages > 0 && pages <= rule.max_pages)
}
