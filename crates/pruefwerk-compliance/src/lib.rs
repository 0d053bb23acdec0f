// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pruefwerk Compliance: layout statistics, section detection, and the
// verdicts that make up a compliance report.  `Analyzer` wires these to the
// extraction stage in `pruefwerk-document`.

pub mod analyzer;
pub mod evaluate;
pub mod layout;
pub mod sections;

pub use analyzer::{AnalysisOutcome, Analyzer};
pub use evaluate::ComplianceEvaluator;
pub use layout::{LayoutAnalysis, LayoutAnalyzer, LayoutSummary};
pub use sections::{KeywordDetector, SectionDetector, SemanticDetector, TextGenerator};
