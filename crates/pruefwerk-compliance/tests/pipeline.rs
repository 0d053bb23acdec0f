// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end runs of the analyzer against generated PDFs on disk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pruefwerk_compliance::{Analyzer, SemanticDetector, TextGenerator};
use pruefwerk_core::config::{DetectionStrategy, DetectorConfig};
use pruefwerk_core::{AnalyzerConfig, DiagnosticKind, FormatReport, PruefwerkError, Verdict};
use pruefwerk_document::pdf::fixture::PdfFixture;

const FONT: &str = "TimesNewRomanPSMT";

fn filler() -> [&'static str; 3] {
    [
        "The proposed work continues as planned.",
        "Milestones are tracked every month.",
        "Results will be published openly.",
    ]
}

/// Ten Times New Roman 12pt pages with one-inch margins. Only page 2 mentions
/// the budget; no other section heading appears anywhere.
fn ten_page_proposal() -> PdfFixture {
    proposal_with_margin(72.0)
}

fn proposal_with_margin(margin: f32) -> PdfFixture {
    let mut fixture = PdfFixture::new();
    for page in 1..=10 {
        if page == 2 {
            fixture = fixture.body_page(
                &["Budget", "Staff and equipment are listed below.", "Travel is excluded."],
                FONT,
                12.0,
                margin,
            );
        } else {
            fixture = fixture.body_page(&filler(), FONT, 12.0, margin);
        }
    }
    fixture
}

struct Stalled;

#[async_trait]
impl TextGenerator for Stalled {
    async fn generate(&self, _prompt: &str) -> Result<String, PruefwerkError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("{}".into())
    }
}

struct Answer(&'static str);

#[async_trait]
impl TextGenerator for Answer {
    async fn generate(&self, _prompt: &str) -> Result<String, PruefwerkError> {
        Ok(self.0.into())
    }
}

fn with_strategy(detection: DetectionStrategy) -> AnalyzerConfig {
    AnalyzerConfig {
        detection,
        ..AnalyzerConfig::default()
    }
}

#[tokio::test]
async fn conforming_proposal_with_short_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proposal.pdf");
    ten_page_proposal().write_to(&path).unwrap();

    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let outcome = analyzer.analyze(&path).await;
    let report = &outcome.report;

    assert_eq!(
        report.format,
        FormatReport {
            file_type: Verdict::Pass,
            font_size: Verdict::Pass,
            font_family: Verdict::Pass,
            margin: Verdict::Pass,
        }
    );
    assert_eq!(report.section_pages("budget"), Some(1));
    assert_eq!(report.section_verdict("budget"), Some(Verdict::Pass));
    for missing in ["technical requirements", "qualification"] {
        assert_eq!(report.section_pages(missing), Some(0));
        assert_eq!(report.section_verdict(missing), Some(Verdict::Fail));
    }
    assert!(report.error.is_none());
    assert!(!report.is_compliant());

    let layout = outcome.layout.expect("layout summary");
    assert_eq!(layout.dominant_size, Some(12));
    assert_eq!(layout.measured_pages.len(), 10);
    assert!(layout.failing_margin_pages.is_empty());
}

#[tokio::test]
async fn one_and_a_half_inch_margins_fail_by_default() {
    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let bytes = proposal_with_margin(108.0).build().unwrap();
    let outcome = analyzer.analyze_bytes("wide.pdf", bytes).await;

    assert_eq!(outcome.report.format.margin, Verdict::Fail);
    assert_eq!(outcome.layout.unwrap().failing_margin_pages.len(), 10);
    assert_eq!(outcome.report.format.font_size, Verdict::Pass);
}

#[tokio::test]
async fn report_json_has_the_documented_shape() {
    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let bytes = ten_page_proposal().build().unwrap();
    let outcome = analyzer.analyze_bytes("proposal.pdf", bytes).await;

    let json: serde_json::Value = serde_json::from_str(&outcome.report.to_json().unwrap()).unwrap();
    assert_eq!(json["format"]["file_type"], "pass");
    assert_eq!(json["format"]["margin"], "pass");
    assert_eq!(json["content"]["budget"], "pass");
    assert_eq!(json["content"]["budget_pages"], 1);
    assert_eq!(json["content"]["technical_requirements"], "fail");
    assert_eq!(json["content"]["technical_requirements_pages"], 0);
}

#[tokio::test]
async fn docx_is_rejected_without_reading() {
    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let outcome = analyzer.analyze("/nowhere/report.docx").await;

    assert_eq!(outcome.report.format, FormatReport::all_fail());
    for section in ["technical requirements", "budget", "qualification"] {
        assert_eq!(outcome.report.section_verdict(section), Some(Verdict::Fail));
        assert_eq!(outcome.report.section_pages(section), Some(0));
    }
    assert!(outcome.has_diagnostic(DiagnosticKind::InvalidFormat));
}

#[tokio::test]
async fn corrupt_pdf_fails_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"this is not a pdf at all").unwrap();

    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let outcome = analyzer.analyze(&path).await;

    assert_eq!(outcome.report.format, FormatReport::all_fail());
    assert!(outcome.has_diagnostic(DiagnosticKind::CorruptDocument));
    assert!(outcome.report.error.is_none());
}

#[tokio::test]
async fn missing_file_fails_everything() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let outcome = analyzer.analyze(dir.path().join("gone.pdf")).await;

    assert_eq!(outcome.report.format, FormatReport::all_fail());
    assert!(outcome.has_diagnostic(DiagnosticKind::NotFound));
}

#[tokio::test(start_paused = true)]
async fn detector_timeout_yields_empty_counts() {
    let detector = SemanticDetector::new(
        Arc::new(Stalled),
        &DetectorConfig {
            timeout_secs: 5,
            ..DetectorConfig::default()
        },
    );
    let analyzer = Analyzer::new(with_strategy(DetectionStrategy::Semantic))
        .unwrap()
        .with_semantic_detector(Arc::new(detector));

    let bytes = ten_page_proposal().build().unwrap();
    let outcome = analyzer.analyze_bytes("proposal.pdf", bytes).await;

    assert!(outcome.has_diagnostic(DiagnosticKind::DetectorUnavailable));
    for section in ["technical requirements", "budget", "qualification"] {
        assert_eq!(outcome.report.section_pages(section), Some(0));
        assert_eq!(outcome.report.section_verdict(section), Some(Verdict::Fail));
    }
    // Layout is unaffected by the detector.
    assert_eq!(outcome.report.format.font_size, Verdict::Pass);
}

#[tokio::test]
async fn semantic_counts_drive_the_report() {
    let detector = SemanticDetector::new(
        Arc::new(Answer(
            "```json\n{\"technical requirements\": 6, \"budget\": 5, \"qualification\": 2}\n```",
        )),
        &DetectorConfig::default(),
    );
    let analyzer = Analyzer::new(with_strategy(DetectionStrategy::Semantic))
        .unwrap()
        .with_semantic_detector(Arc::new(detector));

    let bytes = ten_page_proposal().build().unwrap();
    let report = analyzer.analyze_bytes("proposal.pdf", bytes).await.report;

    assert_eq!(report.section_verdict("technical requirements"), Some(Verdict::Pass));
    assert_eq!(report.section_pages("budget"), Some(5));
    assert_eq!(report.section_verdict("budget"), Some(Verdict::Fail));
    assert_eq!(report.section_verdict("qualification"), Some(Verdict::Pass));
}

#[tokio::test]
async fn refined_keeps_keyword_counts_for_unreported_sections() {
    let detector = SemanticDetector::new(Arc::new(Answer("{\"qualification\": 3}")), &DetectorConfig::default());
    let analyzer = Analyzer::new(with_strategy(DetectionStrategy::Refined))
        .unwrap()
        .with_semantic_detector(Arc::new(detector));

    let bytes = ten_page_proposal().build().unwrap();
    let report = analyzer.analyze_bytes("proposal.pdf", bytes).await.report;

    assert_eq!(report.section_pages("budget"), Some(1));
    assert_eq!(report.section_pages("qualification"), Some(3));
    assert_eq!(report.section_pages("technical requirements"), Some(0));
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proposal.pdf");
    ten_page_proposal().write_to(&path).unwrap();

    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let first = analyzer.analyze(&path).await;
    let second = analyzer.analyze(&path).await;

    assert_eq!(first.report.to_json().unwrap(), second.report.to_json().unwrap());
    assert_eq!(first.fingerprint, second.fingerprint);
}

#[tokio::test]
async fn concurrent_analyses_share_one_analyzer() {
    let analyzer = Arc::new(Analyzer::new(AnalyzerConfig::default()).unwrap());
    let bytes = ten_page_proposal().build().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let analyzer = Arc::clone(&analyzer);
            let bytes = bytes.clone();
            tokio::spawn(async move { analyzer.analyze_bytes(&format!("p{i}.pdf"), bytes).await })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.report.section_pages("budget"), Some(1));
    }
}
