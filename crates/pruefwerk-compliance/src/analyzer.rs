// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis pipeline: file, extraction, layout and sections, evaluation.
//
// `Analyzer` always produces a report. Expected problems (wrong extension,
// missing or corrupt file, OCR fallback, detector failure) become diagnostics
// next to the report; anything unexpected (other I/O failures, a panic on the
// extraction worker) is written into the report's `error` field alongside
// whatever partial results exist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pruefwerk_core::config::DetectionStrategy;
use pruefwerk_core::error::{PruefwerkError, Result};
use pruefwerk_core::{
    AnalyzerConfig, ComplianceReport, Diagnostic, DiagnosticKind, FormatReport, LayoutVerdicts, Page,
    SectionCounts, SectionWindow, Verdict,
};
use pruefwerk_document::fingerprint::short_id;
use pruefwerk_document::{Extraction, TextExtractor};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::evaluate::ComplianceEvaluator;
use crate::layout::{LayoutAnalyzer, LayoutSummary};
use crate::sections::{KeywordDetector, SectionDetector, SemanticDetector, normalize};

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub report: ComplianceReport,
    /// Recoverable problems met on the way, in the order they happened.
    pub diagnostics: Vec<Diagnostic>,
    /// SHA-256 of the analysed bytes; absent when the file was never read.
    pub fingerprint: Option<String>,
    /// Absent when layout analysis never ran.
    pub layout: Option<LayoutSummary>,
    /// Keyword hits per section, in policy order.
    pub windows: Vec<SectionWindow>,
}

impl AnalysisOutcome {
    fn new(report: ComplianceReport) -> Self {
        Self {
            report,
            diagnostics: Vec::new(),
            fingerprint: None,
            layout: None,
            windows: Vec::new(),
        }
    }

    pub fn has_diagnostic(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}

enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Runs the whole compliance pipeline for one document at a time.
///
/// Immutable after construction; share it behind an `Arc` to serve
/// concurrent analyses.
pub struct Analyzer {
    config: AnalyzerConfig,
    extractor: TextExtractor,
    layout: LayoutAnalyzer,
    evaluator: ComplianceEvaluator,
    keyword: KeywordDetector,
    semantic: Option<Arc<dyn SectionDetector>>,
    /// Why the semantic detector could not be built, if the strategy needs it.
    semantic_unavailable: Option<String>,
}

impl Analyzer {
    /// Build an analyzer from validated configuration.
    ///
    /// A semantic detector that cannot be set up (no API key, say) is not an
    /// error here: every analysis records it as `DetectorUnavailable`.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let (semantic, semantic_unavailable) = if config.detection.uses_semantic() {
            match SemanticDetector::gemini(&config.detector) {
                Ok(detector) => (Some(Arc::new(detector) as Arc<dyn SectionDetector>), None),
                Err(err) => {
                    warn!(%err, "semantic section detector unavailable");
                    (None, Some(err.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            extractor: TextExtractor::from_settings(&config.ocr),
            layout: LayoutAnalyzer::new(config.policy.clone()),
            evaluator: ComplianceEvaluator::new(config.policy.clone()),
            keyword: KeywordDetector::new(),
            semantic,
            semantic_unavailable,
            config,
        })
    }

    /// Replace the text extractor (e.g. to plug in a different recognizer).
    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the semantic section detector.
    pub fn with_semantic_detector(mut self, detector: Arc<dyn SectionDetector>) -> Self {
        self.semantic = Some(detector);
        self.semantic_unavailable = None;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    // -- Entry points ---------------------------------------------------------

    /// Analyse the PDF at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn analyze(&self, path: impl AsRef<Path>) -> AnalysisOutcome {
        let path = path.as_ref();
        self.run(path.display().to_string(), Source::Path(path.to_path_buf()))
            .await
    }

    /// Analyse a PDF already in memory; `name` supplies the extension.
    #[instrument(skip_all, fields(name = %name, bytes_len = bytes.len()))]
    pub async fn analyze_bytes(&self, name: &str, bytes: Vec<u8>) -> AnalysisOutcome {
        self.run(name.to_string(), Source::Bytes(bytes)).await
    }

    // -- Pipeline -------------------------------------------------------------

    async fn run(&self, name: String, source: Source) -> AnalysisOutcome {
        if let Err(err) = TextExtractor::check_extension(&name) {
            info!(%name, "rejected: not a PDF");
            return self.rejected(&err);
        }

        let extractor = self.extractor.clone();
        let worker = tokio::task::spawn_blocking(move || match source {
            Source::Path(path) => extractor.extract(&path),
            Source::Bytes(bytes) => extractor.extract_bytes(&name, &bytes),
        });

        let extraction = match worker.await {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(err)) => return self.extraction_failed(err),
            Err(join_err) => {
                warn!(%join_err, "extraction worker died");
                return self.internal_failure(format!("extraction worker failed: {}", join_err));
            }
        };

        self.evaluate(extraction).await
    }

    async fn evaluate(&self, extraction: Extraction) -> AnalysisOutcome {
        let mut diagnostics = Vec::new();
        if extraction.is_degraded() {
            let pages = extraction
                .ocr_pages
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ExtractionDegraded,
                format!("OCR used on pages {}", pages),
            ));
        }

        let layout = self.layout.analyze(&extraction.pages);
        let windows = self.keyword.windows(&extraction.pages, &self.config.policy.sections);
        let counts = self
            .section_counts(&extraction.pages, &windows, &mut diagnostics)
            .await;

        let report = self
            .evaluator
            .evaluate(true, true, &layout.verdicts, &counts);

        info!(
            document = short_id(&extraction.fingerprint),
            compliant = report.is_compliant(),
            font_size = %report.format.font_size,
            font_family = %report.format.font_family,
            margin = %report.format.margin,
            diagnostics = diagnostics.len(),
            "Report produced"
        );

        AnalysisOutcome {
            report,
            diagnostics,
            fingerprint: Some(extraction.fingerprint),
            layout: Some(layout.summary),
            windows,
        }
    }

    /// Page counts per section for the configured strategy.
    async fn section_counts(
        &self,
        pages: &[Page],
        windows: &[SectionWindow],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> SectionCounts {
        let keyword_counts: SectionCounts = windows
            .iter()
            .map(|window| (window.name.clone(), window.page_span()))
            .collect();

        match self.config.detection {
            DetectionStrategy::Keyword => keyword_counts,
            DetectionStrategy::Semantic => self
                .semantic_counts(pages, diagnostics)
                .await
                .unwrap_or_default(),
            DetectionStrategy::Refined => {
                let mut counts = keyword_counts;
                if let Some(semantic) = self.semantic_counts(pages, diagnostics).await {
                    for rule in &self.config.policy.sections {
                        let key = normalize(&rule.name);
                        if let Some(pages) = semantic.get(&key) {
                            counts.insert(key, *pages);
                        }
                    }
                }
                counts
            }
        }
    }

    /// `None` (plus a diagnostic) whenever the semantic detector cannot answer.
    async fn semantic_counts(
        &self,
        pages: &[Page],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<SectionCounts> {
        let Some(detector) = &self.semantic else {
            let reason = self
                .semantic_unavailable
                .clone()
                .unwrap_or_else(|| "no semantic detector configured".into());
            diagnostics.push(Diagnostic::new(DiagnosticKind::DetectorUnavailable, reason));
            return None;
        };

        match detector.detect(pages, &self.config.policy.sections).await {
            Ok(counts) => Some(counts),
            Err(err) => {
                warn!(detector = detector.name(), %err, "section detector failed, using empty counts");
                diagnostics.push(Diagnostic::new(DiagnosticKind::DetectorUnavailable, err.to_string()));
                None
            }
        }
    }

    // -- Failure reports ------------------------------------------------------

    fn rejected(&self, err: &PruefwerkError) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::new(self.evaluator.rejected());
        if let Some(kind) = err.diagnostic_kind() {
            outcome.diagnostics.push(Diagnostic::new(kind, err.to_string()));
        }
        outcome
    }

    fn extraction_failed(&self, err: PruefwerkError) -> AnalysisOutcome {
        match err.diagnostic_kind() {
            Some(DiagnosticKind::InvalidFormat | DiagnosticKind::NotFound | DiagnosticKind::CorruptDocument) => {
                info!(%err, "document could not be opened");
                self.rejected(&err)
            }
            _ => {
                warn!(%err, "unexpected extraction failure");
                self.internal_failure(err.to_string())
            }
        }
    }

    /// Best-effort report for failures nobody planned for: the file passed
    /// the type check, nothing else was computed.
    fn internal_failure(&self, error: String) -> AnalysisOutcome {
        let unknown = LayoutVerdicts::unknown();
        let mut report = ComplianceReport {
            format: FormatReport {
                file_type: Verdict::Pass,
                font_size: unknown.font_size,
                font_family: unknown.font_family,
                margin: unknown.margin,
            },
            content: BTreeMap::new(),
            error: Some(error),
        };
        for rule in &self.config.policy.sections {
            report.set_section(&rule.name, Verdict::Fail, 0);
        }
        AnalysisOutcome::new(report)
    }
}
