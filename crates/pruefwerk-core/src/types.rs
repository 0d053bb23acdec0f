// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pruefwerk compliance analyzer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Input document types recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    /// Word processor formats (DOCX, ODT, ...). Recognised only to be rejected.
    WordProcessor,
    Image,
    PlainText,
}

impl DocumentType {
    /// Infer document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" | "odt" | "rtf" => Some(Self::WordProcessor),
            "jpg" | "jpeg" | "png" | "tif" | "tiff" => Some(Self::Image),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Infer document type from the extension of a path or file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Axis-aligned rectangle in PDF user space (points, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    /// Build a box from two corners given in any order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// US Letter portrait, the most common proposal page size.
    pub fn letter() -> Self {
        Self::new(0.0, 0.0, 612.0, 792.0)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Distances from each edge of `self` (the content) to the matching edge
    /// of `page`. Negative values mean the content spills past the page edge.
    pub fn offsets_within(&self, page: &Self) -> MarginOffsets {
        MarginOffsets {
            left: self.x0 - page.x0,
            right: page.x1 - self.x1,
            top: page.y1 - self.y1,
            bottom: self.y0 - page.y0,
        }
    }
}

/// Measured page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginOffsets {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl MarginOffsets {
    pub fn all(&self) -> [f32; 4] {
        [self.left, self.right, self.top, self.bottom]
    }
}

/// A run of glyphs drawn with a single font at a single size.
///
/// Produced by layout extraction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRun {
    /// Effective font size in points (text and graphics matrix scaling applied).
    pub font_size: f32,
    /// Font family as named by the PDF, subset prefix removed.
    pub font_family: String,
    /// Baseline origin of the run.
    pub x: f32,
    pub y: f32,
    /// Area covered by the run, including ascenders and descenders.
    pub bounds: BoundingBox,
}

/// How a page's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Text layer extracted from the PDF content stream.
    Native,
    /// No text layer; text comes from optical character recognition.
    Ocr,
}

/// A single page of an analysed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page index.
    pub index: u32,
    pub text: String,
    pub source: TextSource,
    /// Empty for OCR pages: layout data is absent, not zero.
    pub glyph_runs: Vec<GlyphRun>,
    /// Full page extent (MediaBox).
    pub media_box: BoundingBox,
    /// Union of all glyph run bounds, `None` when no layout data exists.
    pub content_box: Option<BoundingBox>,
}

impl Page {
    /// A page whose text came from the PDF text layer.
    pub fn native(index: u32, text: String, glyph_runs: Vec<GlyphRun>, media_box: BoundingBox) -> Self {
        let content_box = glyph_runs
            .iter()
            .map(|run| run.bounds)
            .reduce(|acc, bounds| acc.union(&bounds));
        Self {
            index,
            text,
            source: TextSource::Native,
            glyph_runs,
            media_box,
            content_box,
        }
    }

    /// A page whose text came from OCR. Carries no layout data.
    pub fn ocr(index: u32, text: String, media_box: BoundingBox) -> Self {
        Self {
            index,
            text,
            source: TextSource::Ocr,
            glyph_runs: Vec::new(),
            media_box,
            content_box: None,
        }
    }

    pub fn has_layout(&self) -> bool {
        !self.glyph_runs.is_empty()
    }
}

/// Pages on which a section's signal was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionWindow {
    pub name: String,
    /// 1-based page indices, unique and ordered.
    pub pages: BTreeSet<u32>,
}

impl SectionWindow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: BTreeSet::new(),
        }
    }

    /// Record a hit on `page`. Index 0 is not a valid page and is ignored.
    pub fn record(&mut self, page: u32) {
        if page > 0 {
            self.pages.insert(page);
        }
    }

    /// Span from first to last hit, inclusive; 0 when nothing was observed.
    ///
    /// Hits on pages 3 and 9 give 7: the span heuristic counts every page
    /// between the first and last occurrence, not the matching pages.
    pub fn page_span(&self) -> u32 {
        match (self.pages.first(), self.pages.last()) {
            (Some(first), Some(last)) => last - first + 1,
            _ => 0,
        }
    }
}

/// Section name (lowercase, space separated) to detected page count.
pub type SectionCounts = BTreeMap<String, u32>;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// The check could not be performed (e.g. no layout data).
    Unknown,
}

impl Verdict {
    pub fn from_bool(passed: bool) -> Self {
        if passed { Self::Pass } else { Self::Fail }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdicts produced by layout analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutVerdicts {
    pub font_size: Verdict,
    pub font_family: Verdict,
    pub margin: Verdict,
}

impl LayoutVerdicts {
    pub fn unknown() -> Self {
        Self {
            font_size: Verdict::Unknown,
            font_family: Verdict::Unknown,
            margin: Verdict::Unknown,
        }
    }
}

/// The `format` half of a compliance report. Field order is the output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatReport {
    pub file_type: Verdict,
    pub font_size: Verdict,
    pub font_family: Verdict,
    pub margin: Verdict,
}

impl FormatReport {
    pub fn all_fail() -> Self {
        Self {
            file_type: Verdict::Fail,
            font_size: Verdict::Fail,
            font_family: Verdict::Fail,
            margin: Verdict::Fail,
        }
    }
}

/// A value in the `content` half of a report: a verdict or a page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Verdict(Verdict),
    Pages(u32),
}

/// Structured pass/fail verdict covering formatting and section lengths.
///
/// Serialises to `{"format": {...}, "content": {...}}`; `error` only appears
/// when an unexpected internal failure cut the analysis short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub format: FormatReport,
    pub content: BTreeMap<String, ContentValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComplianceReport {
    /// Report key for a section name: `technical requirements` becomes
    /// `technical_requirements`.
    pub fn section_key(name: &str) -> String {
        name.trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Report key carrying the page count for a section.
    pub fn pages_key(name: &str) -> String {
        format!("{}_pages", Self::section_key(name))
    }

    /// Record a section's verdict and page count.
    pub fn set_section(&mut self, name: &str, verdict: Verdict, pages: u32) {
        self.content
            .insert(Self::section_key(name), ContentValue::Verdict(verdict));
        self.content
            .insert(Self::pages_key(name), ContentValue::Pages(pages));
    }

    pub fn section_verdict(&self, name: &str) -> Option<Verdict> {
        match self.content.get(&Self::section_key(name)) {
            Some(ContentValue::Verdict(verdict)) => Some(*verdict),
            _ => None,
        }
    }

    pub fn section_pages(&self, name: &str) -> Option<u32> {
        match self.content.get(&Self::pages_key(name)) {
            Some(ContentValue::Pages(pages)) => Some(*pages),
            _ => None,
        }
    }

    /// Whether every format and content verdict passed.
    pub fn is_compliant(&self) -> bool {
        let format = [
            self.format.file_type,
            self.format.font_size,
            self.format.font_family,
            self.format.margin,
        ];
        self.error.is_none()
            && format.iter().all(|v| *v == Verdict::Pass)
            && self.content.values().all(|value| match value {
                ContentValue::Verdict(verdict) => *verdict == Verdict::Pass,
                ContentValue::Pages(_) => true,
            })
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Recoverable problems recorded during an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Wrong file extension; nothing was opened.
    InvalidFormat,
    /// The file does not exist.
    NotFound,
    /// The file is not a parsable PDF.
    CorruptDocument,
    /// OCR was needed on at least one page; layout verdicts carry less weight.
    ExtractionDegraded,
    /// The semantic section detector failed, timed out, or answered garbage.
    DetectorUnavailable,
}

/// A recorded diagnostic with free-form detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}
