// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis configuration: the compliance policy, section detection strategy,
// semantic detector endpoint, and OCR settings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PruefwerkError, Result};
use crate::types::ComplianceReport;

/// How the dominant font size is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSizeMode {
    /// Every observed size must lie within the tolerance of the required size.
    AllWithinTolerance,
    /// The most common rounded size must equal the required size.
    #[default]
    ModeMustMatch,
}

/// How the font family is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamilyMode {
    /// The required family must appear at least once.
    Loose,
    /// The required family must be the most common one.
    #[default]
    Strict,
}

impl std::str::FromStr for FontSizeMode {
    type Err = PruefwerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "all_within_tolerance" => Ok(Self::AllWithinTolerance),
            "mode_must_match" => Ok(Self::ModeMustMatch),
            other => Err(PruefwerkError::Config(format!(
                "unknown font size mode '{other}' (expected all_within_tolerance or mode_must_match)"
            ))),
        }
    }
}

impl std::str::FromStr for FontFamilyMode {
    type Err = PruefwerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "loose" => Ok(Self::Loose),
            "strict" => Ok(Self::Strict),
            other => Err(PruefwerkError::Config(format!(
                "unknown font family mode '{other}' (expected loose or strict)"
            ))),
        }
    }
}

/// How a measured margin is compared with the required margin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginRule {
    /// Every margin must be `required ± tolerance`.
    #[default]
    Exact,
    /// Content may not come closer to the edge than `required - tolerance`;
    /// wider margins are fine.
    Minimum,
}

/// Which section detector produces the page counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Keyword span heuristic over the extracted text.
    #[default]
    Keyword,
    /// External text-generation service only.
    Semantic,
    /// Keyword counts, overridden by whatever the external service reports.
    Refined,
}

impl DetectionStrategy {
    pub fn uses_semantic(&self) -> bool {
        matches!(self, Self::Semantic | Self::Refined)
    }
}

impl std::str::FromStr for DetectionStrategy {
    type Err = PruefwerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "refined" => Ok(Self::Refined),
            other => Err(PruefwerkError::Config(format!(
                "unknown detection strategy '{other}' (expected keyword, semantic, or refined)"
            ))),
        }
    }
}

/// A named section with its page limit and the phrases that signal it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRule {
    /// Lowercase, space separated display name, e.g. `technical requirements`.
    pub name: String,
    /// Maximum number of pages the section may span.
    pub max_pages: u32,
    /// Phrases searched for in the page text. The name is used when empty.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl SectionRule {
    pub fn new(name: impl Into<String>, max_pages: u32, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            max_pages,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Lowercased search phrases, falling back to the section name.
    pub fn search_phrases(&self) -> Vec<String> {
        let phrases: Vec<String> = self
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if phrases.is_empty() {
            vec![self.name.trim().to_lowercase()]
        } else {
            phrases
        }
    }
}

/// The formatting and content-length policy a document is checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Required body font size in points.
    pub required_font_size: f32,
    /// Required font family, e.g. "Times New Roman".
    pub required_font_family: String,
    pub font_size_mode: FontSizeMode,
    /// Allowed deviation per glyph run in `AllWithinTolerance` mode.
    pub font_size_tolerance_pts: f32,
    pub font_family_mode: FontFamilyMode,
    /// Required page margin on every side, in points (72 = 1 inch).
    pub required_margin_pts: f32,
    /// Allowed deviation from the required margin, in points.
    pub margin_tolerance_pts: f32,
    pub margin_rule: MarginRule,
    /// Sections and their page limits, in report order.
    pub sections: Vec<SectionRule>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            required_font_size: 12.0,
            required_font_family: "Times New Roman".into(),
            font_size_mode: FontSizeMode::default(),
            font_size_tolerance_pts: 0.5,
            font_family_mode: FontFamilyMode::default(),
            required_margin_pts: 72.0,
            margin_tolerance_pts: 5.0,
            margin_rule: MarginRule::default(),
            sections: vec![
                SectionRule::new("technical requirements", 8, &[]),
                SectionRule::new("budget", 4, &[]),
                SectionRule::new("qualification", 4, &[]),
            ],
        }
    }
}

impl Policy {
    pub fn validate(&self) -> Result<()> {
        if !(self.required_font_size > 0.0) {
            return Err(PruefwerkError::Config(format!(
                "required_font_size must be positive, got {}",
                self.required_font_size
            )));
        }
        if self.required_font_family.trim().is_empty() {
            return Err(PruefwerkError::Config(
                "required_font_family must not be empty".into(),
            ));
        }
        for (field, value) in [
            ("font_size_tolerance_pts", self.font_size_tolerance_pts),
            ("required_margin_pts", self.required_margin_pts),
            ("margin_tolerance_pts", self.margin_tolerance_pts),
        ] {
            if !(value >= 0.0) {
                return Err(PruefwerkError::Config(format!(
                    "{field} must be zero or positive, got {value}"
                )));
            }
        }

        // Every section owns two report keys; none may be shared.
        let mut seen = HashSet::new();
        for rule in &self.sections {
            let key = ComplianceReport::section_key(&rule.name);
            if key.is_empty() {
                return Err(PruefwerkError::Config("section name must not be empty".into()));
            }
            let pages_key = ComplianceReport::pages_key(&rule.name);
            if !seen.insert(key.clone()) || !seen.insert(pages_key) {
                return Err(PruefwerkError::Config(format!(
                    "section '{}' collides with another section's report key '{key}'",
                    rule.name
                )));
            }
        }
        Ok(())
    }
}

/// Default Gemini REST endpoint (model name and method are appended).
pub const DEFAULT_DETECTOR_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Character budget for the text sent to the semantic detector.
pub const DEFAULT_DETECTOR_MAX_CHARS: usize = 15_000;

/// Connection settings for the semantic section detector.
///
/// Owned by a single analyzer instance; nothing here is process-wide.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub endpoint: String,
    pub model: String,
    /// Supplied at runtime (environment, secret store); never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Maximum number of characters of document text sent per request.
    pub max_chars: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_DETECTOR_ENDPOINT.into(),
            model: "gemini-1.5-flash".into(),
            api_key: None,
            timeout_secs: 30,
            max_chars: DEFAULT_DETECTOR_MAX_CHARS,
        }
    }
}

impl std::fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a non-blank API key is present.
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// OCR fallback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub enabled: bool,
    /// Rasterisation resolution for image-only pages.
    pub dpi: u32,
    /// Directory holding the OCR models; the engine default is used when unset.
    pub model_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dpi: 300,
            model_dir: None,
        }
    }
}

/// Everything one analysis run needs to know.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub policy: Policy,
    pub detection: DetectionStrategy,
    pub detector: DetectorConfig,
    pub ocr: OcrSettings,
}

impl AnalyzerConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if !(72..=1200).contains(&self.ocr.dpi) {
            return Err(PruefwerkError::Config(format!(
                "ocr.dpi must be between 72 and 1200, got {}",
                self.ocr.dpi
            )));
        }
        if self.detector.timeout_secs == 0 {
            return Err(PruefwerkError::Config(
                "detector.timeout_secs must be positive".into(),
            ));
        }
        if self.detector.max_chars == 0 {
            return Err(PruefwerkError::Config(
                "detector.max_chars must be positive".into(),
            ));
        }
        Ok(())
    }
}
