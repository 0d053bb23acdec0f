// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable messages for reviewers who are not PDF experts.
//
// Every technical error and analysis diagnostic is mapped to plain English
// with a clear suggestion. The severity drives how the CLI presents it.

use crate::error::PruefwerkError;
use crate::types::{Diagnostic, DiagnosticKind};

/// Severity of a problem from the reviewer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or timeout; running the analysis again may help.
    Transient,
    /// The reviewer must supply something different (another file, a key).
    ActionRequired,
    /// The document itself is the problem; retrying will not change anything.
    Permanent,
    /// The report was produced but some verdicts carry less weight.
    Degraded,
}

/// A human-readable problem with a plain English message and a suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the reviewer should try.
    pub suggestion: String,
    /// Whether running the analysis again could give a different result.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `PruefwerkError` into a `HumanError`.
pub fn humanize_error(err: &PruefwerkError) -> HumanError {
    match err {
        // -- Input errors --
        PruefwerkError::InvalidFormat(detail) => HumanError {
            message: "Only PDF documents can be checked.".into(),
            suggestion: format!("Export the document as a PDF and upload that instead. (File: {detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PruefwerkError::NotFound(_) => HumanError {
            message: "The document couldn't be found.".into(),
            suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PruefwerkError::CorruptDocument(_) | PruefwerkError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged or password protected. Open it in a PDF viewer to check it, then export a fresh copy.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Extraction --
        PruefwerkError::ImageError(_) | PruefwerkError::OcrError(_) => HumanError {
            message: "Some pages are scanned images and couldn't be read reliably.".into(),
            suggestion: "Font and margin checks only cover pages with real text. Submit a PDF exported from the original document for a complete check.".into(),
            retriable: false,
            severity: Severity::Degraded,
        },

        // -- Section detection --
        PruefwerkError::DetectorUnavailable(detail) => humanize_detector_error(detail),

        PruefwerkError::DetectorTimeout(after) => HumanError {
            message: "The section detection service didn't answer in time.".into(),
            suggestion: format!(
                "Section lengths fell back to what could be determined locally. Try again later, or raise the detector timeout (currently {}s).",
                after.as_secs()
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Configuration / plumbing --
        PruefwerkError::Config(detail) => HumanError {
            message: "The analysis settings are not valid.".into(),
            suggestion: format!("Fix the configuration file and try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PruefwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The document couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The analyzer doesn't have permission to read that file.".into(),
                    suggestion: "Check the file permissions, or copy the file to a different location first.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading a file.".into(),
                    suggestion: "Try again. If this keeps happening, check the disk the file lives on.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        PruefwerkError::Serialization(_) => HumanError {
            message: "The analyzer had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

/// Convert a recorded analysis diagnostic into a `HumanError`.
pub fn humanize_diagnostic(diagnostic: &Diagnostic) -> HumanError {
    match diagnostic.kind {
        DiagnosticKind::InvalidFormat => humanize_error(&PruefwerkError::InvalidFormat(diagnostic.detail.clone())),
        DiagnosticKind::NotFound => humanize_error(&PruefwerkError::NotFound(diagnostic.detail.clone())),
        DiagnosticKind::CorruptDocument => {
            humanize_error(&PruefwerkError::CorruptDocument(diagnostic.detail.clone()))
        }
        DiagnosticKind::ExtractionDegraded => HumanError {
            message: "Some pages had no text layer and were read with OCR.".into(),
            suggestion: format!(
                "Font and margin checks skip those pages. ({})",
                diagnostic.detail
            ),
            retriable: false,
            severity: Severity::Degraded,
        },
        DiagnosticKind::DetectorUnavailable => humanize_detector_error(&diagnostic.detail),
    }
}

/// Parse detector failure details into human-readable messages.
fn humanize_detector_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") {
        HumanError {
            message: "The section detection service didn't answer in time.".into(),
            suggestion: "Section lengths fell back to what could be determined locally. Try again later.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("api key") || lower.contains("401") || lower.contains("403") {
        HumanError {
            message: "The section detection service rejected our credentials.".into(),
            suggestion: "Set a valid GEMINI_API_KEY, or switch to keyword detection.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("malformed") || lower.contains("parse") {
        HumanError {
            message: "The section detection service gave an answer we couldn't read.".into(),
            suggestion: "Section lengths fell back to what could be determined locally. Running the check again usually helps.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else {
        HumanError {
            message: "The section detection service is unavailable.".into(),
            suggestion: format!("Section lengths fell back to what could be determined locally. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
