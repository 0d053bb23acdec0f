// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pruefwerk.

use std::time::Duration;

use thiserror::Error;

use crate::types::DiagnosticKind;

/// Top-level error type for all Pruefwerk operations.
#[derive(Debug, Error)]
pub enum PruefwerkError {
    // -- Input errors --
    #[error("unsupported document type: {0}")]
    InvalidFormat(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document could not be parsed: {0}")]
    CorruptDocument(String),

    // -- Extraction errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    // -- Section detection --
    #[error("section detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("section detector timed out after {0:?}")]
    DetectorTimeout(Duration),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PruefwerkError {
    /// Where this error sits in the analysis diagnostic taxonomy.
    ///
    /// Returns `None` for errors that have no recoverable meaning inside an
    /// analysis run; those surface through the report's `error` field.
    pub fn diagnostic_kind(&self) -> Option<DiagnosticKind> {
        match self {
            Self::InvalidFormat(_) => Some(DiagnosticKind::InvalidFormat),
            Self::NotFound(_) => Some(DiagnosticKind::NotFound),
            Self::CorruptDocument(_) | Self::PdfError(_) => Some(DiagnosticKind::CorruptDocument),
            Self::OcrError(_) | Self::ImageError(_) => Some(DiagnosticKind::ExtractionDegraded),
            Self::DetectorUnavailable(_) | Self::DetectorTimeout(_) => {
                Some(DiagnosticKind::DetectorUnavailable)
            }
            Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Some(DiagnosticKind::NotFound)
            }
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => None,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PruefwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_their_diagnostics() {
        assert_eq!(
            PruefwerkError::InvalidFormat("docx".into()).diagnostic_kind(),
            Some(DiagnosticKind::InvalidFormat)
        );
        assert_eq!(
            PruefwerkError::PdfError("bad xref".into()).diagnostic_kind(),
            Some(DiagnosticKind::CorruptDocument)
        );
        assert_eq!(
            PruefwerkError::DetectorTimeout(Duration::from_secs(30)).diagnostic_kind(),
            Some(DiagnosticKind::DetectorUnavailable)
        );
    }

    #[test]
    fn io_not_found_is_classified() {
        let err = PruefwerkError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.diagnostic_kind(), Some(DiagnosticKind::NotFound));

        let denied = PruefwerkError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(denied.diagnostic_kind(), None);
    }
}
