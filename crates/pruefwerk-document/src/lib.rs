// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pruefwerk-document: document intake for the Pruefwerk compliance analyzer.
//
// Reads PDFs with lopdf, walks page content streams for glyph layout
// (effective font size, family, and extent of every text run), and falls back
// to rasterization plus OCR for scanned pages without a text layer.

pub mod extract;
pub mod fingerprint;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `pruefwerk_document::TextExtractor` etc.
pub use extract::{Extraction, TextExtractor};
pub use pdf::reader::PdfReader;
pub use scan::TextRecognizer;
pub use scan::enhance::ScanEnhancer;

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrEngine;
