// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanned page pipeline: rasterization, cleanup, and optical character
// recognition (OCR) for pages without a text layer.

use image::DynamicImage;
use pruefwerk_core::error::PruefwerkError;

pub mod enhance;
pub mod raster;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use enhance::ScanEnhancer;
pub use raster::rasterize_page;

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrEngine};

/// Turns a page image into text.
///
/// Implemented by [`OcrEngine`] when the `ocr` feature is enabled; tests
/// substitute their own recognizers.
pub trait TextRecognizer: Send + Sync {
    fn recognize_text(&self, image: &DynamicImage) -> Result<String, PruefwerkError>;
}
