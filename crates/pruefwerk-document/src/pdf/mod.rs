// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading pages, text layers, and glyph layout.

pub mod glyphs;
pub mod reader;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixture;

pub use glyphs::{FontMetrics, extract_glyph_runs};
pub use reader::PdfReader;
