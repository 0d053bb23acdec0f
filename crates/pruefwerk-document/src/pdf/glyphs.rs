// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph run extraction: interprets the text and graphics state operators of
// a page content stream and records where each text-showing operator drew,
// with which font and at what effective size.

use std::collections::BTreeMap;

use lopdf::Object;
use lopdf::content::Operation;
use pruefwerk_core::{BoundingBox, GlyphRun};
use tracing::trace;

use crate::pdf::reader::number;

/// Glyph advance used when a font carries no `/Widths` entry, in 1/1000 em.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Fraction of the effective size drawn above the baseline.
const ASCENT: f32 = 0.8;
/// Fraction of the effective size drawn below the baseline.
const DESCENT: f32 = 0.2;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m × n`: apply `m` first, then `n`.
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// What the glyph walker needs to know about a font resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    family: String,
    first_char: u32,
    widths: Vec<f32>,
    two_byte: bool,
}

impl FontMetrics {
    pub fn new(base_font: impl AsRef<str>, first_char: u32, widths: Vec<f32>, two_byte: bool) -> Self {
        Self {
            family: strip_subset_prefix(base_font.as_ref()).to_string(),
            first_char,
            widths,
            two_byte,
        }
    }

    /// Family name with any `ABCDEF+` subset tag removed.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Advance of `code` in 1/1000 em.
    fn width(&self, code: u32) -> f32 {
        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize))
            .copied()
            .filter(|width| *width > 0.0)
            .unwrap_or(DEFAULT_GLYPH_WIDTH)
    }

    /// Character codes in a shown string. Type0 fonts use two-byte codes.
    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }
}

/// Subset fonts are named `ABCDEF+RealName`; keep only the real name.
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest))
            if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) && !rest.is_empty() =>
        {
            rest
        }
        _ => name,
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
    font: Option<Vec<u8>>,
    font_size: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            font_size: 0.0,
        }
    }
}

struct GlyphWalker<'a> {
    fonts: &'a BTreeMap<Vec<u8>, FontMetrics>,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    runs: Vec<GlyphRun>,
}

impl<'a> GlyphWalker<'a> {
    fn new(fonts: &'a BTreeMap<Vec<u8>, FontMetrics>) -> Self {
        Self {
            fonts,
            state: GraphicsState::default(),
            saved: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            runs: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Operation) {
        let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();
        match op.operator.as_str() {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" if nums.len() == 6 => {
                let m = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                self.state.ctm = multiply(&m, &self.state.ctm);
            }
            "BT" => {
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (op.operands.first(), op.operands.get(1).and_then(number))
                {
                    self.state.font = Some(name.clone());
                    self.state.font_size = size;
                }
            }
            "Tc" if !nums.is_empty() => self.state.char_spacing = nums[0],
            "Tw" if !nums.is_empty() => self.state.word_spacing = nums[0],
            "Tz" if !nums.is_empty() => self.state.horizontal_scale = nums[0] / 100.0,
            "TL" if !nums.is_empty() => self.state.leading = nums[0],
            "Ts" if !nums.is_empty() => self.state.rise = nums[0],
            "Td" if nums.len() == 2 => self.next_line(nums[0], nums[1]),
            "TD" if nums.len() == 2 => {
                self.state.leading = -nums[1];
                self.next_line(nums[0], nums[1]);
            }
            "Tm" if nums.len() == 6 => {
                self.text_matrix = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                self.line_matrix = self.text_matrix;
            }
            "T*" => self.next_line(0.0, -self.state.leading),
            "Tj" => {
                if let Some(string @ Object::String(..)) = op.operands.first() {
                    self.show(std::slice::from_ref(string));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    self.show(items);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.leading);
                if let Some(string @ Object::String(..)) = op.operands.first() {
                    self.show(std::slice::from_ref(string));
                }
            }
            "\"" => {
                if let [aw, ac, string @ Object::String(..)] = op.operands.as_slice() {
                    if let (Some(aw), Some(ac)) = (number(aw), number(ac)) {
                        self.state.word_spacing = aw;
                        self.state.char_spacing = ac;
                    }
                    self.next_line(0.0, -self.state.leading);
                    self.show(std::slice::from_ref(string));
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Show strings (and TJ kerning adjustments) as a single run.
    fn show(&mut self, items: &[Object]) {
        let Some(font_key) = self.state.font.clone() else {
            trace!("text shown before any Tf, skipped");
            return;
        };
        let fonts = self.fonts;
        let fallback;
        let font = match fonts.get(&font_key) {
            Some(font) => font,
            None => {
                fallback = FontMetrics::new(String::from_utf8_lossy(&font_key), 0, Vec::new(), false);
                &fallback
            }
        };

        let size = self.state.font_size;
        let scale = self.state.horizontal_scale;
        let start = multiply(&self.text_matrix, &self.state.ctm);

        let mut advance = 0.0;
        let mut visible = false;
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for code in font.codes(bytes) {
                        let mut glyph = font.width(code) / 1000.0 * size + self.state.char_spacing;
                        if code == 32 && !font.two_byte {
                            glyph += self.state.word_spacing;
                        } else {
                            visible |= font.two_byte || !(code as u8).is_ascii_whitespace();
                        }
                        advance += glyph * scale;
                    }
                }
                other => {
                    if let Some(adjust) = number(other) {
                        advance -= adjust / 1000.0 * size * scale;
                    }
                }
            }
        }

        self.text_matrix = multiply(&translation(advance, 0.0), &self.text_matrix);

        if !visible || size == 0.0 {
            return;
        }

        // Vertical scale of text space in device space.
        let effective = (size * (start[2] * start[2] + start[3] * start[3]).sqrt()).abs();
        let origin_x = start[4] + self.state.rise * start[2];
        let origin_y = start[5] + self.state.rise * start[3];
        let end_x = origin_x + advance * start[0];
        let end_y = origin_y + advance * start[1];

        let bounds = BoundingBox::new(
            origin_x.min(end_x),
            origin_y.min(end_y) - DESCENT * effective,
            origin_x.max(end_x),
            origin_y.max(end_y) + ASCENT * effective,
        );

        self.runs.push(GlyphRun {
            font_size: effective,
            font_family: font.family().to_string(),
            x: origin_x,
            y: origin_y,
            bounds,
        });
    }
}

/// Walk `operations` and return one [`GlyphRun`] per visible text-showing
/// operator, in drawing order.
pub fn extract_glyph_runs(operations: &[Operation], fonts: &BTreeMap<Vec<u8>, FontMetrics>) -> Vec<GlyphRun> {
    let mut walker = GlyphWalker::new(fonts);
    for op in operations {
        walker.apply(op);
    }
    walker.runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn fonts() -> BTreeMap<Vec<u8>, FontMetrics> {
        let mut fonts = BTreeMap::new();
        fonts.insert(
            b"F1".to_vec(),
            FontMetrics::new("ABCDEF+TimesNewRomanPSMT", 32, vec![250.0; 95], false),
        );
        fonts
    }

    #[test]
    fn subset_prefix_is_removed() {
        assert_eq!(strip_subset_prefix("ABCDEF+Arial-BoldMT"), "Arial-BoldMT");
        assert_eq!(strip_subset_prefix("Helvetica"), "Helvetica");
        assert_eq!(strip_subset_prefix("abcdef+Helvetica"), "abcdef+Helvetica");
        assert_eq!(strip_subset_prefix("ABC+Helvetica"), "ABC+Helvetica");
    }

    #[test]
    fn simple_run_position_and_width() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            op("Td", vec![Object::Integer(72), Object::Integer(700)]),
            op("Tj", vec![Object::string_literal("Hello")]),
            op("ET", vec![]),
        ];
        let runs = extract_glyph_runs(&ops, &fonts());
        assert_eq!(runs.len(), 1);

        let run = &runs[0];
        assert_eq!(run.font_family, "TimesNewRomanPSMT");
        assert!((run.font_size - 12.0).abs() < 1e-4);
        assert!((run.x - 72.0).abs() < 1e-4);
        // 5 glyphs × 250/1000 × 12pt
        assert!((run.bounds.x1 - 87.0).abs() < 1e-4);
        assert!((run.bounds.y0 - (700.0 - 2.4)).abs() < 1e-4);
        assert!((run.bounds.y1 - (700.0 + 9.6)).abs() < 1e-4);
    }

    #[test]
    fn matrices_scale_the_effective_size() {
        let ops = vec![
            op("q", vec![]),
            op("cm", vec![Object::Integer(2), Object::Integer(0), Object::Integer(0), Object::Integer(2), Object::Integer(0), Object::Integer(0)]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(1)]),
            op("Tm", vec![Object::Integer(6), Object::Integer(0), Object::Integer(0), Object::Integer(6), Object::Integer(36), Object::Integer(300)]),
            op("Tj", vec![Object::string_literal("x")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(10)]),
            op("Tj", vec![Object::string_literal("y")]),
            op("ET", vec![]),
        ];
        let runs = extract_glyph_runs(&ops, &fonts());
        assert_eq!(runs.len(), 2);
        assert!((runs[0].font_size - 12.0).abs() < 1e-4);
        assert!((runs[0].x - 72.0).abs() < 1e-4);
        assert!((runs[0].y - 600.0).abs() < 1e-4);
        // Q restored the identity CTM.
        assert!((runs[1].font_size - 10.0).abs() < 1e-4);
    }

    #[test]
    fn leading_moves_to_the_next_line() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            op("TL", vec![Object::Integer(14)]),
            op("Td", vec![Object::Integer(72), Object::Integer(700)]),
            op("Tj", vec![Object::string_literal("one")]),
            op("T*", vec![]),
            op("Tj", vec![Object::string_literal("two")]),
            op("'", vec![Object::string_literal("three")]),
            op("ET", vec![]),
        ];
        let runs = extract_glyph_runs(&ops, &fonts());
        let baselines: Vec<f32> = runs.iter().map(|r| r.y).collect();
        assert_eq!(baselines, vec![700.0, 686.0, 672.0]);
        assert!(runs.iter().all(|r| (r.x - 72.0).abs() < 1e-4));
    }

    #[test]
    fn tj_kerning_narrows_the_run() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(10)]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("A"),
                    Object::Integer(250),
                    Object::string_literal("B"),
                ])],
            ),
            op("ET", vec![]),
        ];
        let runs = extract_glyph_runs(&ops, &fonts());
        // 2 × 2.5pt minus 2.5pt kerning
        assert!((runs[0].bounds.width() - 2.5).abs() < 1e-4);
    }

    #[test]
    fn whitespace_only_and_fontless_text_is_skipped() {
        let ops = vec![
            op("BT", vec![]),
            op("Tj", vec![Object::string_literal("no font yet")]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            op("Tj", vec![Object::string_literal("   ")]),
            op("ET", vec![]),
        ];
        assert!(extract_glyph_runs(&ops, &fonts()).is_empty());
    }

    #[test]
    fn unknown_font_resource_uses_its_key_as_family() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F9".to_vec()), Object::Integer(11)]),
            op("Tj", vec![Object::string_literal("text")]),
            op("ET", vec![]),
        ];
        let runs = extract_glyph_runs(&ops, &fonts());
        assert_eq!(runs[0].font_family, "F9");
        // default 0.5 em advance
        assert!((runs[0].bounds.width() - 22.0).abs() < 1e-4);
    }
}
