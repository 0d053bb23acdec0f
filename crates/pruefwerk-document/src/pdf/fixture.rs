// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF fixture builder: assembles small proposal documents with `lopdf` so
// tests can exercise extraction and analysis without binary files on disk.
//
// Text pages place each line at an explicit baseline in a named Type1 font
// whose glyphs all advance 500/1000 em. Scan pages carry a single grayscale
// image XObject stretched over the page and no text layer at all.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pruefwerk_core::BoundingBox;
use pruefwerk_core::error::PruefwerkError;

/// Advance of every fixture glyph in 1/1000 em.
pub const FIXTURE_GLYPH_WIDTH: i64 = 500;

/// One line of text on a fixture page.
#[derive(Debug, Clone)]
pub struct FixtureLine {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub font: String,
    /// Horizontal scaling (`Tz`) in percent.
    pub scale: f32,
}

impl FixtureLine {
    pub fn new(text: impl Into<String>, x: f32, baseline: f32, size: f32, font: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            x,
            baseline,
            size,
            font: font.into(),
            scale: 100.0,
        }
    }

    /// Stretch the line horizontally so it is exactly `width` points wide.
    pub fn stretched_to(mut self, width: f32) -> Self {
        let natural = self.natural_width();
        if natural > 0.0 {
            self.scale = 100.0 * width / natural;
        }
        self
    }

    /// Width of the line when drawn with fixture metrics.
    pub fn width(&self) -> f32 {
        self.natural_width() * self.scale / 100.0
    }

    fn natural_width(&self) -> f32 {
        self.text.chars().count() as f32 * FIXTURE_GLYPH_WIDTH as f32 / 1000.0 * self.size
    }
}

#[derive(Debug, Clone)]
enum FixturePage {
    Text { lines: Vec<FixtureLine>, media_box: BoundingBox },
    Scan { width_px: u32, height_px: u32, media_box: BoundingBox },
}

/// Builder for in-memory test PDFs.
#[derive(Debug, Clone, Default)]
pub struct PdfFixture {
    pages: Vec<FixturePage>,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a US Letter page with the given lines.
    pub fn text_page(self, lines: Vec<FixtureLine>) -> Self {
        self.text_page_sized(lines, BoundingBox::letter())
    }

    pub fn text_page_sized(mut self, lines: Vec<FixtureLine>, media_box: BoundingBox) -> Self {
        self.pages.push(FixturePage::Text { lines, media_box });
        self
    }

    /// Append a US Letter page whose lines fill the area inside `margin`
    /// points on every side: top and bottom lines touch the margin and the
    /// first line is stretched to reach the right margin.
    pub fn body_page(self, lines: &[&str], font: &str, size: f32, margin: f32) -> Self {
        let page = BoundingBox::letter();
        let first = page.y1 - margin - 0.8 * size;
        let last = page.y0 + margin + 0.2 * size;
        let step = if lines.len() > 1 {
            (first - last) / (lines.len() - 1) as f32
        } else {
            0.0
        };
        let placed = lines
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let line = FixtureLine::new(*text, page.x0 + margin, first - step * i as f32, size, font);
                if i == 0 {
                    line.stretched_to(page.width() - 2.0 * margin)
                } else {
                    line
                }
            })
            .collect();
        self.text_page(placed)
    }

    /// Append a US Letter page holding only a `width_px`×`height_px` scan.
    pub fn scan_page(self, width_px: u32, height_px: u32) -> Self {
        self.scan_page_sized(width_px, height_px, BoundingBox::letter())
    }

    pub fn scan_page_sized(mut self, width_px: u32, height_px: u32, media_box: BoundingBox) -> Self {
        self.pages.push(FixturePage::Scan {
            width_px,
            height_px,
            media_box,
        });
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    // -- Output ---------------------------------------------------------------

    /// Serialise the document to PDF bytes.
    pub fn build(&self) -> Result<Vec<u8>, PruefwerkError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let (resources, operations, media_box) = match page {
                FixturePage::Text { lines, media_box } => {
                    let (resources, ops) = text_page_parts(&mut doc, lines);
                    (resources, ops, *media_box)
                }
                FixturePage::Scan {
                    width_px,
                    height_px,
                    media_box,
                } => {
                    let (resources, ops) = scan_page_parts(&mut doc, *width_px, *height_px, media_box);
                    (resources, ops, *media_box)
                }
            };

            let encoded = Content { operations }
                .encode()
                .map_err(|err| PruefwerkError::PdfError(format!("content encoding failed: {}", err)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let resources_id = doc.add_object(resources);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    media_box.x0.into(),
                    media_box.y0.into(),
                    media_box.x1.into(),
                    media_box.y1.into(),
                ],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| PruefwerkError::PdfError(format!("failed to serialise fixture: {}", err)))?;
        Ok(output)
    }

    /// Serialise the document and write it to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), PruefwerkError> {
        std::fs::write(path, self.build()?)?;
        Ok(())
    }
}

fn text_page_parts(doc: &mut Document, lines: &[FixtureLine]) -> (Dictionary, Vec<Operation>) {
    let mut font_keys: BTreeMap<&str, String> = BTreeMap::new();
    let mut font_dict = Dictionary::new();
    for line in lines {
        if font_keys.contains_key(line.font.as_str()) {
            continue;
        }
        let key = format!("F{}", font_keys.len() + 1);
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(line.font.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
            "FirstChar" => 32,
            "LastChar" => 126,
            "Widths" => vec![Object::Integer(FIXTURE_GLYPH_WIDTH); 95],
        });
        font_dict.set(key.as_bytes().to_vec(), font_id);
        font_keys.insert(line.font.as_str(), key);
    }

    let mut ops = Vec::new();
    for line in lines {
        let key = font_keys.get(line.font.as_str()).cloned().unwrap_or_default();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(key.into_bytes()), line.size.into()],
        ));
        ops.push(Operation::new("Tz", vec![line.scale.into()]));
        ops.push(Operation::new("Td", vec![line.x.into(), line.baseline.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(line.text.as_str())]));
        ops.push(Operation::new("ET", vec![]));
    }

    (dictionary! { "Font" => font_dict }, ops)
}

fn scan_page_parts(
    doc: &mut Document,
    width_px: u32,
    height_px: u32,
    media_box: &BoundingBox,
) -> (Dictionary, Vec<Operation>) {
    // Light background with dark horizontal bands where text lines would be.
    let mut pixels = vec![235u8; (width_px * height_px) as usize];
    for y in 0..height_px {
        if (y / 4) % 3 == 1 {
            let row = (y * width_px) as usize;
            for x in width_px / 8..width_px - width_px / 8 {
                pixels[row + x as usize] = 20;
            }
        }
    }

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        pixels,
    ));

    let ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                media_box.width().into(),
                Object::Integer(0),
                Object::Integer(0),
                media_box.height().into(),
                media_box.x0.into(),
                media_box.y0.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
        Operation::new("Q", vec![]),
    ];

    (dictionary! { "XObject" => dictionary! { "Im1" => image_id } }, ops)
}
