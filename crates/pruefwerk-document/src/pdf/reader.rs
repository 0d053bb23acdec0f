// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open existing PDF documents with `lopdf` and expose what the
// analyzer needs per page: text, glyph runs, page extent, fonts, and
// embedded scan images.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pruefwerk_core::error::PruefwerkError;
use pruefwerk_core::{BoundingBox, GlyphRun};
use tracing::{debug, instrument, warn};

use crate::pdf::glyphs::{FontMetrics, extract_glyph_runs};

/// Guard against cyclic `/Parent` chains and reference loops.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Reads an existing PDF document.
///
/// Always parsed from an in-memory buffer, so a reader never holds a file
/// handle.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PruefwerkError> {
        let document = Document::load_mem(data).map_err(|err| {
            PruefwerkError::CorruptDocument(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page numbers (1-indexed) with their object ids, in document order.
    pub fn pages(&self) -> Vec<(u32, ObjectId)> {
        // get_pages() is a BTreeMap keyed by page number, so this is ordered.
        self.document.get_pages().into_iter().collect()
    }

    // -- Per-page extraction --------------------------------------------------

    /// Extract the text layer of a single page (1-indexed).
    pub fn page_text(&self, page_number: u32) -> Result<String, PruefwerkError> {
        self.document.extract_text(&[page_number]).map_err(|err| {
            PruefwerkError::PdfError(format!(
                "text extraction failed on page {}: {}",
                page_number, err
            ))
        })
    }

    /// Walk the page's content stream and collect its glyph runs.
    ///
    /// Only the page's own content stream is interpreted; text drawn inside
    /// form XObjects is not visited.
    pub fn glyph_runs(&self, page_id: ObjectId) -> Result<Vec<GlyphRun>, PruefwerkError> {
        let raw = self.document.get_page_content(page_id).map_err(|err| {
            PruefwerkError::PdfError(format!("cannot read content of {:?}: {}", page_id, err))
        })?;
        let content = Content::decode(&raw).map_err(|err| {
            PruefwerkError::PdfError(format!("cannot decode content of {:?}: {}", page_id, err))
        })?;
        let fonts = self.page_fonts(page_id);
        Ok(extract_glyph_runs(&content.operations, &fonts))
    }

    /// The page's MediaBox, following `/Parent` inheritance.
    ///
    /// Falls back to US Letter when no usable box is declared.
    pub fn media_box(&self, page_id: ObjectId) -> BoundingBox {
        let declared = self
            .inherited_attribute(page_id, b"MediaBox")
            .and_then(|object| match object {
                Object::Array(values) if values.len() == 4 => {
                    let numbers: Vec<f32> = values
                        .iter()
                        .filter_map(|value| number(self.resolve(value)?))
                        .collect();
                    (numbers.len() == 4)
                        .then(|| BoundingBox::new(numbers[0], numbers[1], numbers[2], numbers[3]))
                }
                _ => None,
            });

        declared.unwrap_or_else(|| {
            warn!(?page_id, "page has no usable MediaBox, assuming US Letter");
            BoundingBox::letter()
        })
    }

    /// Fonts available to the page, keyed by resource name (`F1`, ...).
    pub fn page_fonts(&self, page_id: ObjectId) -> BTreeMap<Vec<u8>, FontMetrics> {
        let mut fonts = BTreeMap::new();
        let Some(resources) = self.page_resources(page_id) else {
            return fonts;
        };
        let Some(font_dict) = self.dictionary_entry(resources, b"Font") else {
            return fonts;
        };

        for (key, value) in font_dict.iter() {
            if let Some(Object::Dictionary(font)) = self.resolve(value) {
                fonts.insert(key.clone(), self.font_metrics(key, font));
            }
        }
        fonts
    }

    /// Image XObjects drawn on the page (scan layers).
    pub fn page_images(&self, page_id: ObjectId) -> Vec<&Stream> {
        let Some(resources) = self.page_resources(page_id) else {
            return Vec::new();
        };
        let Some(xobjects) = self.dictionary_entry(resources, b"XObject") else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, value)| match self.resolve(value) {
                Some(Object::Stream(stream)) if is_image(&stream.dict) => Some(stream),
                _ => None,
            })
            .collect()
    }

    // -- Helpers --------------------------------------------------------------

    /// Follow a chain of indirect references to the target object.
    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        let mut current = object;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            match current {
                Object::Reference(id) => current = self.document.get_object(*id).ok()?,
                other => return Some(other),
            }
        }
        None
    }

    /// Look up `key` on the page dictionary or the nearest ancestor that has it.
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = node.get(key) {
                return self.resolve(value);
            }
            node = match node.get(b"Parent").ok().and_then(|p| self.resolve(p)) {
                Some(Object::Dictionary(parent)) => parent,
                _ => return None,
            };
        }
        None
    }

    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        match self.inherited_attribute(page_id, b"Resources")? {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    fn dictionary_entry<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        match self.resolve(dict.get(key).ok()?)? {
            Object::Dictionary(entry) => Some(entry),
            _ => None,
        }
    }

    fn font_metrics(&self, key: &[u8], font: &Dictionary) -> FontMetrics {
        let base_font = match font.get(b"BaseFont").ok().and_then(|v| self.resolve(v)) {
            Some(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
            _ => String::from_utf8_lossy(key).into_owned(),
        };
        let two_byte = matches!(
            font.get(b"Subtype").ok().and_then(|v| self.resolve(v)),
            Some(Object::Name(subtype)) if subtype.as_slice() == b"Type0"
        );
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|v| self.resolve(v))
            .and_then(number)
            .map(|v| v.max(0.0) as u32)
            .unwrap_or(0);
        let widths = match font.get(b"Widths").ok().and_then(|v| self.resolve(v)) {
            Some(Object::Array(values)) => values
                .iter()
                .map(|value| self.resolve(value).and_then(number).unwrap_or(0.0))
                .collect(),
            _ => Vec::new(),
        };

        FontMetrics::new(base_font, first_char, widths, two_byte)
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype.as_slice() == b"Image")
}

/// Read a numeric PDF object.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}
