// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction: turns a submitted PDF into pages of text and glyph layout,
// falling back to OCR for pages that have no text layer.

use std::path::Path;
use std::sync::Arc;

use pruefwerk_core::config::OcrSettings;
use pruefwerk_core::error::PruefwerkError;
use pruefwerk_core::{DocumentType, Page};
use tracing::{debug, info, instrument, warn};

use crate::fingerprint::{hash_bytes, short_id};
use crate::pdf::reader::PdfReader;
use crate::scan::{ScanEnhancer, TextRecognizer, rasterize_page};

/// Pages extracted from one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub pages: Vec<Page>,
    /// 1-based indices of pages that had no text layer and went through OCR,
    /// whether or not recognition produced anything.
    pub ocr_pages: Vec<u32>,
    /// SHA-256 of the document bytes.
    pub fingerprint: String,
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        !self.ocr_pages.is_empty()
    }
}

/// Extracts per-page text and layout from PDF documents.
///
/// Immutable once built, so one extractor can serve many documents.
#[derive(Clone)]
pub struct TextExtractor {
    recognizer: Option<Arc<dyn TextRecognizer>>,
    dpi: u32,
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("ocr", &self.recognizer.is_some())
            .field("dpi", &self.dpi)
            .finish()
    }
}

impl TextExtractor {
    /// An extractor without OCR: image-only pages come back empty.
    pub fn new(dpi: u32) -> Self {
        Self {
            recognizer: None,
            dpi,
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Build from settings, loading the OCR engine when the `ocr` feature is
    /// compiled in and OCR is enabled. A missing model degrades to no OCR.
    pub fn from_settings(settings: &OcrSettings) -> Self {
        let extractor = Self::new(settings.dpi);
        if !settings.enabled {
            debug!("OCR disabled by configuration");
            return extractor;
        }

        #[cfg(feature = "ocr")]
        {
            let config = crate::scan::OcrConfig::from_optional_dir(settings.model_dir.as_deref());
            match crate::scan::OcrEngine::new(config) {
                Ok(engine) => return extractor.with_recognizer(Arc::new(engine)),
                Err(err) => warn!(%err, "OCR engine unavailable, scanned pages will have no text"),
            }
        }

        #[cfg(not(feature = "ocr"))]
        debug!("built without the `ocr` feature, scanned pages will have no text");

        extractor
    }

    pub fn has_ocr(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Reject anything that is not named `*.pdf`, without touching the filesystem.
    pub fn check_extension(name: &str) -> Result<(), PruefwerkError> {
        match DocumentType::from_path(Path::new(name)) {
            Some(DocumentType::Pdf) => Ok(()),
            _ => Err(PruefwerkError::InvalidFormat(name.to_string())),
        }
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract every page of the PDF at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<Extraction, PruefwerkError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        Self::check_extension(&name)?;

        let data = std::fs::read(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => PruefwerkError::NotFound(name.clone()),
            _ => PruefwerkError::Io(err),
        })?;

        self.extract_bytes(&name, &data)
    }

    /// Extract every page of a PDF already in memory. `name` is only used for
    /// the extension check and log output.
    #[instrument(skip_all, fields(name = %name, bytes_len = data.len()))]
    pub fn extract_bytes(&self, name: &str, data: &[u8]) -> Result<Extraction, PruefwerkError> {
        Self::check_extension(name)?;

        let fingerprint = hash_bytes(data);
        let reader = PdfReader::from_bytes(data)?;
        info!(
            document = short_id(&fingerprint),
            pages = reader.page_count(),
            "Document opened"
        );

        let mut pages = Vec::with_capacity(reader.page_count());
        let mut ocr_pages = Vec::new();

        for (index, page_id) in reader.pages() {
            let media_box = reader.media_box(page_id);
            let text = reader.page_text(index).unwrap_or_else(|err| {
                warn!(page = index, %err, "no usable text layer");
                String::new()
            });

            if !text.trim().is_empty() {
                let runs = reader.glyph_runs(page_id).unwrap_or_else(|err| {
                    warn!(page = index, %err, "undecodable page content, layout skipped");
                    Vec::new()
                });
                debug!(page = index, runs = runs.len(), "native page");
                pages.push(Page::native(index, text, runs, media_box));
            } else {
                let text = self.recognize_page(&reader, index, page_id);
                ocr_pages.push(index);
                pages.push(Page::ocr(index, text, media_box));
            }
        }

        if !ocr_pages.is_empty() {
            info!(ocr_pages = ?ocr_pages, "OCR used for pages without a text layer");
        }

        Ok(Extraction {
            pages,
            ocr_pages,
            fingerprint,
        })
    }

    /// OCR text for a page; empty whenever any step is unavailable or fails.
    fn recognize_page(&self, reader: &PdfReader, index: u32, page_id: lopdf::ObjectId) -> String {
        let Some(recognizer) = &self.recognizer else {
            warn!(page = index, "page has no text layer and OCR is unavailable");
            return String::new();
        };

        let raster = match rasterize_page(reader, page_id, self.dpi) {
            Ok(Some(raster)) => raster,
            Ok(None) => {
                debug!(page = index, "page has neither text nor a scan image");
                return String::new();
            }
            Err(err) => {
                warn!(page = index, %err, "rasterization failed");
                return String::new();
            }
        };

        let prepared = ScanEnhancer::from_dynamic(raster).prepare_for_ocr().into_dynamic();
        recognizer.recognize_text(&prepared).unwrap_or_else(|err| {
            warn!(page = index, %err, "OCR failed");
            String::new()
        })
    }
}
