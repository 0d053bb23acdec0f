// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan cleanup before OCR: grayscale, contrast boost, and binarization of
// rasterized page scans.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use tracing::{debug, instrument};

/// Contrast factor applied before binarization.
const OCR_CONTRAST: f32 = 40.0;

/// Cleans up a rasterized scan so the recognizer sees crisp dark-on-light text.
pub struct ScanEnhancer {
    image: DynamicImage,
}

impl ScanEnhancer {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Individual steps -----------------------------------------------------

    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Adjust contrast; positive values increase it, negative decrease it.
    pub fn adjust_contrast(self, contrast: f32) -> Self {
        Self {
            image: self.image.adjust_contrast(contrast),
        }
    }

    /// Global binarization at the threshold chosen by Otsu's method.
    #[instrument(skip(self))]
    pub fn binarize_otsu(self) -> Self {
        let gray = self.image.to_luma8();
        let threshold = otsu_level(&gray);
        debug!(threshold, "Otsu threshold computed");
        Self {
            image: DynamicImage::ImageLuma8(threshold_image(&gray, threshold)),
        }
    }

    // -- Pipeline -------------------------------------------------------------

    /// Grayscale, contrast boost, then Otsu binarization.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn prepare_for_ocr(self) -> Self {
        self.grayscale().adjust_contrast(OCR_CONTRAST).binarize_otsu()
    }
}

/// Pixels darker than `threshold` become black, everything else white.
fn threshold_image(gray: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0];
        Luma([if value < threshold { 0 } else { 255 }])
    })
}
