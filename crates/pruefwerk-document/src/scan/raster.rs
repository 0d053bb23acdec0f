// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization for scanned pages. An image-only page is the scanner's
// bitmap stretched over the MediaBox, so rasterizing it means decoding the
// page's largest image XObject and resampling it to the requested DPI.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Object, ObjectId, Stream};
use pruefwerk_core::error::PruefwerkError;
use tracing::{debug, instrument, warn};

use crate::pdf::reader::{PdfReader, number};

/// Upper bound on the pixels of one rasterized page. US Letter at 600 DPI
/// fits; larger pages are rendered at a reduced resolution.
pub const MAX_RASTER_PIXELS: u64 = 40_000_000;

/// Decode the page's dominant scan image and resample it to `dpi`.
///
/// Returns `Ok(None)` when the page draws no decodable image.
#[instrument(skip(reader))]
pub fn rasterize_page(
    reader: &PdfReader,
    page_id: ObjectId,
    dpi: u32,
) -> Result<Option<DynamicImage>, PruefwerkError> {
    let mut best: Option<DynamicImage> = None;
    for stream in reader.page_images(page_id) {
        match decode_image(stream) {
            Ok(image) => {
                let area = u64::from(image.width()) * u64::from(image.height());
                let best_area = best
                    .as_ref()
                    .map(|b| u64::from(b.width()) * u64::from(b.height()))
                    .unwrap_or(0);
                if area > best_area {
                    best = Some(image);
                }
            }
            Err(err) => warn!(?page_id, %err, "skipping undecodable page image"),
        }
    }

    let Some(image) = best else {
        return Ok(None);
    };

    let media_box = reader.media_box(page_id);
    let (width, height) = raster_size(media_box.width(), media_box.height(), dpi);
    debug!(
        source_width = image.width(),
        source_height = image.height(),
        width,
        height,
        "resampling scan"
    );

    Ok(Some(image.resize_exact(width, height, FilterType::Triangle)))
}

/// Target raster dimensions for a page of `width_pt`×`height_pt` at `dpi`,
/// with the resolution lowered until the page fits `MAX_RASTER_PIXELS`.
fn raster_size(width_pt: f32, height_pt: f32, dpi: u32) -> (u32, u32) {
    let mut width = (f64::from(width_pt) / 72.0 * f64::from(dpi)).round().max(1.0);
    let mut height = (f64::from(height_pt) / 72.0 * f64::from(dpi)).round().max(1.0);

    let pixels = width * height;
    if pixels > MAX_RASTER_PIXELS as f64 {
        let scale = (MAX_RASTER_PIXELS as f64 / pixels).sqrt();
        let effective_dpi = (f64::from(dpi) * scale).floor();
        warn!(
            requested_dpi = dpi,
            effective_dpi,
            width_pt,
            height_pt,
            "page too large to rasterize at the requested DPI; reducing resolution"
        );
        width = (width * scale).floor().max(1.0);
        height = (height * scale).floor().max(1.0);
    }

    (width as u32, height as u32)
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(stream: &Stream, key: &[u8]) -> Result<u32, PruefwerkError> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(number)
        .filter(|v| *v >= 1.0)
        .map(|v| v as u32)
        .ok_or_else(|| {
            PruefwerkError::ImageError(format!(
                "image is missing /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

/// Decode an image XObject into pixels.
///
/// Handles JPEG (`DCTDecode`) streams and Flate-compressed or raw samples in
/// DeviceGray, DeviceRGB, or DeviceCMYK at 8 bits, plus 1-bit grayscale.
pub fn decode_image(stream: &Stream) -> Result<DynamicImage, PruefwerkError> {
    let filters = filters(stream);

    if filters.iter().any(|f| f.as_slice() == b"DCTDecode") {
        let data = if filters.len() > 1 {
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())
        } else {
            stream.content.clone()
        };
        return image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
            .map_err(|err| PruefwerkError::ImageError(format!("JPEG decode failed: {}", err)));
    }

    if let Some(unsupported) = filters
        .iter()
        .find(|f| matches!(f.as_slice(), b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode"))
    {
        return Err(PruefwerkError::ImageError(format!(
            "unsupported image filter {}",
            String::from_utf8_lossy(unsupported)
        )));
    }

    let width = dimension(stream, b"Width")?;
    let height = dimension(stream, b"Height")?;
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(number)
        .map(|v| v as u32)
        .unwrap_or(8);

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|err| PruefwerkError::ImageError(format!("image stream decode failed: {}", err)))?
    };

    let pixels = sample_len(width as usize, height as usize, 1)?;
    let components = match stream.dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) => match name.as_slice() {
            b"DeviceGray" | b"G" => 1,
            b"DeviceRGB" | b"RGB" => 3,
            b"DeviceCMYK" | b"CMYK" => 4,
            _ => infer_components(samples.len(), pixels, bits),
        },
        _ => infer_components(samples.len(), pixels, bits),
    };

    match (components, bits) {
        (1, 1) => Ok(DynamicImage::ImageLuma8(expand_one_bit(&samples, width, height)?)),
        (1, 8) => GrayImage::from_raw(width, height, truncate(samples, pixels))
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| short_stream(width, height)),
        (3, 8) => RgbImage::from_raw(width, height, truncate(samples, sample_len(pixels, 3, 1)?))
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| short_stream(width, height)),
        (4, 8) => {
            let len = sample_len(pixels, 4, 1)?;
            if samples.len() < len {
                return Err(short_stream(width, height));
            }
            let rgb: Vec<u8> = samples[..len]
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 255 - u16::from(cmyk[3]);
                    [0, 1, 2].map(|i| ((255 - u16::from(cmyk[i])) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| short_stream(width, height))
        }
        (components, bits) => Err(PruefwerkError::ImageError(format!(
            "unsupported image layout: {} components at {} bits",
            components, bits
        ))),
    }
}

fn sample_len(a: usize, b: usize, c: usize) -> Result<usize, PruefwerkError> {
    a.checked_mul(b)
        .and_then(|n| n.checked_mul(c))
        .ok_or_else(|| PruefwerkError::ImageError(format!("image dimensions overflow: {}x{}x{}", a, b, c)))
}

/// Guess the component count for indexed or ICC-based colour spaces from
/// the sample count.
fn infer_components(len: usize, pixels: usize, bits: u32) -> usize {
    if bits != 8 || pixels == 0 {
        return 1;
    }
    match len / pixels {
        n @ (3 | 4) => n,
        _ => 1,
    }
}

fn truncate(mut samples: Vec<u8>, len: usize) -> Vec<u8> {
    samples.truncate(len);
    samples
}

fn short_stream(width: u32, height: u32) -> PruefwerkError {
    PruefwerkError::ImageError(format!("image data too short for {}x{}", width, height))
}

/// 1-bit rows are padded to a whole byte; a set bit is white.
fn expand_one_bit(samples: &[u8], width: u32, height: u32) -> Result<GrayImage, PruefwerkError> {
    let stride = (width as usize).div_ceil(8);
    if samples.len() < sample_len(stride, height as usize, 1)? {
        return Err(short_stream(width, height));
    }
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let byte = samples[y as usize * stride + x as usize / 8];
        let bit = (byte >> (7 - (x % 8))) & 1;
        image::Luma([if bit == 1 { 255 } else { 0 }])
    }))
}
