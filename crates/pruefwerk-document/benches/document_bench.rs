// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the pruefwerk-document crate: glyph extraction over
// a dense text page, and scan cleanup ahead of OCR.

use std::collections::BTreeMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};
use lopdf::Object;
use lopdf::content::Operation;

use pruefwerk_document::ScanEnhancer;
use pruefwerk_document::pdf::{FontMetrics, extract_glyph_runs};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A page of 50 lines, each its own BT/ET block like typical word-processor output.
fn bench_glyph_extraction(c: &mut Criterion) {
    let mut fonts = BTreeMap::new();
    fonts.insert(
        b"F1".to_vec(),
        FontMetrics::new("ABCDEF+TimesNewRomanPSMT", 32, vec![500.0; 95], false),
    );

    let mut ops = Vec::new();
    for line in 0..50 {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
        ));
        ops.push(Operation::new(
            "Td",
            vec![Object::Integer(72), Object::Integer(708 - line * 13)],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(
                "The offeror shall describe the technical approach in detail.",
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    c.bench_function("glyph_extraction (50 lines)", |b| {
        b.iter(|| black_box(extract_glyph_runs(black_box(&ops), &fonts)));
    });
}

/// Grayscale, contrast, and Otsu over a 850x1100 synthetic scan (US Letter at 100 DPI).
fn bench_prepare_for_ocr(c: &mut Criterion) {
    let img = GrayImage::from_fn(850, 1100, |x, y| {
        if (y / 6) % 3 == 1 && x > 100 && x < 750 {
            Luma([30u8])
        } else {
            Luma([225u8])
        }
    });
    let dynamic = DynamicImage::ImageLuma8(img);

    c.bench_function("prepare_for_ocr (850x1100)", |b| {
        b.iter(|| {
            let enhancer = ScanEnhancer::from_dynamic(black_box(dynamic.clone()));
            black_box(enhancer.prepare_for_ocr().into_dynamic());
        });
    });
}

criterion_group!(benches, bench_glyph_extraction, bench_prepare_for_ocr);
criterion_main!(benches);
