// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout analysis: font size and family distributions over all glyph runs,
// and per-page margin measurement against the MediaBox.

use std::collections::BTreeMap;

use pruefwerk_core::config::{FontFamilyMode, FontSizeMode, MarginRule};
use pruefwerk_core::{LayoutVerdicts, MarginOffsets, Page, Policy, Verdict};
use pruefwerk_document::pdf::glyphs::strip_subset_prefix;
use serde::Serialize;
use tracing::{debug, instrument};

/// Slack for float noise when comparing sizes and offsets.
const EPSILON: f32 = 1e-3;

/// Statistics gathered while judging the layout, for logs and the CLI summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutSummary {
    pub glyph_runs: usize,
    /// Rounded size in points → number of runs.
    pub size_histogram: BTreeMap<i64, u32>,
    pub dominant_size: Option<i64>,
    /// Family (subset prefix removed) → number of runs.
    pub family_histogram: BTreeMap<String, u32>,
    pub dominant_family: Option<String>,
    /// Pages that had a content box and were measured.
    pub measured_pages: Vec<u32>,
    /// Measured pages where at least one margin broke the rule.
    pub failing_margin_pages: Vec<u32>,
}

/// Verdicts plus the statistics behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutAnalysis {
    pub verdicts: LayoutVerdicts,
    pub summary: LayoutSummary,
}

/// Judges font size, font family, and margins against a [`Policy`].
#[derive(Debug, Clone)]
pub struct LayoutAnalyzer {
    policy: Policy,
}

impl LayoutAnalyzer {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn analyze(&self, pages: &[Page]) -> LayoutAnalysis {
        let mut summary = LayoutSummary::default();

        for run in pages.iter().flat_map(|page| &page.glyph_runs) {
            summary.glyph_runs += 1;
            *summary
                .size_histogram
                .entry(run.font_size.round() as i64)
                .or_insert(0) += 1;
            *summary
                .family_histogram
                .entry(strip_subset_prefix(&run.font_family).to_string())
                .or_insert(0) += 1;
        }
        summary.dominant_size = mode(&summary.size_histogram);
        summary.dominant_family = mode(&summary.family_histogram);

        let font_size = self.font_size_verdict(pages, &summary);
        let font_family = self.font_family_verdict(&summary);
        let margin = self.margin_verdict(pages, &mut summary);

        debug!(
            runs = summary.glyph_runs,
            dominant_size = ?summary.dominant_size,
            dominant_family = ?summary.dominant_family,
            failing_margin_pages = ?summary.failing_margin_pages,
            "layout statistics"
        );

        LayoutAnalysis {
            verdicts: LayoutVerdicts {
                font_size,
                font_family,
                margin,
            },
            summary,
        }
    }

    fn font_size_verdict(&self, pages: &[Page], summary: &LayoutSummary) -> Verdict {
        if summary.glyph_runs == 0 {
            return Verdict::Unknown;
        }
        let required = self.policy.required_font_size;
        match self.policy.font_size_mode {
            FontSizeMode::AllWithinTolerance => {
                let tolerance = self.policy.font_size_tolerance_pts + EPSILON;
                Verdict::from_bool(
                    pages
                        .iter()
                        .flat_map(|page| &page.glyph_runs)
                        .all(|run| (run.font_size - required).abs() <= tolerance),
                )
            }
            FontSizeMode::ModeMustMatch => {
                Verdict::from_bool(summary.dominant_size == Some(required.round() as i64))
            }
        }
    }

    fn font_family_verdict(&self, summary: &LayoutSummary) -> Verdict {
        if summary.glyph_runs == 0 {
            return Verdict::Unknown;
        }
        let tokens = family_tokens(&self.policy.required_font_family);
        match self.policy.font_family_mode {
            FontFamilyMode::Loose => Verdict::from_bool(
                summary
                    .family_histogram
                    .keys()
                    .any(|family| family_matches(family, &tokens)),
            ),
            FontFamilyMode::Strict => Verdict::from_bool(
                summary
                    .dominant_family
                    .as_deref()
                    .is_some_and(|family| family_matches(family, &tokens)),
            ),
        }
    }

    fn margin_verdict(&self, pages: &[Page], summary: &mut LayoutSummary) -> Verdict {
        for page in pages {
            let Some(content) = page.content_box else {
                continue;
            };
            summary.measured_pages.push(page.index);
            let offsets = content.offsets_within(&page.media_box);
            if !self.margins_comply(&offsets) {
                debug!(page = page.index, ?offsets, "margin out of tolerance");
                summary.failing_margin_pages.push(page.index);
            }
        }

        if summary.measured_pages.is_empty() {
            Verdict::Unknown
        } else {
            Verdict::from_bool(summary.failing_margin_pages.is_empty())
        }
    }

    fn margins_comply(&self, offsets: &MarginOffsets) -> bool {
        let required = self.policy.required_margin_pts;
        let tolerance = self.policy.margin_tolerance_pts + EPSILON;
        offsets.all().iter().all(|offset| match self.policy.margin_rule {
            MarginRule::Minimum => *offset >= required - tolerance,
            MarginRule::Exact => (*offset - required).abs() <= tolerance,
        })
    }
}

/// Most frequent key; on a tie the smallest key wins.
fn mode<K: Ord + Clone>(histogram: &BTreeMap<K, u32>) -> Option<K> {
    let mut best: Option<(&K, u32)> = None;
    for (key, count) in histogram {
        // Ascending iteration plus strict `>` keeps the smallest tied key.
        if best.is_none_or(|(_, top)| *count > top) {
            best = Some((key, *count));
        }
    }
    best.map(|(key, _)| key.clone())
}

/// Lowercase alphanumeric tokens of a family name: "Times New Roman" →
/// `["times", "new", "roman"]`.
fn family_tokens(family: &str) -> Vec<String> {
    family
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether an observed family name contains every required token once
/// reduced to lowercase alphanumerics.
fn family_matches(observed: &str, tokens: &[String]) -> bool {
    let normalized: String = strip_subset_prefix(observed)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    !tokens.is_empty() && tokens.iter().all(|token| normalized.contains(token.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pruefwerk_core::{BoundingBox, GlyphRun};

    fn run(size: f32, family: &str, bounds: BoundingBox) -> GlyphRun {
        GlyphRun {
            font_size: size,
            font_family: family.into(),
            x: bounds.x0,
            y: bounds.y0,
            bounds,
        }
    }

    /// A page whose text fills exactly the 1-inch margin box.
    fn page(index: u32, sizes: &[f32], family: &str) -> Page {
        let runs = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let y = 700.0 - 20.0 * i as f32;
                run(*size, family, BoundingBox::new(72.0, y, 300.0, y + 10.0))
            })
            .chain([
                run(12.0, family, BoundingBox::new(72.0, 710.0, 540.0, 720.0)),
                run(12.0, family, BoundingBox::new(72.0, 72.0, 200.0, 84.0)),
            ])
            .collect();
        Page::native(index, "text".into(), runs, BoundingBox::letter())
    }

    fn analyze(policy: Policy, pages: &[Page]) -> LayoutAnalysis {
        LayoutAnalyzer::new(policy).analyze(pages)
    }

    #[test]
    fn uniform_twelve_point_times_passes() {
        let pages = vec![page(1, &[12.0, 12.0], "TimesNewRomanPSMT"), page(2, &[12.0], "TimesNewRomanPSMT")];
        let analysis = analyze(Policy::default(), &pages);
        assert_eq!(analysis.verdicts.font_size, Verdict::Pass);
        assert_eq!(analysis.verdicts.font_family, Verdict::Pass);
        assert_eq!(analysis.verdicts.margin, Verdict::Pass);
        assert_eq!(analysis.summary.dominant_size, Some(12));
        assert_eq!(analysis.summary.measured_pages, vec![1, 2]);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let pages = vec![page(1, &[11.5, 11.5, 11.5], "Times-Roman")];
        let analysis = analyze(Policy::default(), &pages);
        assert_eq!(analysis.summary.size_histogram.get(&12), Some(&5));
        assert_eq!(analysis.verdicts.font_size, Verdict::Pass);
    }

    #[test]
    fn one_off_size_glyph_fails_all_within_tolerance() {
        let pages = vec![page(1, &[12.0, 12.0, 14.0], "Times-Roman")];
        let strict = Policy {
            font_size_mode: FontSizeMode::AllWithinTolerance,
            ..Policy::default()
        };
        assert_eq!(analyze(strict, &pages).verdicts.font_size, Verdict::Fail);
        // ...but the dominant size still matches.
        assert_eq!(analyze(Policy::default(), &pages).verdicts.font_size, Verdict::Pass);
    }

    #[test]
    fn within_tolerance_is_inclusive() {
        let pages = vec![page(1, &[12.5, 11.5], "Times-Roman")];
        let policy = Policy {
            font_size_mode: FontSizeMode::AllWithinTolerance,
            ..Policy::default()
        };
        assert_eq!(analyze(policy, &pages).verdicts.font_size, Verdict::Pass);
    }

    #[test]
    fn mode_tie_prefers_smallest_size() {
        let mut histogram = BTreeMap::new();
        histogram.insert(14_i64, 3);
        histogram.insert(10_i64, 3);
        histogram.insert(12_i64, 2);
        assert_eq!(mode(&histogram), Some(10));

        let mut families = BTreeMap::new();
        families.insert("Times".to_string(), 1);
        families.insert("Arial".to_string(), 1);
        assert_eq!(mode(&families), Some("Arial".to_string()));
        assert_eq!(mode::<i64>(&BTreeMap::new()), None);
    }

    #[test]
    fn family_matching_uses_tokens() {
        let tokens = family_tokens("Times New Roman");
        assert_eq!(tokens, vec!["times", "new", "roman"]);
        assert!(family_matches("ABCDEF+TimesNewRomanPS-BoldMT", &tokens));
        assert!(family_matches("Times New Roman,Italic", &tokens));
        assert!(!family_matches("Times-Roman", &tokens));
        assert!(!family_matches("Arial", &tokens));
    }

    #[test]
    fn strict_and_loose_family_modes() {
        let mut first = page(1, &[12.0, 12.0, 12.0], "Arial");
        first.glyph_runs.push(run(12.0, "TimesNewRomanPSMT", BoundingBox::new(72.0, 300.0, 100.0, 310.0)));
        let pages = vec![first];

        assert_eq!(analyze(Policy::default(), &pages).verdicts.font_family, Verdict::Fail);
        let loose = Policy {
            font_family_mode: FontFamilyMode::Loose,
            ..Policy::default()
        };
        assert_eq!(analyze(loose, &pages).verdicts.font_family, Verdict::Pass);
    }

    #[test]
    fn one_narrow_page_fails_the_margin() {
        let mut pages: Vec<Page> = (1..=5).map(|i| page(i, &[12.0], "Times-Roman")).collect();
        let narrow = run(12.0, "Times-Roman", BoundingBox::new(36.0, 400.0, 300.0, 410.0));
        pages[3] = Page::native(4, "text".into(), vec![narrow], BoundingBox::letter());

        let analysis = analyze(Policy::default(), &pages);
        assert_eq!(analysis.verdicts.margin, Verdict::Fail);
        assert_eq!(analysis.summary.failing_margin_pages, vec![4]);
    }

    #[test]
    fn wide_margins_fail_by_default() {
        let wide = run(12.0, "Times-Roman", BoundingBox::new(144.0, 400.0, 300.0, 410.0));
        let pages = vec![Page::native(1, "text".into(), vec![wide], BoundingBox::letter())];

        let analysis = analyze(Policy::default(), &pages);
        assert_eq!(analysis.verdicts.margin, Verdict::Fail);
        assert_eq!(analysis.summary.failing_margin_pages, vec![1]);

        let minimum = Policy {
            margin_rule: MarginRule::Minimum,
            ..Policy::default()
        };
        assert_eq!(analyze(minimum, &pages).verdicts.margin, Verdict::Pass);
    }

    #[test]
    fn margins_within_tolerance_pass_by_default() {
        let fitted = vec![page(1, &[12.0], "Times-Roman")];
        assert_eq!(analyze(Policy::default(), &fitted).verdicts.margin, Verdict::Pass);

        // 4pt too wide on the left, inside the 5pt tolerance.
        let shifted = run(12.0, "Times-Roman", BoundingBox::new(76.0, 72.0, 540.0, 720.0));
        let pages = vec![Page::native(1, "text".into(), vec![shifted], BoundingBox::letter())];
        assert_eq!(analyze(Policy::default(), &pages).verdicts.margin, Verdict::Pass);
    }

    #[test]
    fn ocr_only_document_is_unknown() {
        let pages = vec![
            Page::ocr(1, "scanned".into(), BoundingBox::letter()),
            Page::ocr(2, String::new(), BoundingBox::letter()),
        ];
        let analysis = analyze(Policy::default(), &pages);
        assert_eq!(analysis.verdicts, LayoutVerdicts::unknown());
        assert!(analysis.summary.measured_pages.is_empty());
    }

    #[test]
    fn ocr_pages_are_skipped_for_margins() {
        let pages = vec![
            page(1, &[12.0], "Times-Roman"),
            Page::ocr(2, "scanned".into(), BoundingBox::letter()),
        ];
        let analysis = analyze(Policy::default(), &pages);
        assert_eq!(analysis.verdicts.margin, Verdict::Pass);
        assert_eq!(analysis.summary.measured_pages, vec![1]);
    }
}
