use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tracing::debug;

use super::escape;
use crate::analyzers::band::{BandThresholds, CongestionBand};
use crate::error::{PipelineError, Result};

pub const WIDTH: u32 = 700;
pub const HEIGHT: u32 = 420;

const CENTER: (f64, f64) = (WIDTH as f64 / 2.0, HEIGHT as f64 - 60.0);
const BAND_OUTER: f64 = 300.0;
const BAND_INNER: f64 = 180.0;
const BAR_OUTER: f64 = 265.0;
const BAR_INNER: f64 = 215.0;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// One coloured band of the gauge dial, as fractions of the dial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeSegment {
    pub band: CongestionBand,
    pub start: f64,
    pub end: f64,
}

/// Semicircular dial over `[lowest, highest]` with five band segments and a
/// bar filled up to today's forecast.
#[derive(Debug, Clone, Copy)]
pub struct Gauge {
    thresholds: BandThresholds,
    value: f64,
}

impl Gauge {
    pub fn new(thresholds: BandThresholds, value: f64) -> Self {
        Self { thresholds, value }
    }

    pub fn band(&self) -> CongestionBand {
        self.thresholds.classify(self.value)
    }

    pub fn title(&self) -> &'static str {
        self.band().title()
    }

    fn span(&self) -> f64 {
        self.thresholds.highest - self.thresholds.lowest
    }

    /// Position of `x` on the dial, clamped to `[0, 1]`. A zero-width
    /// baseline puts every value at the centre.
    pub fn fraction(&self, x: f64) -> f64 {
        let span = self.span();
        if span > 0.0 {
            ((x - self.thresholds.lowest) / span).clamp(0.0, 1.0)
        } else {
            0.5
        }
    }

    pub fn value_fraction(&self) -> f64 {
        self.fraction(self.value)
    }

    pub fn segments(&self) -> [GaugeSegment; 5] {
        let span = self.span();
        let even = span.is_nan() || span <= 0.0;
        CongestionBand::ALL.map(|band| {
            if even {
                let i = band as usize as f64;
                return GaugeSegment {
                    band,
                    start: i / 5.0,
                    end: (i + 1.0) / 5.0,
                };
            }
            let (lo, hi) = self.thresholds.display_range(band);
            GaugeSegment {
                band,
                start: self.fraction(lo),
                end: self.fraction(hi),
            }
        })
    }

    /// Draws the dial to `path` as a PNG of [`WIDTH`] × [`HEIGHT`] pixels.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn render_png(&self, path: &Path) -> Result<()> {
        let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);

        for segment in self.segments() {
            if let Some(poly) = sector(segment.start, segment.end, BAND_INNER, BAND_OUTER) {
                draw_polygon_mut(&mut img, &poly, Rgb(segment.band.rgb()));
            }
        }
        if let Some(poly) = sector(0.0, self.value_fraction(), BAR_INNER, BAR_OUTER) {
            draw_polygon_mut(&mut img, &poly, BLACK);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save_with_format(path, ImageFormat::Png)
            .map_err(|e| PipelineError::Render(format!("{}: {e}", path.display())))?;

        debug!(band = %self.band(), value = self.value, "Gauge written");
        Ok(())
    }

    /// The same dial as an inline SVG element with the band title above it.
    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" width="{WIDTH}" height="{HEIGHT}" role="img">"#
        );
        let _ = write!(
            svg,
            r#"<text x="{:.0}" y="30" text-anchor="middle" font-family="Arial" font-size="22">{}</text>"#,
            CENTER.0,
            escape(self.title())
        );
        for segment in self.segments() {
            if segment.end > segment.start {
                let _ = write!(
                    svg,
                    r#"<path d="{}" fill="{}"/>"#,
                    arc_path(segment.start, segment.end, BAND_INNER, BAND_OUTER),
                    segment.band.color()
                );
            }
        }
        let value = self.value_fraction();
        if value > 0.0 {
            let _ = write!(
                svg,
                r#"<path d="{}" fill="black"/>"#,
                arc_path(0.0, value, BAR_INNER, BAR_OUTER)
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

/// Screen point at dial fraction `f` and radius `r`. Fraction 0 is the left
/// end of the dial, 1 the right end.
fn polar(f: f64, r: f64) -> (f64, f64) {
    let theta = PI * (1.0 - f);
    (CENTER.0 + r * theta.cos(), CENTER.1 - r * theta.sin())
}

/// Annular sector as a polygon: outer arc left to right, inner arc back.
fn sector(start: f64, end: f64, inner: f64, outer: f64) -> Option<Vec<Point<i32>>> {
    if end <= start {
        return None;
    }
    let steps = ((end - start) * 180.0).ceil().max(2.0) as usize;
    let along = |r: f64| {
        (0..=steps).map(move |i| {
            let f = start + (end - start) * i as f64 / steps as f64;
            let (x, y) = polar(f, r);
            Point::new(x.round() as i32, y.round() as i32)
        })
    };

    let mut poly: Vec<Point<i32>> = along(outer).collect();
    let mut back: Vec<Point<i32>> = along(inner).collect();
    back.reverse();
    poly.extend(back);
    poly.dedup();
    (poly.len() >= 3 && poly.first() != poly.last()).then_some(poly)
}

fn arc_path(start: f64, end: f64, inner: f64, outer: f64) -> String {
    let (ox0, oy0) = polar(start, outer);
    let (ox1, oy1) = polar(end, outer);
    let (ix1, iy1) = polar(end, inner);
    let (ix0, iy0) = polar(start, inner);
    format!(
        "M {ox0:.1} {oy0:.1} A {outer} {outer} 0 0 1 {ox1:.1} {oy1:.1} L {ix1:.1} {iy1:.1} A {inner} {inner} 0 0 0 {ix0:.1} {iy0:.1} Z"
    )
}
