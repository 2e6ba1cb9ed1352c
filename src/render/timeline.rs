use std::fmt::Write as _;

use chrono::NaiveDate;

use super::escape;
use crate::analyzers::band::{BandThresholds, CongestionBand};
use crate::analyzers::types::CombinedRow;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 420.0;
const LEFT: f64 = 70.0;
const RIGHT: f64 = 20.0;
const TOP: f64 = 40.0;
const BOTTOM: f64 = 50.0;

const DATA_COLOR: &str = "rgb(49,130,189)";
const PREDICTION_COLOR: &str = "rgb(67,67,67)";
const SE_FILL: &str = "rgba(0,176,246,0.2)";
const TODAY_COLOR: &str = "rgb(161,32,41)";

/// Line chart of the combined table: observed passengers, the forecast mean
/// with a ±1 standard-error band, today's forecast marker and the congestion
/// bands shaded behind.
#[derive(Debug)]
pub struct Timeline<'a> {
    rows: &'a [CombinedRow],
    thresholds: BandThresholds,
    today: NaiveDate,
}

impl<'a> Timeline<'a> {
    pub fn new(rows: &'a [CombinedRow], thresholds: BandThresholds, today: NaiveDate) -> Self {
        Self {
            rows,
            thresholds,
            today,
        }
    }

    /// Vertical axis range: 80% of the smallest to 120% of the largest
    /// positive observation. Falls back to the forecast means when there is
    /// no observation.
    pub fn y_range(&self) -> (f64, f64) {
        let observed: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|r| r.passengers)
            .filter(|p| *p > 0.0)
            .collect();
        let values = if observed.is_empty() {
            self.rows.iter().filter_map(|r| r.mean).collect()
        } else {
            observed
        };

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() || max * 1.2 <= min * 0.8 {
            return (0.0, 1.0);
        }
        (min * 0.8, max * 1.2)
    }

    fn x(&self, index: usize) -> f64 {
        let n = self.rows.len().max(2) - 1;
        LEFT + (WIDTH - LEFT - RIGHT) * index as f64 / n as f64
    }

    fn y(&self, value: f64, range: (f64, f64)) -> f64 {
        let (lo, hi) = range;
        let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
        HEIGHT - BOTTOM - (HEIGHT - TOP - BOTTOM) * t
    }

    pub fn to_svg(&self) -> String {
        let range = self.y_range();
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" width="{WIDTH}" height="{HEIGHT}" role="img">"#
        );
        let _ = write!(
            svg,
            r#"<text x="{LEFT}" y="24" font-family="Arial" font-size="18">AUS Passengers Last 90 Days and Prediction</text>"#
        );

        self.write_bands(&mut svg, range);
        self.write_se_band(&mut svg, range);
        write_polyline(&mut svg, &self.series(|r| r.passengers, range), DATA_COLOR, 4.0);
        write_polyline(&mut svg, &self.series(|r| r.mean, range), PREDICTION_COLOR, 2.0);
        self.write_today(&mut svg, range);
        self.write_axes(&mut svg, range);

        svg.push_str("</svg>");
        svg
    }

    fn write_bands(&self, svg: &mut String, range: (f64, f64)) {
        let t = &self.thresholds;
        let bounds = [
            (CongestionBand::VeryLow, 0.0, t.v_low),
            (CongestionBand::Low, t.v_low, t.low),
            (CongestionBand::Normal, t.low, t.high),
            (CongestionBand::High, t.high, t.v_high),
            (CongestionBand::VeryHigh, t.v_high, range.1),
        ];
        for (band, lo, hi) in bounds {
            let top = self.y(hi, range);
            let bottom = self.y(lo, range);
            if bottom - top <= 0.0 {
                continue;
            }
            let _ = write!(
                svg,
                r#"<rect x="{LEFT}" y="{top:.1}" width="{:.1}" height="{:.1}" fill="{}" fill-opacity="0.1"/>"#,
                WIDTH - LEFT - RIGHT,
                bottom - top,
                band.color()
            );
        }
    }

    fn write_se_band(&self, svg: &mut String, range: (f64, f64)) {
        let forecast: Vec<(usize, f64, f64)> = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| Some((i, r.mean?, r.mean_se?)))
            .collect();
        if forecast.len() < 2 {
            return;
        }

        let upper = forecast
            .iter()
            .map(|(i, m, se)| format!("{:.1},{:.1}", self.x(*i), self.y(m + se, range)));
        let lower = forecast
            .iter()
            .rev()
            .map(|(i, m, se)| format!("{:.1},{:.1}", self.x(*i), self.y(m - se, range)));
        let points: Vec<String> = upper.chain(lower).collect();
        let _ = write!(
            svg,
            r#"<polygon points="{}" fill="{SE_FILL}" stroke="none"/>"#,
            points.join(" ")
        );
    }

    /// Screen runs of consecutive rows where `value` is present.
    fn series<F>(&self, value: F, range: (f64, f64)) -> Vec<Vec<(f64, f64)>>
    where
        F: Fn(&CombinedRow) -> Option<f64>,
    {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            match value(row) {
                Some(v) => current.push((self.x(i), self.y(v, range))),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    fn write_today(&self, svg: &mut String, range: (f64, f64)) {
        let Some((i, mean)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.date == self.today)
            .and_then(|(i, r)| Some((i, r.mean?)))
        else {
            return;
        };
        let _ = write!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="6" fill="{TODAY_COLOR}" stroke="mediumpurple" stroke-width="2"><title>{}</title></circle>"#,
            self.x(i),
            self.y(mean, range),
            escape(&format!("Today's prediction: {mean:.0}"))
        );
    }

    fn write_axes(&self, svg: &mut String, range: (f64, f64)) {
        let baseline = HEIGHT - BOTTOM;
        let _ = write!(
            svg,
            r#"<path d="M {LEFT} {TOP} V {baseline} H {}" fill="none" stroke="rgb(204,204,204)" stroke-width="2"/>"#,
            WIDTH - RIGHT
        );
        for value in [range.0, (range.0 + range.1) / 2.0, range.1] {
            let _ = write!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-family="Arial" font-size="12" fill="rgb(82,82,82)">{value:.0}</text>"#,
                LEFT - 6.0,
                self.y(value, range) + 4.0
            );
        }
        if let (Some(first), Some(last)) = (self.rows.first(), self.rows.last()) {
            for (i, date) in [(0, first.date), (self.rows.len() - 1, last.date)] {
                let _ = write!(
                    svg,
                    r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-family="Arial" font-size="12" fill="rgb(82,82,82)">{date}</text>"#,
                    self.x(i),
                    baseline + 20.0
                );
            }
        }
    }
}

fn write_polyline(svg: &mut String, runs: &[Vec<(f64, f64)>], color: &str, width: f64) {
    for run in runs {
        let points: Vec<String> = run.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
        let _ = write!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="{width}"/>"#,
            points.join(" ")
        );
    }
}
