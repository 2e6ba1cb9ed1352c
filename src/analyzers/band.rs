use crate::analyzers::types::DailySeries;
use crate::analyzers::utility::{mean, median, stddev};
use crate::error::{PipelineError, Result};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fmt;

/// How busy the checkpoints are expected to be, relative to history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CongestionBand {
    VeryLow,
    Low,
    Normal,
    High,
    VeryHigh,
}

impl CongestionBand {
    pub const ALL: [CongestionBand; 5] = [
        CongestionBand::VeryLow,
        CongestionBand::Low,
        CongestionBand::Normal,
        CongestionBand::High,
        CongestionBand::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CongestionBand::VeryLow => "very-low",
            CongestionBand::Low => "low",
            CongestionBand::Normal => "normal",
            CongestionBand::High => "high",
            CongestionBand::VeryHigh => "very-high",
        }
    }

    /// Headline shown above the gauge.
    pub fn title(self) -> &'static str {
        match self {
            CongestionBand::VeryLow | CongestionBand::Low => {
                "Below normal wait times expected today"
            }
            CongestionBand::Normal => "Relatively normal wait times expected today",
            CongestionBand::High => "Above normal wait times expected today",
            CongestionBand::VeryHigh => "Long wait times expected today",
        }
    }

    /// Short status post for the social account.
    pub fn message(self) -> &'static str {
        match self {
            CongestionBand::VeryLow | CongestionBand::Low => {
                "AUS Airport is expected to be not busy today."
            }
            CongestionBand::Normal => "AUS Airport's wait times is expected to be normal today.",
            CongestionBand::High => "AUS Airport is expected to be busy today.",
            CongestionBand::VeryHigh => "AUS Airport is expected to be very busy today.",
        }
    }

    /// Gauge colour as `#rrggbb`.
    pub fn color(self) -> &'static str {
        match self {
            CongestionBand::VeryLow => "#1a9641",
            CongestionBand::Low => "#a6d96a",
            CongestionBand::Normal => "#ffffbf",
            CongestionBand::High => "#fdae61",
            CongestionBand::VeryHigh => "#d7191c",
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            CongestionBand::VeryLow => [0x1a, 0x96, 0x41],
            CongestionBand::Low => [0xa6, 0xd9, 0x6a],
            CongestionBand::Normal => [0xff, 0xff, 0xbf],
            CongestionBand::High => [0xfd, 0xae, 0x61],
            CongestionBand::VeryHigh => [0xd7, 0x19, 0x1c],
        }
    }
}

impl fmt::Display for CongestionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Band boundaries derived from a baseline's median `m` and standard
/// deviation `σ`.
///
/// | Band      | Range                      |
/// |-----------|----------------------------|
/// | very-low  | (−∞, m − σ]                |
/// | low       | (m − σ, m − σ/2]           |
/// | normal    | (m − σ/2, m + σ/2]         |
/// | high      | (m + σ/2, m + σ]           |
/// | very-high | (m + σ, ∞)                 |
///
/// `lowest` and `highest` (m ± 2σ) bound the gauge display only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandThresholds {
    pub median: f64,
    pub std_dev: f64,
    pub lowest: f64,
    pub v_low: f64,
    pub low: f64,
    pub high: f64,
    pub v_high: f64,
    pub highest: f64,
}

impl BandThresholds {
    pub const MIN_BASELINE: usize = 2;

    pub fn new(median: f64, std_dev: f64) -> Self {
        Self {
            median,
            std_dev,
            lowest: median - 2.0 * std_dev,
            v_low: median - std_dev,
            low: median - 0.5 * std_dev,
            high: median + 0.5 * std_dev,
            v_high: median + std_dev,
            highest: median + 2.0 * std_dev,
        }
    }

    /// Thresholds over an arbitrary baseline. `None` when fewer than two
    /// values are available.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < Self::MIN_BASELINE {
            return None;
        }
        let sd = stddev(values, mean(values));
        Some(Self::new(median(values), sd))
    }

    /// Thresholds over the days of `series` strictly older than `cutoff`.
    pub fn from_history(series: &DailySeries, cutoff: NaiveDate) -> Result<Self> {
        let baseline = series.values_before(cutoff);
        Self::from_values(&baseline).ok_or(PipelineError::InsufficientBaseline {
            cutoff,
            required: Self::MIN_BASELINE,
            actual: baseline.len(),
        })
    }

    pub fn classify(&self, value: f64) -> CongestionBand {
        match value {
            v if v <= self.v_low => CongestionBand::VeryLow,
            v if v <= self.low => CongestionBand::Low,
            v if v <= self.high => CongestionBand::Normal,
            v if v <= self.v_high => CongestionBand::High,
            _ => CongestionBand::VeryHigh,
        }
    }

    /// Display range of `band` on the gauge.
    pub fn display_range(&self, band: CongestionBand) -> (f64, f64) {
        match band {
            CongestionBand::VeryLow => (self.lowest, self.v_low),
            CongestionBand::Low => (self.v_low, self.low),
            CongestionBand::Normal => (self.low, self.high),
            CongestionBand::High => (self.high, self.v_high),
            CongestionBand::VeryHigh => (self.v_high, self.highest),
        }
    }
}

/// First day that is too recent to belong to the band baseline.
pub fn baseline_cutoff(today: NaiveDate, window_days: u64) -> NaiveDate {
    today
        .checked_sub_days(Days::new(window_days))
        .unwrap_or(NaiveDate::MIN)
}
