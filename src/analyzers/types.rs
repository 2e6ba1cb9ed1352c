//! Data types used by the aggregation, forecasting and persistence stages.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::{PipelineError, Result};

/// AUS security checkpoints, in feed column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    Aus01,
    Aus02,
    Aus02E,
    Aus02W,
    Aus03,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 5] = [
        Checkpoint::Aus01,
        Checkpoint::Aus02,
        Checkpoint::Aus02E,
        Checkpoint::Aus02W,
        Checkpoint::Aus03,
    ];

    /// Header of this checkpoint's passenger column in the throughput CSV.
    pub fn column(self) -> &'static str {
        match self {
            Checkpoint::Aus01 => "AUS AUS01",
            Checkpoint::Aus02 => "AUS AUS02",
            Checkpoint::Aus02E => "AUS AUS02E",
            Checkpoint::Aus02W => "AUS AUS02W",
            Checkpoint::Aus03 => "AUS AUS03",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A single (date, hour) row of the throughput feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub hour: Option<String>,
    /// Passenger counts indexed like [`Checkpoint::ALL`].
    pub counts: [f64; 5],
}

impl RawObservation {
    pub fn count(&self, checkpoint: Checkpoint) -> f64 {
        self.counts[checkpoint.index()]
    }

    /// Passengers across all checkpoints for this row.
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub passengers: f64,
}

/// Daily passenger totals over a gap-free calendar range.
///
/// Dates increase by exactly one day from the first to the last point and
/// every value is finite and non-negative. The series is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    points: Vec<DailyPoint>,
}

impl DailySeries {
    /// Builds a series whose first value falls on `start`.
    pub fn from_contiguous(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(PipelineError::InvalidSeries(format!(
                "passenger count {bad} is not a finite non-negative number"
            )));
        }

        let points = start
            .iter_days()
            .zip(values)
            .map(|(date, passengers)| DailyPoint { date, passengers })
            .collect::<Vec<_>>();

        Ok(Self { points })
    }

    pub fn points(&self) -> &[DailyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.passengers).collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        let offset = (date - self.first_date()).num_days();
        if offset < 0 {
            return None;
        }
        self.points.get(offset as usize).map(|p| p.passengers)
    }

    /// Passenger values strictly older than `cutoff`.
    pub fn values_before(&self, cutoff: NaiveDate) -> Vec<f64> {
        self.points
            .iter()
            .take_while(|p| p.date < cutoff)
            .map(|p| p.passengers)
            .collect()
    }
}

/// Forecast for one future day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub date: NaiveDate,
    pub mean: f64,
    pub mean_se: f64,
}

impl ForecastRecord {
    /// Two-sided 95% normal quantile.
    const Z_95: f64 = 1.959_963_984_540_054;

    pub fn ci_lower(&self) -> f64 {
        self.mean - Self::Z_95 * self.mean_se
    }

    pub fn ci_upper(&self) -> f64 {
        self.mean + Self::Z_95 * self.mean_se
    }
}

/// One row of `data_plus_prediction`: observed history carries `passengers`,
/// forecast days carry `mean`, `mean_se` and the 95% interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedRow {
    pub date: NaiveDate,
    pub passengers: Option<f64>,
    pub mean: Option<f64>,
    pub mean_se: Option<f64>,
    pub mean_ci_lower: Option<f64>,
    pub mean_ci_upper: Option<f64>,
}

/// Trailing history followed by the forecast, with unique increasing dates.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSeries {
    rows: Vec<CombinedRow>,
}

impl CombinedSeries {
    /// Keeps history dated after `today - window_days`, then appends forecast
    /// days later than the last kept row.
    pub fn build(
        history: &DailySeries,
        forecast: &[ForecastRecord],
        today: NaiveDate,
        window_days: u64,
    ) -> Self {
        let window_start = today
            .checked_sub_days(Days::new(window_days))
            .unwrap_or(NaiveDate::MIN);

        let mut rows: Vec<CombinedRow> = history
            .points()
            .iter()
            .filter(|p| p.date > window_start)
            .map(|p| CombinedRow {
                date: p.date,
                passengers: Some(p.passengers),
                mean: None,
                mean_se: None,
                mean_ci_lower: None,
                mean_ci_upper: None,
            })
            .collect();

        for record in forecast {
            if rows.last().is_some_and(|last| last.date >= record.date) {
                continue;
            }
            rows.push(CombinedRow {
                date: record.date,
                passengers: None,
                mean: Some(record.mean),
                mean_se: Some(record.mean_se),
                mean_ci_lower: Some(record.ci_lower()),
                mean_ci_upper: Some(record.ci_upper()),
            });
        }

        Self { rows }
    }

    pub fn rows(&self) -> &[CombinedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
