use chrono::NaiveDate;
use std::fmt::Write as _;

use crate::analyzers::band::{BandThresholds, CongestionBand};
use crate::analyzers::types::CombinedRow;
use crate::render::{Gauge, Timeline, escape};

const PAGE_TITLE: &str = "AUS Airport TSA Wait Time Prediction";
const NOT_AVAILABLE: &str = "Today's prediction data not available. Check back later.";

/// Today's outlook as read back from the combined table.
#[derive(Debug, Clone)]
pub struct Outlook {
    pub today: NaiveDate,
    pub value: f64,
    pub band: CongestionBand,
    pub thresholds: BandThresholds,
    pub rows: Vec<CombinedRow>,
}

#[derive(Debug, Clone)]
pub enum DashboardView {
    Available(Outlook),
    /// No forecast row for today, or too little history for the bands.
    NotAvailable,
}

impl DashboardView {
    /// Band baseline is every row with a positive passenger count.
    pub fn build(rows: Vec<CombinedRow>, today: NaiveDate) -> Self {
        let Some(value) = rows.iter().find(|r| r.date == today).and_then(|r| r.mean) else {
            return Self::NotAvailable;
        };

        let baseline: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.passengers)
            .filter(|p| *p > 0.0)
            .collect();
        let Some(thresholds) = BandThresholds::from_values(&baseline) else {
            return Self::NotAvailable;
        };

        Self::Available(Outlook {
            today,
            value,
            band: thresholds.classify(value),
            thresholds,
            rows,
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn to_html(&self) -> String {
        let body = match self {
            Self::NotAvailable => format!(r#"<p class="notice">{}</p>"#, escape(NOT_AVAILABLE)),
            Self::Available(outlook) => {
                let gauge = Gauge::new(outlook.thresholds, outlook.value);
                let timeline = Timeline::new(&outlook.rows, outlook.thresholds, outlook.today);
                let mut body = String::new();
                let _ = write!(
                    body,
                    r#"<section class="gauge">{}</section><p>{} Forecast: {:.0} passengers on {}.</p><section class="timeline">{}</section>"#,
                    gauge.to_svg(),
                    escape(outlook.band.message()),
                    outlook.value,
                    outlook.today,
                    timeline.to_svg()
                );
                body
            }
        };
        page(&body)
    }
}

/// The password form, with an optional error line.
pub fn login_page(error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default();
    page(&format!(
        r#"<form method="post" action="/"><label>Password <input type="password" name="password" autofocus></label> <button type="submit">Enter</button></form>{error}"#
    ))
}

fn page(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><title>Predict AUS Dashboard</title><style>body{{font-family:Arial,sans-serif;max-width:960px;margin:2em auto;color:rgb(82,82,82)}}.error{{color:#d7191c}}</style></head><body><h1>{PAGE_TITLE}</h1><p>A data-driven approach to getting you ready for your next trip!</p>{body}</body></html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn rows(with_today: bool) -> Vec<CombinedRow> {
        let mut rows: Vec<CombinedRow> = (1..=20u64)
            .rev()
            .map(|back| CombinedRow {
                date: today() - Days::new(back),
                passengers: Some(if back == 3 { 0.0 } else { 1000.0 + back as f64 * 10.0 }),
                mean: None,
                mean_se: None,
                mean_ci_lower: None,
                mean_ci_upper: None,
            })
            .collect();
        let first_forecast = if with_today { 0 } else { 1 };
        rows.extend((first_forecast..5u64).map(|ahead| CombinedRow {
            date: today() + Days::new(ahead),
            passengers: None,
            mean: Some(1400.0),
            mean_se: Some(25.0),
            mean_ci_lower: Some(1351.0),
            mean_ci_upper: Some(1449.0),
        }));
        rows
    }

    #[test]
    fn test_available_when_today_present() {
        let view = DashboardView::build(rows(true), today());

        let DashboardView::Available(outlook) = &view else {
            panic!("expected an outlook");
        };
        assert_eq!(outlook.value, 1400.0);
        assert_eq!(outlook.band, CongestionBand::VeryHigh);
        // The zero day is left out of the baseline.
        assert_eq!(outlook.thresholds.median, 1110.0);

        let html = view.to_html();
        assert!(html.contains("Long wait times expected today"));
        assert!(html.contains("AUS Airport is expected to be very busy today."));
    }

    #[test]
    fn test_not_available_without_today() {
        let view = DashboardView::build(rows(false), today());

        assert!(!view.is_available());
        assert!(view.to_html().contains("data not available"));
    }

    #[test]
    fn test_not_available_without_baseline() {
        let forecast_only: Vec<CombinedRow> =
            rows(true).into_iter().filter(|r| r.mean.is_some()).collect();

        assert!(!DashboardView::build(forecast_only, today()).is_available());
    }

    #[test]
    fn test_login_page_error() {
        assert!(!login_page(None).contains("class=\"error\""));
        assert!(login_page(Some("Password incorrect")).contains("Password incorrect"));
    }
}
