use crate::analyzers::types::{DailySeries, RawObservation};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Sums every checkpoint column of every hour into one passenger total per
/// date, then reindexes onto the continuous calendar between the first and
/// last observed dates. Days without observations count zero passengers.
pub fn aggregate_daily(observations: &[RawObservation]) -> Result<DailySeries> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for obs in observations {
        *totals.entry(obs.date).or_default() += obs.total();
    }

    let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) else {
        return Err(PipelineError::EmptyInput);
    };

    let days = (last - first).num_days() as usize + 1;
    let values: Vec<f64> = first
        .iter_days()
        .take(days)
        .map(|day| totals.get(&day).copied().unwrap_or(0.0))
        .collect();

    debug!(
        observations = observations.len(),
        observed_days = totals.len(),
        filled_days = days - totals.len(),
        "Aggregated feed into daily series"
    );

    DailySeries::from_contiguous(first, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::Checkpoint;

    fn obs(date: &str, hour: &str, counts: [f64; 5]) -> RawObservation {
        RawObservation {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            hour: Some(hour.to_string()),
            counts,
        }
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(aggregate_daily(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn test_checkpoint_sum_is_exact() {
        let row = obs("2024-05-01", "06:00", [120.0, 340.0, 56.0, 78.0, 9.0]);
        let expected: f64 = Checkpoint::ALL.iter().map(|c| row.count(*c)).sum();

        let series = aggregate_daily(&[row]).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.points()[0].passengers, expected);
        assert_eq!(expected, 603.0);
    }

    #[test]
    fn test_hours_are_summed_per_day() {
        let rows = vec![
            obs("2024-05-01", "05:00", [1.0, 1.0, 1.0, 1.0, 1.0]),
            obs("2024-05-01", "06:00", [2.0, 0.0, 0.0, 0.0, 3.0]),
            obs("2024-05-02", "05:00", [10.0, 0.0, 0.0, 0.0, 0.0]),
        ];

        let series = aggregate_daily(&rows).unwrap();

        assert_eq!(series.values(), vec![10.0, 10.0]);
    }

    #[test]
    fn test_gaps_are_filled_with_zero() {
        let rows = vec![
            obs("2024-05-03", "05:00", [7.0, 0.0, 0.0, 0.0, 0.0]),
            obs("2024-04-28", "05:00", [1.0, 0.0, 0.0, 0.0, 0.0]),
            obs("2024-05-01", "05:00", [4.0, 0.0, 0.0, 0.0, 0.0]),
        ];

        let series = aggregate_daily(&rows).unwrap();

        assert_eq!(series.values(), vec![1.0, 0.0, 0.0, 4.0, 0.0, 7.0]);
    }

    #[test]
    fn test_output_has_no_gaps() {
        let rows = vec![
            obs("2023-12-30", "05:00", [1.0, 0.0, 0.0, 0.0, 0.0]),
            obs("2024-03-02", "05:00", [1.0, 0.0, 0.0, 0.0, 0.0]),
        ];

        let series = aggregate_daily(&rows).unwrap();

        let span = (series.last_date() - series.first_date()).num_days() as usize + 1;
        assert_eq!(series.len(), span);
        assert!(
            series
                .points()
                .windows(2)
                .all(|w| (w[1].date - w[0].date).num_days() == 1)
        );
    }
}
