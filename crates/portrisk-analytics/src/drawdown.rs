//! Drawdown analysis.
//!
//! Single pass over a chronological value series with a running peak:
//! an episode opens when value dips below the peak, tracks its valley, and
//! closes at the first value back at or above the opening peak. Episodes
//! still open at the end of the series stay unrecovered (`None`).

use crate::types::{DrawdownPeriod, DrawdownResult};
use chrono::NaiveDate;
use portrisk_core::error::{Result, RiskError};
use portrisk_core::types::span_years;

/// Drawdown analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawdownAnalyzer;

struct OpenEpisode {
    start_index: usize,
    peak_value: f64,
    valley_index: usize,
    valley_value: f64,
}

impl DrawdownAnalyzer {
    /// Build a value series from periodic returns and a starting value.
    ///
    /// Convenience for callers holding a return series rather than a value
    /// path; each point is the compounded value after that date's return.
    pub fn value_series_from_returns(
        dates: &[NaiveDate],
        returns: &[f64],
        initial_value: f64,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        if dates.len() != returns.len() {
            return Err(RiskError::invalid_parameter(
                "returns",
                "dates and returns must have equal length",
            ));
        }
        if !initial_value.is_finite() || initial_value <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "initial_value",
                "must be finite and positive",
            ));
        }
        let mut value = initial_value;
        let mut series = Vec::with_capacity(returns.len());
        for (date, r) in dates.iter().zip(returns.iter()) {
            value *= 1.0 + r;
            series.push((*date, value));
        }
        Ok(series)
    }

    /// Analyze a chronologically ordered value series.
    pub fn analyze(series: &[(NaiveDate, f64)]) -> Result<DrawdownResult> {
        if series.len() < 2 {
            return Err(RiskError::insufficient_data(
                2,
                series.len(),
                "drawdown analysis",
            ));
        }
        for window in series.windows(2) {
            if window[1].0 <= window[0].0 {
                return Err(RiskError::invalid_parameter(
                    "series",
                    "dates must be strictly increasing",
                ));
            }
        }
        if let Some((date, value)) = series.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RiskError::invalid_parameter(
                "series",
                format!("non-finite value {value} at {date}"),
            ));
        }

        let mut periods = Vec::new();
        let mut underwater = Vec::with_capacity(series.len());
        let mut peak = series[0].1;
        let mut peak_index = 0;
        let mut open: Option<OpenEpisode> = None;

        for (t, &(date, value)) in series.iter().enumerate() {
            // Zero peak is an explicit special case: distance is 0, not NaN.
            let depth_now = if peak > 0.0 && value < peak {
                (value - peak) / peak
            } else {
                0.0
            };
            underwater.push((date, depth_now));

            match open.as_mut() {
                None => {
                    if value < peak {
                        open = Some(OpenEpisode {
                            start_index: peak_index,
                            peak_value: peak,
                            valley_index: t,
                            valley_value: value,
                        });
                    } else {
                        peak = value;
                        peak_index = t;
                    }
                }
                Some(episode) => {
                    if value < episode.valley_value {
                        episode.valley_index = t;
                        episode.valley_value = value;
                    }
                }
            }
            // Recovery: back at or above the peak that opened the episode.
            if open.as_ref().is_some_and(|e| value >= e.peak_value) {
                if let Some(episode) = open.take() {
                    periods.push(Self::close(&episode, series, Some(t)));
                }
                peak = value;
                peak_index = t;
            }
        }
        if let Some(episode) = open.as_ref() {
            periods.push(Self::close(episode, series, None));
        }

        Ok(Self::aggregate(periods, underwater, series))
    }

    fn close(
        episode: &OpenEpisode,
        series: &[(NaiveDate, f64)],
        recovery_index: Option<usize>,
    ) -> DrawdownPeriod {
        let depth = if episode.peak_value > 0.0 {
            (episode.valley_value - episode.peak_value) / episode.peak_value
        } else {
            0.0
        };
        DrawdownPeriod {
            start_date: series[episode.start_index].0,
            valley_date: series[episode.valley_index].0,
            recovery_date: recovery_index.map(|i| series[i].0),
            depth,
            length: (episode.valley_index - episode.start_index) as u32,
            recovery: recovery_index.map(|i| (i - episode.valley_index) as u32),
        }
    }

    fn aggregate(
        periods: Vec<DrawdownPeriod>,
        underwater: Vec<(NaiveDate, f64)>,
        series: &[(NaiveDate, f64)],
    ) -> DrawdownResult {
        let depths: Vec<f64> = periods.iter().map(|p| p.depth).collect();
        let recoveries: Vec<f64> = periods
            .iter()
            .filter_map(|p| p.recovery.map(f64::from))
            .collect();

        let max_drawdown = depths.iter().copied().fold(0.0_f64, f64::min);
        let average_drawdown = if depths.is_empty() {
            0.0
        } else {
            depths.iter().sum::<f64>() / depths.len() as f64
        };
        let average_recovery = if recoveries.is_empty() {
            None
        } else {
            Some(recoveries.iter().sum::<f64>() / recoveries.len() as f64)
        };

        let dates: Vec<NaiveDate> = series.iter().map(|(d, _)| *d).collect();
        let span = span_years(&dates);
        let drawdown_frequency = if span > 0.0 {
            periods.len() as f64 / span
        } else {
            0.0
        };

        let n = underwater.len() as f64;
        let pain_index = underwater.iter().map(|(_, u)| u.abs()).sum::<f64>() / n;
        let ulcer_index = (underwater.iter().map(|(_, u)| u * u).sum::<f64>() / n).sqrt();

        DrawdownResult {
            periods,
            underwater,
            max_drawdown,
            average_drawdown,
            average_recovery,
            drawdown_frequency,
            pain_index,
            ulcer_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + chrono::Days::new(i as u64), v))
            .collect()
    }

    #[test]
    fn test_single_episode_with_recovery() {
        // The canonical shape: peak, decline, valley, recovery, new high.
        let series = daily(&[100.0, 90.0, 80.0, 85.0, 100.0, 105.0]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");

        assert_eq!(result.periods.len(), 1);
        let episode = &result.periods[0];
        assert_eq!(episode.start_date, series[0].0);
        assert_eq!(episode.valley_date, series[2].0);
        assert_eq!(episode.recovery_date, Some(series[4].0));
        assert!((episode.depth - (-0.20)).abs() < 1e-12);
        assert_eq!(episode.length, 2);
        assert_eq!(episode.recovery, Some(2));

        assert!((result.max_drawdown - (-0.20)).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_series_has_no_episodes() {
        let series = daily(&[100.0, 100.0, 101.0, 105.0, 110.0]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");

        assert!(result.periods.is_empty());
        assert!(result.max_drawdown.abs() < f64::EPSILON);
        assert!(result.average_drawdown.abs() < f64::EPSILON);
        assert!(result.average_recovery.is_none());
        assert!(result.pain_index.abs() < f64::EPSILON);
        assert!(result.ulcer_index.abs() < f64::EPSILON);
        assert!(result.underwater.iter().all(|(_, u)| *u == 0.0));
    }

    #[test]
    fn test_unrecovered_episode_stays_open() {
        let series = daily(&[100.0, 110.0, 95.0, 90.0, 92.0]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");

        assert_eq!(result.periods.len(), 1);
        let episode = &result.periods[0];
        // Peak was at index 1 (110), valley at index 3 (90).
        assert_eq!(episode.start_date, series[1].0);
        assert_eq!(episode.valley_date, series[3].0);
        assert!(episode.recovery_date.is_none());
        assert!(episode.recovery.is_none());
        assert!((episode.depth - ((90.0 - 110.0) / 110.0)).abs() < 1e-12);
        assert!(result.average_recovery.is_none());
    }

    #[test]
    fn test_depths_nonpositive_and_recovery_after_valley() {
        let series = daily(&[
            100.0, 97.0, 99.0, 101.0, 95.0, 88.0, 93.0, 102.0, 104.0, 100.0,
        ]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");

        assert!(!result.periods.is_empty());
        for episode in &result.periods {
            assert!(episode.depth <= 0.0);
            if let Some(recovery_date) = episode.recovery_date {
                assert!(recovery_date > episode.valley_date);
            }
        }
        for (_, u) in &result.underwater {
            assert!(*u <= 0.0);
        }
    }

    #[test]
    fn test_two_episodes_counted() {
        let series = daily(&[100.0, 90.0, 100.0, 105.0, 94.0, 106.0]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");
        assert_eq!(result.periods.len(), 2);
        assert!(result.average_recovery.is_some());
        assert!(result.drawdown_frequency > 0.0);
    }

    #[test]
    fn test_pain_and_ulcer_indices() {
        // Underwater distances: 0, -0.1, 0, 0 → pain = 0.025, ulcer = sqrt(0.01/4).
        let series = daily(&[100.0, 90.0, 100.0, 100.0]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");

        assert!((result.pain_index - 0.025).abs() < 1e-12);
        assert!((result.ulcer_index - (0.01_f64 / 4.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_peak_is_not_a_division_fault() {
        // A wiped-out value path; depths stay defined.
        let series = daily(&[0.0, 0.0, 0.0]);
        let result = DrawdownAnalyzer::analyze(&series).expect("ok");
        assert!(result.periods.is_empty());
        assert!(result.max_drawdown.abs() < f64::EPSILON);
    }

    #[test]
    fn test_too_short_series_rejected() {
        let series = daily(&[100.0]);
        let err = DrawdownAnalyzer::analyze(&series).unwrap_err();
        assert!(matches!(err, RiskError::InsufficientData { .. }));
    }

    #[test]
    fn test_value_series_from_returns() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid");
        let dates: Vec<NaiveDate> = (0..3).map(|i| start + chrono::Days::new(i)).collect();
        let series =
            DrawdownAnalyzer::value_series_from_returns(&dates, &[0.10, -0.50, 1.0], 100.0)
                .expect("ok");

        assert!((series[0].1 - 110.0).abs() < 1e-9);
        assert!((series[1].1 - 55.0).abs() < 1e-9);
        assert!((series[2].1 - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_uses_calendar_span() {
        // Two years of monthly data with one episode.
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid");
        let mut values = vec![100.0; 25];
        values[5] = 90.0;
        let series: Vec<(NaiveDate, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + chrono::Months::new(i as u32), v))
            .collect();

        let result = DrawdownAnalyzer::analyze(&series).expect("ok");
        assert_eq!(result.periods.len(), 1);
        // One episode over two years → 0.5/year.
        assert!((result.drawdown_frequency - 0.5).abs() < 0.01);
    }
}
