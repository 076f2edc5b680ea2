//! Market data types consumed by the analytics engines.
//!
//! The core does not fetch market data. An external collaborator supplies
//! historical return series already aligned on a common date grid; the types
//! here validate that contract once, at the request boundary, so the engines
//! can assume it.

use crate::error::{Result, RiskError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance on the portfolio weight sum around 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Ordered historical returns for a single ticker.
///
/// Returns are periodic decimal fractions (0.01 = +1%), never percentages.
/// Dates must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    ticker: String,
    points: Vec<(NaiveDate, f64)>,
}

impl ReturnSeries {
    /// Create a return series, validating date ordering and finiteness.
    pub fn new(ticker: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Result<Self> {
        let ticker = ticker.into();
        if ticker.is_empty() {
            return Err(RiskError::invalid_parameter("ticker", "must not be empty"));
        }
        for window in points.windows(2) {
            if window[1].0 <= window[0].0 {
                return Err(RiskError::invalid_parameter(
                    "points",
                    format!(
                        "dates must be strictly increasing ({} followed by {})",
                        window[0].0, window[1].0
                    ),
                ));
            }
        }
        if let Some((date, value)) = points.iter().find(|(_, r)| !r.is_finite()) {
            return Err(RiskError::invalid_parameter(
                "points",
                format!("non-finite return {value} at {date}"),
            ));
        }
        Ok(Self { ticker, points })
    }

    /// The ticker this series belongs to.
    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the series has no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The dated observations, oldest first.
    #[must_use]
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// Just the return values, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, r)| *r).collect()
    }
}

/// Immutable, per-request view of aligned return series.
///
/// All series share one date grid; construction rejects misaligned input so
/// downstream covariance math never has to reconcile calendars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsDataset {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    // Column-major: columns[i] holds the returns of tickers[i], one per date.
    columns: Vec<Vec<f64>>,
    periods_per_year: f64,
}

impl ReturnsDataset {
    /// Build a dataset from per-ticker series sharing a common date grid.
    pub fn from_series(series: Vec<ReturnSeries>) -> Result<Self> {
        if series.is_empty() {
            return Err(RiskError::invalid_parameter(
                "series",
                "at least one return series is required",
            ));
        }
        let first = &series[0];
        if first.is_empty() {
            return Err(RiskError::insufficient_data(1, 0, "returns dataset"));
        }
        let dates: Vec<NaiveDate> = first.points().iter().map(|(d, _)| *d).collect();

        let mut tickers = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for s in &series {
            if tickers.contains(&s.ticker().to_owned()) {
                return Err(RiskError::invalid_parameter(
                    "series",
                    format!("duplicate ticker {}", s.ticker()),
                ));
            }
            if s.len() != dates.len()
                || s.points().iter().zip(dates.iter()).any(|((d, _), g)| d != g)
            {
                return Err(RiskError::invalid_parameter(
                    "series",
                    format!(
                        "series {} is not aligned with the common date grid",
                        s.ticker()
                    ),
                ));
            }
            tickers.push(s.ticker().to_owned());
            columns.push(s.values());
        }

        let periods_per_year = infer_periods_per_year(&dates);
        Ok(Self {
            tickers,
            dates,
            columns,
            periods_per_year,
        })
    }

    /// Override the inferred observation frequency.
    pub fn with_periods_per_year(mut self, periods_per_year: f64) -> Result<Self> {
        if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "periods_per_year",
                "must be a positive finite number",
            ));
        }
        self.periods_per_year = periods_per_year;
        Ok(self)
    }

    /// Number of tickers.
    #[must_use]
    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    /// Number of observations per ticker.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.dates.len()
    }

    /// Ticker names in stable column order.
    #[must_use]
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// The shared date grid, oldest first.
    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column index of a ticker.
    #[must_use]
    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Returns column for a ticker.
    #[must_use]
    pub fn returns_for(&self, ticker: &str) -> Option<&[f64]> {
        self.index_of(ticker).map(|i| self.columns[i].as_slice())
    }

    /// Returns column by index.
    #[must_use]
    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    /// Observations per year (inferred from date spacing unless overridden).
    #[must_use]
    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Calendar span of the grid in 365.25-day years.
    #[must_use]
    pub fn span_years(&self) -> f64 {
        span_years(&self.dates)
    }
}

/// Calendar span of a date grid in 365.25-day years.
#[must_use]
pub fn span_years(dates: &[NaiveDate]) -> f64 {
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) if last > first => {
            (*last - *first).num_days() as f64 / 365.25
        }
        _ => 0.0,
    }
}

/// Infer observations-per-year from median date spacing.
///
/// Daily grids (spacing up to 4 days, tolerating weekends) map to 252,
/// weekly to 52, monthly to 12; anything sparser is treated as annual.
fn infer_periods_per_year(dates: &[NaiveDate]) -> f64 {
    if dates.len() < 2 {
        return 252.0;
    }
    let mut gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect();
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2];
    match median {
        0..=4 => 252.0,
        5..=10 => 52.0,
        11..=45 => 12.0,
        _ => 1.0,
    }
}

/// Portfolio weights keyed by ticker, as decimal fractions.
///
/// The sum must stay within [1 − 0.001, 1 + 0.001]; normalizing a bad sum is
/// a caller decision, never done here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioWeights {
    weights: BTreeMap<String, f64>,
}

impl PortfolioWeights {
    /// Create weights from ticker/fraction pairs.
    pub fn new(weights: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            weights: weights.into_iter().collect(),
        }
    }

    /// Validate the weight-sum invariant and value sanity.
    pub fn validate(&self) -> Result<()> {
        if self.weights.is_empty() {
            return Err(RiskError::invalid_parameter("weights", "must not be empty"));
        }
        if let Some((ticker, w)) = self.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(RiskError::invalid_parameter(
                "weights",
                format!("non-finite weight {w} for {ticker}"),
            ));
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RiskError::invalid_parameter(
                "weights",
                format!("must sum to 1.0 ± {WEIGHT_SUM_TOLERANCE}, got {sum:.6}"),
            ));
        }
        Ok(())
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True when no positions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight for a ticker, if present.
    #[must_use]
    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.weights.get(ticker).copied()
    }

    /// Iterate positions in deterministic (ticker-sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    /// Weight vector aligned to a dataset's column order.
    ///
    /// Every ticker must exist in the dataset; covariance-based methods
    /// cannot proceed against a position with no return history.
    pub fn aligned(&self, dataset: &ReturnsDataset) -> Result<Vec<f64>> {
        self.validate()?;
        let mut aligned = vec![0.0; dataset.n_assets()];
        for (ticker, weight) in self.iter() {
            let idx = dataset
                .index_of(ticker)
                .ok_or_else(|| RiskError::not_found("ticker", ticker))?;
            aligned[idx] = weight;
        }
        Ok(aligned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn daily_series(ticker: &str, values: &[f64]) -> ReturnSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &r)| (date(2024, 1, 1) + chrono::Days::new(i as u64), r))
            .collect();
        ReturnSeries::new(ticker, points).expect("valid series")
    }

    #[test]
    fn test_series_rejects_unordered_dates() {
        let points = vec![(date(2024, 1, 2), 0.01), (date(2024, 1, 1), 0.02)];
        let err = ReturnSeries::new("AAPL", points).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_series_rejects_nan() {
        let points = vec![(date(2024, 1, 1), f64::NAN)];
        assert!(ReturnSeries::new("AAPL", points).is_err());
    }

    #[test]
    fn test_dataset_alignment_enforced() {
        let a = daily_series("A", &[0.01, 0.02, -0.01]);
        let b = daily_series("B", &[0.01, 0.02]);
        let err = ReturnsDataset::from_series(vec![a, b]).unwrap_err();
        assert!(err.to_string().contains("not aligned"));
    }

    #[test]
    fn test_dataset_rejects_duplicate_ticker() {
        let a = daily_series("A", &[0.01, 0.02]);
        let a2 = daily_series("A", &[0.03, 0.04]);
        assert!(ReturnsDataset::from_series(vec![a, a2]).is_err());
    }

    #[test]
    fn test_dataset_accessors() {
        let a = daily_series("A", &[0.01, 0.02, -0.01]);
        let b = daily_series("B", &[0.00, -0.02, 0.03]);
        let ds = ReturnsDataset::from_series(vec![a, b]).expect("aligned");

        assert_eq!(ds.n_assets(), 2);
        assert_eq!(ds.n_observations(), 3);
        assert_eq!(ds.index_of("B"), Some(1));
        assert_eq!(ds.returns_for("B").expect("present"), &[0.00, -0.02, 0.03]);
        assert!(ds.returns_for("MISSING").is_none());
        // Consecutive days infer a daily grid.
        assert!((ds.periods_per_year() - 252.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_periods_per_year_override() {
        let a = daily_series("A", &[0.01, 0.02]);
        let ds = ReturnsDataset::from_series(vec![a])
            .expect("aligned")
            .with_periods_per_year(52.0)
            .expect("positive");
        assert!((ds.periods_per_year() - 52.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_monthly_grid_inference() {
        let points = (0..12)
            .map(|i| (date(2024, 1 + i, 15), 0.01))
            .collect::<Vec<_>>();
        let series = ReturnSeries::new("M", points).expect("valid");
        let ds = ReturnsDataset::from_series(vec![series]).expect("aligned");
        assert!((ds.periods_per_year() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weights_sum_invariant() {
        let ok = PortfolioWeights::new([("A".to_owned(), 0.6), ("B".to_owned(), 0.4)]);
        assert!(ok.validate().is_ok());

        let bad = PortfolioWeights::new([("A".to_owned(), 0.6), ("B".to_owned(), 0.3)]);
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));

        // Just inside the tolerance band.
        let edge = PortfolioWeights::new([("A".to_owned(), 0.5005), ("B".to_owned(), 0.5)]);
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_weights_aligned_to_dataset() {
        let a = daily_series("A", &[0.01, 0.02]);
        let b = daily_series("B", &[0.00, -0.02]);
        let ds = ReturnsDataset::from_series(vec![a, b]).expect("aligned");

        let weights = PortfolioWeights::new([("B".to_owned(), 0.3), ("A".to_owned(), 0.7)]);
        let aligned = weights.aligned(&ds).expect("all tickers present");
        assert_eq!(aligned, vec![0.7, 0.3]);

        let missing = PortfolioWeights::new([("A".to_owned(), 0.5), ("C".to_owned(), 0.5)]);
        let err = missing.aligned(&ds).unwrap_err();
        assert!(matches!(err, RiskError::NotFound { .. }));
    }

    #[test]
    fn test_span_years() {
        let points = vec![(date(2020, 1, 1), 0.0), (date(2022, 1, 1), 0.0)];
        let series = ReturnSeries::new("S", points).expect("valid");
        let ds = ReturnsDataset::from_series(vec![series]).expect("aligned");
        assert!((ds.span_years() - 2.0).abs() < 0.01);
    }
}
