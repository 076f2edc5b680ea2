//! Risk-contribution decomposition.
//!
//! Splits portfolio volatility into per-asset marginal and component
//! contributions: marginalᵢ = (Σw)ᵢ/σₚ, componentᵢ = wᵢ·marginalᵢ, and the
//! components sum back to σₚ (Euler decomposition). The diversification
//! ratio compares the weighted sum of standalone volatilities to σₚ.

use crate::stats::MarketStatistics;
use crate::types::{AssetContribution, RiskContributionResult};
use portrisk_core::error::Result;
use portrisk_core::types::PortfolioWeights;
use std::collections::BTreeMap;

/// Threshold below which portfolio variance is treated as exactly zero.
const ZERO_VARIANCE: f64 = 1e-24;

/// Risk-contribution engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskContributionEngine;

impl RiskContributionEngine {
    /// Decompose portfolio volatility across assets.
    ///
    /// A zero-volatility portfolio is special-cased: every contribution is
    /// zero and the diversification ratio is 1, never a division fault.
    pub fn decompose(
        statistics: &MarketStatistics,
        weights: &PortfolioWeights,
    ) -> Result<RiskContributionResult> {
        let aligned = statistics.align_weights(weights)?;
        let variance = statistics.portfolio_variance(&aligned);

        if variance < ZERO_VARIANCE {
            let contributions = statistics
                .tickers()
                .iter()
                .zip(aligned.iter())
                .filter(|(_, w)| **w != 0.0)
                .map(|(ticker, _)| {
                    (
                        ticker.clone(),
                        AssetContribution {
                            marginal: 0.0,
                            component: 0.0,
                            percentage: 0.0,
                        },
                    )
                })
                .collect();
            return Ok(RiskContributionResult {
                contributions,
                diversification_ratio: 1.0,
                portfolio_volatility: 0.0,
            });
        }

        let volatility = variance.sqrt();
        let sigma_w = statistics.covariance_times(&aligned);

        let mut contributions = BTreeMap::new();
        let mut weighted_stdev_sum = 0.0;
        for (i, ticker) in statistics.tickers().iter().enumerate() {
            let weight = aligned[i];
            if weight == 0.0 {
                continue;
            }
            weighted_stdev_sum += weight * statistics.asset_volatility(i);

            let marginal = sigma_w[i] / volatility;
            let component = weight * marginal;
            contributions.insert(
                ticker.clone(),
                AssetContribution {
                    marginal,
                    component,
                    percentage: component / volatility * 100.0,
                },
            );
        }

        tracing::debug!(volatility, "risk contributions computed");
        Ok(RiskContributionResult {
            contributions,
            diversification_ratio: weighted_stdev_sum / volatility,
            portfolio_volatility: volatility,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portrisk_core::config::SingularPolicy;
    use portrisk_core::error::RiskError;
    use portrisk_core::types::{ReturnSeries, ReturnsDataset};

    fn dataset(columns: &[(&str, &[f64])]) -> ReturnsDataset {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).expect("valid date");
        let series = columns
            .iter()
            .map(|(ticker, values)| {
                let points = values
                    .iter()
                    .enumerate()
                    .map(|(i, &r)| (start + chrono::Days::new(i as u64), r))
                    .collect();
                ReturnSeries::new(*ticker, points).expect("valid series")
            })
            .collect();
        ReturnsDataset::from_series(series).expect("aligned")
    }

    fn diversified() -> (MarketStatistics, PortfolioWeights) {
        let a: Vec<f64> = (0..60).map(|i| 0.011 * ((i as f64) * 0.8).sin()).collect();
        let b: Vec<f64> = (0..60).map(|i| 0.008 * ((i as f64) * 1.7).cos()).collect();
        let c: Vec<f64> = (0..60)
            .map(|i| 0.005 * ((i as f64) * 2.3).sin() + 0.001)
            .collect();
        let ds = dataset(&[("A", &a), ("B", &b), ("C", &c)]);
        let stats = MarketStatistics::from_dataset(&ds, SingularPolicy::Fail).expect("ok");
        let weights = PortfolioWeights::new([
            ("A".to_owned(), 0.5),
            ("B".to_owned(), 0.3),
            ("C".to_owned(), 0.2),
        ]);
        (stats, weights)
    }

    #[test]
    fn test_components_sum_to_volatility() {
        let (stats, weights) = diversified();
        let result = RiskContributionEngine::decompose(&stats, &weights).expect("ok");

        let component_sum: f64 = result.contributions.values().map(|c| c.component).sum();
        let relative = (component_sum - result.portfolio_volatility).abs()
            / result.portfolio_volatility;
        assert!(relative < 1e-6, "relative error {relative}");
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let (stats, weights) = diversified();
        let result = RiskContributionEngine::decompose(&stats, &weights).expect("ok");

        let pct_sum: f64 = result.contributions.values().map(|c| c.percentage).sum();
        assert!((pct_sum - 100.0).abs() < 1e-6, "got {pct_sum}");
    }

    #[test]
    fn test_diversification_ratio_at_least_one() {
        let (stats, weights) = diversified();
        let result = RiskContributionEngine::decompose(&stats, &weights).expect("ok");
        assert!(
            result.diversification_ratio >= 1.0,
            "got {}",
            result.diversification_ratio
        );
    }

    #[test]
    fn test_single_asset_has_no_diversification() {
        let a: Vec<f64> = (0..40).map(|i| 0.01 * ((i as f64) * 0.9).sin()).collect();
        let ds = dataset(&[("A", &a)]);
        let stats = MarketStatistics::from_dataset(&ds, SingularPolicy::Fail).expect("ok");
        let weights = PortfolioWeights::new([("A".to_owned(), 1.0)]);

        let result = RiskContributionEngine::decompose(&stats, &weights).expect("ok");
        assert!((result.diversification_ratio - 1.0).abs() < 1e-9);
        let only = result.contributions.get("A").expect("present");
        assert!((only.percentage - 100.0).abs() < 1e-9);
        assert!((only.component - result.portfolio_volatility).abs() < 1e-12);
    }

    #[test]
    fn test_zero_volatility_special_case() {
        let ds = dataset(&[("FLAT", &[0.01; 10])]);
        // Constant returns: zero variance everywhere.
        let stats =
            MarketStatistics::from_dataset(&ds, SingularPolicy::DiagonalFallback).expect("ok");
        let weights = PortfolioWeights::new([("FLAT".to_owned(), 1.0)]);

        let result = RiskContributionEngine::decompose(&stats, &weights).expect("ok");
        assert!(result.portfolio_volatility.abs() < f64::EPSILON);
        assert!((result.diversification_ratio - 1.0).abs() < f64::EPSILON);
        let only = result.contributions.get("FLAT").expect("present");
        assert!(only.marginal.abs() < f64::EPSILON);
        assert!(only.component.abs() < f64::EPSILON);
    }

    #[test]
    fn test_weight_sum_violation_rejected() {
        let (stats, _) = diversified();
        let bad = PortfolioWeights::new([("A".to_owned(), 0.9), ("B".to_owned(), 0.3)]);
        let err = RiskContributionEngine::decompose(&stats, &bad).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));
    }

    #[test]
    fn test_unknown_ticker_rejected() {
        let (stats, _) = diversified();
        let missing = PortfolioWeights::new([("A".to_owned(), 0.5), ("Z".to_owned(), 0.5)]);
        let err = RiskContributionEngine::decompose(&stats, &missing).unwrap_err();
        assert!(matches!(err, RiskError::NotFound { .. }));
    }
}
