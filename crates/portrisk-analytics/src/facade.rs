//! Request-level entry point.
//!
//! The facade validates inputs synchronously, builds the shared covariance
//! state once per request, dispatches to the engines, and assembles result
//! records. Independent computations in the combined report run concurrently;
//! they all read the same immutable [`MarketStatistics`] value.

use crate::contribution::RiskContributionEngine;
use crate::drawdown::DrawdownAnalyzer;
use crate::monte_carlo::{MonteCarloSimulator, ReturnModel, SimulationParams};
use crate::scenarios::ScenarioCatalog;
use crate::stats::{self, MarketStatistics};
use crate::stress::{AssetInfoProvider, CustomShock, StaticAssetInfo, StressTestEngine};
use crate::types::{
    DrawdownResult, MonteCarloResult, RiskContributionResult, RiskReport, StressTestResult,
    VaRMethod, VaRResult,
};
use crate::var::{VaREngine, VaRParams};
use portrisk_core::config::AnalyticsConfig;
use portrisk_core::control::RunControl;
use portrisk_core::error::Result;
use portrisk_core::types::{PortfolioWeights, ReturnsDataset};

/// One-stop risk analytics entry point.
pub struct RiskAnalyticsFacade {
    config: AnalyticsConfig,
    catalog: ScenarioCatalog,
    asset_info: Box<dyn AssetInfoProvider + Send + Sync>,
    stress: StressTestEngine,
    simulator: MonteCarloSimulator,
}

impl Default for RiskAnalyticsFacade {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}

impl RiskAnalyticsFacade {
    /// Create a facade with the built-in scenario catalog and no asset
    /// metadata.
    #[must_use]
    pub fn new(config: AnalyticsConfig) -> Self {
        let stress = StressTestEngine::new(config.recovery);
        let simulator = MonteCarloSimulator::new(config.monte_carlo);
        Self {
            config,
            catalog: ScenarioCatalog::builtin(),
            asset_info: Box::new(StaticAssetInfo::new()),
            stress,
            simulator,
        }
    }

    /// Replace the scenario catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: ScenarioCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Attach sector/beta metadata from the market-data collaborator.
    #[must_use]
    pub fn with_asset_info(
        mut self,
        asset_info: impl AssetInfoProvider + Send + Sync + 'static,
    ) -> Self {
        self.asset_info = Box::new(asset_info);
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Build the shared per-request covariance state.
    pub fn statistics(&self, dataset: &ReturnsDataset) -> Result<MarketStatistics> {
        MarketStatistics::from_dataset(dataset, self.config.singular_policy)
    }

    /// VaR params seeded from the configured defaults.
    #[must_use]
    pub fn var_params(&self) -> VaRParams {
        VaRParams::from_defaults(&self.config.var)
    }

    /// Value at Risk by the requested method.
    pub fn value_at_risk(
        &self,
        dataset: &ReturnsDataset,
        weights: &PortfolioWeights,
        method: VaRMethod,
        params: &VaRParams,
    ) -> Result<VaRResult> {
        match method {
            VaRMethod::Historical => VaREngine::historical(dataset, weights, params),
            VaRMethod::Parametric => {
                let statistics = self.statistics(dataset)?;
                VaREngine::parametric(&statistics, weights, params)
            }
            VaRMethod::MonteCarlo => {
                let statistics = self.statistics(dataset)?;
                VaREngine::monte_carlo(&statistics, weights, params)
            }
        }
    }

    /// Stress test against a named catalog scenario.
    pub fn stress_scenario(
        &self,
        weights: &PortfolioWeights,
        portfolio_value: f64,
        scenario_id: &str,
    ) -> Result<StressTestResult> {
        let scenario = self.catalog.get(scenario_id)?;
        self.stress
            .run_scenario(weights, portfolio_value, scenario, self.asset_info.as_ref())
    }

    /// Stress test against a caller-supplied shock.
    pub fn stress_custom(
        &self,
        weights: &PortfolioWeights,
        portfolio_value: f64,
        shock: &CustomShock,
    ) -> Result<StressTestResult> {
        self.stress
            .run_custom(weights, portfolio_value, shock, self.asset_info.as_ref())
    }

    /// Forward Monte Carlo projection.
    pub fn monte_carlo(
        &self,
        params: &SimulationParams,
        model: &ReturnModel,
        control: &RunControl,
    ) -> Result<MonteCarloResult> {
        self.simulator.run(params, model, control)
    }

    /// Drawdown profile of a value series.
    pub fn drawdowns(&self, series: &[(chrono::NaiveDate, f64)]) -> Result<DrawdownResult> {
        DrawdownAnalyzer::analyze(series)
    }

    /// Volatility decomposition.
    pub fn risk_contribution(
        &self,
        dataset: &ReturnsDataset,
        weights: &PortfolioWeights,
    ) -> Result<RiskContributionResult> {
        let statistics = self.statistics(dataset)?;
        RiskContributionEngine::decompose(&statistics, weights)
    }

    /// Combined report: parametric VaR, stress test, drawdowns, and risk
    /// contribution in one call.
    ///
    /// Validation happens up front; the covariance estimate is built once
    /// and shared. The four computations have no data dependencies on each
    /// other and run concurrently.
    pub fn full_report(
        &self,
        dataset: &ReturnsDataset,
        weights: &PortfolioWeights,
        portfolio_value: f64,
        scenario_id: &str,
    ) -> Result<RiskReport> {
        let aligned = weights.aligned(dataset)?;
        let scenario = self.catalog.get(scenario_id)?;
        let statistics = self.statistics(dataset)?;
        let params = self.var_params().with_portfolio_value(portfolio_value);

        let realized = stats::portfolio_returns(dataset, &aligned);
        let value_series = DrawdownAnalyzer::value_series_from_returns(
            dataset.dates(),
            &realized,
            portfolio_value,
        )?;

        let ((value_at_risk, stress_test), (drawdowns, risk_contribution)) = rayon::join(
            || {
                rayon::join(
                    || VaREngine::parametric(&statistics, weights, &params),
                    || {
                        self.stress.run_scenario(
                            weights,
                            portfolio_value,
                            scenario,
                            self.asset_info.as_ref(),
                        )
                    },
                )
            },
            || {
                rayon::join(
                    || DrawdownAnalyzer::analyze(&value_series),
                    || RiskContributionEngine::decompose(&statistics, weights),
                )
            },
        );

        Ok(RiskReport {
            value_at_risk: value_at_risk?,
            stress_test: stress_test?,
            drawdowns: drawdowns?,
            risk_contribution: risk_contribution?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portrisk_core::error::{ErrorKind, RiskError};
    use portrisk_core::types::ReturnSeries;

    fn dataset() -> ReturnsDataset {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).expect("valid date");
        let a: Vec<f64> = (0..120)
            .map(|i| 0.0005 + 0.010 * ((i as f64) * 0.7).sin())
            .collect();
        let b: Vec<f64> = (0..120)
            .map(|i| 0.0003 + 0.007 * ((i as f64) * 1.9).cos())
            .collect();
        let series = [("AAPL", a), ("JPM", b)]
            .into_iter()
            .map(|(ticker, values)| {
                let points = values
                    .iter()
                    .enumerate()
                    .map(|(i, &r)| (start + chrono::Days::new(i as u64), r))
                    .collect();
                ReturnSeries::new(ticker, points).expect("valid series")
            })
            .collect();
        ReturnsDataset::from_series(series).expect("aligned")
    }

    fn weights() -> PortfolioWeights {
        PortfolioWeights::new([("AAPL".to_owned(), 0.6), ("JPM".to_owned(), 0.4)])
    }

    fn facade() -> RiskAnalyticsFacade {
        RiskAnalyticsFacade::default().with_asset_info(
            StaticAssetInfo::new()
                .with_sector("AAPL", "Technology")
                .with_sector("JPM", "Financials"),
        )
    }

    #[test]
    fn test_full_report_assembles_all_parts() {
        let report = facade()
            .full_report(&dataset(), &weights(), 100_000.0, "gfc-2008")
            .expect("ok");

        assert_eq!(report.value_at_risk.method, VaRMethod::Parametric);
        assert!(report.value_at_risk.value >= 0.0);
        assert!(report.stress_test.portfolio_loss < 0.0);
        assert!(report.risk_contribution.portfolio_volatility > 0.0);
        assert!(!report.drawdowns.underwater.is_empty());

        // Stress saw the sector classification.
        assert!(report.stress_test.sectors.contains_key("Financials"));
    }

    #[test]
    fn test_full_report_unknown_scenario() {
        let err = facade()
            .full_report(&dataset(), &weights(), 100_000.0, "nope")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_full_report_rejects_bad_weights_before_compute() {
        let bad = PortfolioWeights::new([("AAPL".to_owned(), 0.9), ("JPM".to_owned(), 0.4)]);
        let err = facade()
            .full_report(&dataset(), &bad, 100_000.0, "gfc-2008")
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));
    }

    #[test]
    fn test_var_dispatch_matches_direct_engines() {
        let facade = facade();
        let ds = dataset();
        let w = weights();
        let params = facade.var_params();

        let via_facade = facade
            .value_at_risk(&ds, &w, VaRMethod::Parametric, &params)
            .expect("ok");
        let statistics = facade.statistics(&ds).expect("ok");
        let direct = VaREngine::parametric(&statistics, &w, &params).expect("ok");
        assert_eq!(via_facade.value.to_bits(), direct.value.to_bits());

        let historical = facade
            .value_at_risk(&ds, &w, VaRMethod::Historical, &params)
            .expect("ok");
        assert_eq!(historical.method, VaRMethod::Historical);
    }

    #[test]
    fn test_monte_carlo_via_facade() {
        let facade = facade();
        let model = ReturnModel::from_history(&dataset(), &weights()).expect("ok");
        let result = facade
            .monte_carlo(
                &SimulationParams::default(),
                &model,
                &RunControl::unbounded(),
            )
            .expect("ok");
        assert_eq!(result.completed_simulations, 1000);
        assert!(!result.partial);
    }

    #[test]
    fn test_error_surface_is_discriminated() {
        let facade = facade();
        let err = facade
            .stress_scenario(&weights(), -5.0, "gfc-2008")
            .unwrap_err();
        let info = err.to_info();
        assert_eq!(info.kind, ErrorKind::InvalidParameter);
        assert_eq!(info.field.as_deref(), Some("portfolio_value"));
    }
}
