//! Value-at-Risk engine.
//!
//! Three interchangeable methods behind one parameter contract:
//! - Historical: interpolated empirical quantile of realized portfolio
//!   returns, √horizon-scaled
//! - Parametric: variance-covariance closed form under normality
//! - Monte Carlo: correlated draws through the Cholesky factor, compounded
//!   to the horizon
//!
//! Output VaR is a non-negative fraction of portfolio value.

use crate::stats::{self, MarketStatistics};
use crate::types::{VaRMethod, VaRResult};
use portrisk_core::config::VaRDefaults;
use portrisk_core::error::{Result, RiskError};
use portrisk_core::types::{PortfolioWeights, ReturnsDataset};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Minimum observations for the historical method.
const HISTORICAL_MIN_OBSERVATIONS: usize = 20;

/// Monte Carlo simulation bounds.
const SIMULATION_BOUNDS: (u32, u32) = (100, 100_000);

/// Seed used when the caller does not supply one, keeping runs reproducible.
const DEFAULT_SEED: u64 = 42;

/// Per-path seed spacing (golden-ratio increment) so path RNGs never overlap.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Shared parameters for every VaR method.
#[derive(Debug, Clone, Copy)]
pub struct VaRParams {
    /// Confidence level in (0, 1).
    pub confidence_level: f64,
    /// Horizon in periods, ≥ 1.
    pub horizon: u32,
    /// Portfolio value used for `absolute_value`.
    pub portfolio_value: f64,
    /// Monte Carlo simulation count.
    pub simulations: u32,
    /// Monte Carlo seed; a fixed default keeps unseeded runs reproducible.
    pub seed: Option<u64>,
}

impl Default for VaRParams {
    fn default() -> Self {
        Self::from_defaults(&VaRDefaults::default())
    }
}

impl VaRParams {
    /// Build params from configured defaults.
    #[must_use]
    pub fn from_defaults(defaults: &VaRDefaults) -> Self {
        Self {
            confidence_level: defaults.confidence_level,
            horizon: defaults.horizon,
            portfolio_value: 1.0,
            simulations: defaults.simulations,
            seed: None,
        }
    }

    /// Set the confidence level.
    #[must_use]
    pub fn with_confidence(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    /// Set the horizon in periods.
    #[must_use]
    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the portfolio value.
    #[must_use]
    pub fn with_portfolio_value(mut self, portfolio_value: f64) -> Self {
        self.portfolio_value = portfolio_value;
        self
    }

    /// Validate every field.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(RiskError::invalid_parameter(
                "confidence_level",
                format!("must be in (0, 1), got {}", self.confidence_level),
            ));
        }
        if self.horizon < 1 {
            return Err(RiskError::invalid_parameter("horizon", "must be >= 1"));
        }
        if !self.portfolio_value.is_finite() || self.portfolio_value <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "portfolio_value",
                "must be finite and positive",
            ));
        }
        if self.simulations < SIMULATION_BOUNDS.0 || self.simulations > SIMULATION_BOUNDS.1 {
            return Err(RiskError::invalid_parameter(
                "simulations",
                format!(
                    "must be in [{}, {}], got {}",
                    SIMULATION_BOUNDS.0, SIMULATION_BOUNDS.1, self.simulations
                ),
            ));
        }
        Ok(())
    }
}

/// Value-at-Risk engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaREngine;

impl VaREngine {
    /// Historical VaR from the realized portfolio return series.
    pub fn historical(
        dataset: &ReturnsDataset,
        weights: &PortfolioWeights,
        params: &VaRParams,
    ) -> Result<VaRResult> {
        params.validate()?;
        let aligned = weights.aligned(dataset)?;

        let realized = stats::portfolio_returns(dataset, &aligned);
        if realized.len() < HISTORICAL_MIN_OBSERVATIONS {
            return Err(RiskError::insufficient_data(
                HISTORICAL_MIN_OBSERVATIONS,
                realized.len(),
                "historical VaR",
            ));
        }

        let mut sorted = realized;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let quantile = stats::interpolated_quantile(&sorted, 1.0 - params.confidence_level);

        // Square-root-of-time scaling to the requested horizon.
        let value = (-quantile * (params.horizon as f64).sqrt()).max(0.0);
        tracing::debug!(value, method = "historical", "VaR computed");
        Ok(Self::result(value, params, VaRMethod::Historical))
    }

    /// Parametric (variance-covariance) VaR.
    pub fn parametric(
        statistics: &MarketStatistics,
        weights: &PortfolioWeights,
        params: &VaRParams,
    ) -> Result<VaRResult> {
        params.validate()?;
        let aligned = statistics.align_weights(weights)?;

        let mu = statistics.portfolio_mean(&aligned);
        let sigma = statistics.portfolio_variance(&aligned).sqrt();
        let z = stats::inverse_normal_cdf(params.confidence_level)?;

        let horizon = params.horizon as f64;
        let value = (z * sigma * horizon.sqrt() - mu * horizon).max(0.0);
        tracing::debug!(value, method = "parametric", "VaR computed");
        Ok(Self::result(value, params, VaRMethod::Parametric))
    }

    /// Monte Carlo VaR via correlated sampling through the Cholesky factor.
    ///
    /// Identical seed and inputs produce identical output; path RNGs are a
    /// pure function of (seed, path index).
    pub fn monte_carlo(
        statistics: &MarketStatistics,
        weights: &PortfolioWeights,
        params: &VaRParams,
    ) -> Result<VaRResult> {
        params.validate()?;
        let aligned = statistics.align_weights(weights)?;

        let n = statistics.n_assets();
        let mean = statistics.mean();
        let factor = statistics.cholesky_factor();
        let seed = params.seed.unwrap_or(DEFAULT_SEED);

        let mut terminal_returns = Vec::with_capacity(params.simulations as usize);
        for sim in 0..params.simulations {
            let mut rng =
                StdRng::seed_from_u64(seed.wrapping_add(u64::from(sim).wrapping_mul(SEED_STRIDE)));
            let mut value = 1.0;
            for _ in 0..params.horizon {
                let z: Vec<f64> = (0..n)
                    .map(|_| StandardNormal.sample(&mut rng))
                    .collect();
                let correlated = stats::apply_cholesky(factor, &z, n);
                let mut period_return = 0.0;
                for i in 0..n {
                    period_return += aligned[i] * (mean[i] + correlated[i]);
                }
                value *= 1.0 + period_return;
            }
            terminal_returns.push(value - 1.0);
        }

        terminal_returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let quantile =
            stats::interpolated_quantile(&terminal_returns, 1.0 - params.confidence_level);
        let value = (-quantile).max(0.0);
        tracing::debug!(
            value,
            simulations = params.simulations,
            method = "monte-carlo",
            "VaR computed"
        );
        Ok(Self::result(value, params, VaRMethod::MonteCarlo))
    }

    fn result(value: f64, params: &VaRParams, method: VaRMethod) -> VaRResult {
        VaRResult {
            value,
            confidence_level: params.confidence_level,
            horizon: params.horizon,
            method,
            absolute_value: value * params.portfolio_value,
        }
    }
}
