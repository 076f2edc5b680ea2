//! Monte Carlo forward simulation of portfolio value.
//!
//! Projects the distribution of terminal portfolio value under annual
//! contributions. Sampling is normal-distribution-based, parameterized by an
//! annualized mean and volatility — either supplied directly or estimated
//! from history by moment matching. Bootstrap resampling is deliberately not
//! offered; the sampling model is fixed per deployment, never mixed.
//!
//! Paths are independent and run in batches over the rayon worker pool.
//! Between batches the simulator checks its [`RunControl`]: cancellation and
//! timeout are cooperative and never yield a silently truncated result.

use crate::stats;
use crate::types::{MonteCarloResult, OutcomeProbabilities, TerminalPercentiles};
use portrisk_core::config::MonteCarloTuning;
use portrisk_core::control::RunControl;
use portrisk_core::error::{Result, RiskError};
use portrisk_core::types::{PortfolioWeights, ReturnsDataset};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bounds on projection years.
const YEAR_BOUNDS: (u32, u32) = (1, 50);

/// Bounds on simulation count.
const SIMULATION_BOUNDS: (u32, u32) = (100, 10_000);

/// Seed used when the caller does not supply one.
const DEFAULT_SEED: u64 = 42;

/// Per-path seed spacing (golden-ratio increment).
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Portfolio rebalancing cadence.
///
/// Accepted and echoed for interface compatibility; in
/// single-portfolio-return mode (the only mode) there is nothing to
/// rebalance, so the setting is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RebalanceFrequency {
    /// Never rebalance.
    #[default]
    None,
    /// Rebalance monthly.
    Monthly,
    /// Rebalance quarterly.
    Quarterly,
    /// Rebalance annually.
    Annually,
}

/// Annualized return model driving the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnModel {
    /// Annualized mean return.
    pub annual_mean: f64,
    /// Annualized return volatility.
    pub annual_volatility: f64,
}

impl ReturnModel {
    /// A directly fitted (mean, volatility) pair.
    pub fn fitted(annual_mean: f64, annual_volatility: f64) -> Result<Self> {
        let model = Self {
            annual_mean,
            annual_volatility,
        };
        model.validate()?;
        Ok(model)
    }

    /// Estimate annualized parameters from realized portfolio returns.
    ///
    /// Period mean and standard deviation are scaled by the dataset's
    /// observation frequency (mean × p, volatility × √p).
    pub fn from_history(dataset: &ReturnsDataset, weights: &PortfolioWeights) -> Result<Self> {
        let aligned = weights.aligned(dataset)?;
        let realized = stats::portfolio_returns(dataset, &aligned);
        let variance = stats::sample_variance(&realized)?;
        let periods = dataset.periods_per_year();

        let model = Self {
            annual_mean: stats::mean(&realized) * periods,
            annual_volatility: variance.sqrt() * periods.sqrt(),
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if !self.annual_mean.is_finite() {
            return Err(RiskError::invalid_parameter(
                "annual_mean",
                "must be finite",
            ));
        }
        if !self.annual_volatility.is_finite() || self.annual_volatility < 0.0 {
            return Err(RiskError::invalid_parameter(
                "annual_volatility",
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Simulation request parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Starting portfolio value, > 0.
    pub initial_value: f64,
    /// Projection horizon in years, 1–50.
    pub years: u32,
    /// Number of simulated paths, 100–10000.
    pub simulations: u32,
    /// Contribution added at each year-end, ≥ 0.
    pub annual_contribution: f64,
    /// Rebalancing cadence (inert; see [`RebalanceFrequency`]).
    pub rebalance: RebalanceFrequency,
    /// RNG seed; a fixed default keeps unseeded runs reproducible.
    pub seed: Option<u64>,
    /// Confidence level for terminal VaR/CVaR.
    pub confidence_level: f64,
    /// Accept a flagged partial result when the deadline expires mid-run.
    pub allow_partial: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            initial_value: 10_000.0,
            years: 10,
            simulations: 1000,
            annual_contribution: 0.0,
            rebalance: RebalanceFrequency::None,
            seed: None,
            confidence_level: 0.95,
            allow_partial: false,
        }
    }
}

impl SimulationParams {
    /// Validate every field.
    pub fn validate(&self) -> Result<()> {
        if !self.initial_value.is_finite() || self.initial_value <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "initial_value",
                "must be finite and positive",
            ));
        }
        if self.years < YEAR_BOUNDS.0 || self.years > YEAR_BOUNDS.1 {
            return Err(RiskError::invalid_parameter(
                "years",
                format!("must be in [{}, {}]", YEAR_BOUNDS.0, YEAR_BOUNDS.1),
            ));
        }
        if self.simulations < SIMULATION_BOUNDS.0 || self.simulations > SIMULATION_BOUNDS.1 {
            return Err(RiskError::invalid_parameter(
                "simulations",
                format!("must be in [{}, {}]", SIMULATION_BOUNDS.0, SIMULATION_BOUNDS.1),
            ));
        }
        if !self.annual_contribution.is_finite() || self.annual_contribution < 0.0 {
            return Err(RiskError::invalid_parameter(
                "annual_contribution",
                "must be finite and non-negative",
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(RiskError::invalid_parameter(
                "confidence_level",
                "must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Monte Carlo forward simulator.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    tuning: MonteCarloTuning,
}

impl Default for MonteCarloSimulator {
    fn default() -> Self {
        Self::new(MonteCarloTuning::default())
    }
}

impl MonteCarloSimulator {
    /// Create a simulator with the given batch tuning.
    #[must_use]
    pub fn new(tuning: MonteCarloTuning) -> Self {
        Self { tuning }
    }

    /// Run the simulation.
    ///
    /// Identical seed and parameters produce bit-identical results: each
    /// path's RNG is a pure function of (seed, path index), so thread
    /// scheduling cannot perturb the aggregate.
    pub fn run(
        &self,
        params: &SimulationParams,
        model: &ReturnModel,
        control: &RunControl,
    ) -> Result<MonteCarloResult> {
        params.validate()?;
        model.validate()?;
        self.run_with_checkpoint(params, model, |_| control.checkpoint())
    }

    /// Core loop with an injected checkpoint, called between path batches.
    fn run_with_checkpoint(
        &self,
        params: &SimulationParams,
        model: &ReturnModel,
        checkpoint: impl Fn(usize) -> Result<()>,
    ) -> Result<MonteCarloResult> {
        let total = params.simulations as usize;
        let batch_size = (self.tuning.batch_size as usize).max(1);
        let seed = params.seed.unwrap_or(DEFAULT_SEED);

        let mut terminals: Vec<f64> = Vec::with_capacity(total);
        let mut partial = false;

        let mut start = 0;
        while start < total {
            match checkpoint(terminals.len()) {
                Ok(()) => {}
                Err(RiskError::Timeout { elapsed }) => {
                    if params.allow_partial && !terminals.is_empty() {
                        tracing::warn!(
                            completed = terminals.len(),
                            requested = total,
                            "deadline hit, returning partial result by caller opt-in"
                        );
                        partial = true;
                        break;
                    }
                    return Err(RiskError::Timeout { elapsed });
                }
                Err(err) => return Err(err),
            }

            let end = (start + batch_size).min(total);
            let batch: Vec<f64> = (start..end)
                .into_par_iter()
                .map(|path| Self::simulate_path(seed, path as u64, params, model))
                .collect();
            terminals.extend(batch);
            start = end;
        }

        tracing::debug!(
            completed = terminals.len(),
            requested = total,
            partial,
            "simulation finished"
        );
        Ok(Self::reduce(params, terminals, partial))
    }

    /// One path: compound an annual normal return, then contribute.
    fn simulate_path(seed: u64, path: u64, params: &SimulationParams, model: &ReturnModel) -> f64 {
        let mut rng =
            StdRng::seed_from_u64(seed.wrapping_add((path + 1).wrapping_mul(SEED_STRIDE)));
        let mut value = params.initial_value;
        for _ in 0..params.years {
            let z: f64 = StandardNormal.sample(&mut rng);
            let annual_return = model.annual_mean + model.annual_volatility * z;
            // A draw below −100% wipes the position; value never goes negative.
            value = (value * (1.0 + annual_return)).max(0.0);
            value += params.annual_contribution;
        }
        value
    }

    /// Order-independent reduction of terminal values.
    fn reduce(params: &SimulationParams, mut terminals: Vec<f64>, partial: bool) -> MonteCarloResult {
        terminals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let completed = terminals.len();
        let count = completed as f64;

        let percentiles = TerminalPercentiles {
            p10: stats::interpolated_quantile(&terminals, 0.10),
            p25: stats::interpolated_quantile(&terminals, 0.25),
            median: stats::interpolated_quantile(&terminals, 0.50),
            p75: stats::interpolated_quantile(&terminals, 0.75),
            p90: stats::interpolated_quantile(&terminals, 0.90),
        };

        let terminal_var = stats::interpolated_quantile(&terminals, 1.0 - params.confidence_level);
        let tail: Vec<f64> = terminals
            .iter()
            .copied()
            .filter(|v| *v <= terminal_var)
            .collect();
        let terminal_cvar = if tail.is_empty() {
            terminal_var
        } else {
            stats::mean(&tail)
        };

        let invested =
            params.initial_value + params.annual_contribution * f64::from(params.years);
        let frequency = |predicate: &dyn Fn(f64) -> bool| -> f64 {
            if completed == 0 {
                return 0.0;
            }
            terminals.iter().filter(|v| predicate(**v)).count() as f64 / count
        };

        MonteCarloResult {
            percentiles,
            mean_terminal: stats::mean(&terminals),
            terminal_var,
            terminal_cvar,
            probabilities: OutcomeProbabilities {
                reach_double: frequency(&|v| v >= 2.0 * params.initial_value),
                reach_triple: frequency(&|v| v >= 3.0 * params.initial_value),
                reach_quadruple: frequency(&|v| v >= 4.0 * params.initial_value),
                negative_outcome: frequency(&|v| v < invested),
            },
            years: params.years,
            initial_value: params.initial_value,
            simulations: params.simulations,
            completed_simulations: completed as u32,
            partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn model() -> ReturnModel {
        ReturnModel::fitted(0.07, 0.15).expect("valid")
    }

    #[test]
    fn test_seeded_run_is_reproducible() {
        let simulator = MonteCarloSimulator::default();
        let params = SimulationParams {
            seed: Some(42),
            ..SimulationParams::default()
        };

        let first = simulator
            .run(&params, &model(), &RunControl::unbounded())
            .expect("ok");
        let second = simulator
            .run(&params, &model(), &RunControl::unbounded())
            .expect("ok");

        assert_eq!(
            first.percentiles.median.to_bits(),
            second.percentiles.median.to_bits()
        );
        assert_eq!(first.percentiles.p10.to_bits(), second.percentiles.p10.to_bits());
        assert_eq!(first.percentiles.p90.to_bits(), second.percentiles.p90.to_bits());
        assert_eq!(
            first.mean_terminal.to_bits(),
            second.mean_terminal.to_bits()
        );
    }

    #[test]
    fn test_batch_size_does_not_change_results() {
        let params = SimulationParams {
            seed: Some(7),
            ..SimulationParams::default()
        };
        let small = MonteCarloSimulator::new(MonteCarloTuning {
            batch_size: 32,
            ..MonteCarloTuning::default()
        });
        let large = MonteCarloSimulator::new(MonteCarloTuning {
            batch_size: 1024,
            ..MonteCarloTuning::default()
        });

        let a = small
            .run(&params, &model(), &RunControl::unbounded())
            .expect("ok");
        let b = large
            .run(&params, &model(), &RunControl::unbounded())
            .expect("ok");
        assert_eq!(a.percentiles.median.to_bits(), b.percentiles.median.to_bits());
    }

    #[test]
    fn test_percentiles_are_ordered() {
        let simulator = MonteCarloSimulator::default();
        let result = simulator
            .run(
                &SimulationParams::default(),
                &model(),
                &RunControl::unbounded(),
            )
            .expect("ok");

        let p = result.percentiles;
        assert!(p.p10 <= p.p25);
        assert!(p.p25 <= p.median);
        assert!(p.median <= p.p75);
        assert!(p.p75 <= p.p90);
        assert!(result.terminal_cvar <= result.terminal_var);
    }

    #[test]
    fn test_parameter_bounds() {
        let simulator = MonteCarloSimulator::default();
        let cases = [
            SimulationParams {
                initial_value: 0.0,
                ..SimulationParams::default()
            },
            SimulationParams {
                years: 0,
                ..SimulationParams::default()
            },
            SimulationParams {
                years: 51,
                ..SimulationParams::default()
            },
            SimulationParams {
                simulations: 99,
                ..SimulationParams::default()
            },
            SimulationParams {
                simulations: 10_001,
                ..SimulationParams::default()
            },
            SimulationParams {
                annual_contribution: -1.0,
                ..SimulationParams::default()
            },
            SimulationParams {
                confidence_level: 1.0,
                ..SimulationParams::default()
            },
        ];
        for params in cases {
            let err = simulator
                .run(&params, &model(), &RunControl::unbounded())
                .unwrap_err();
            assert!(matches!(err, RiskError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn test_contributions_raise_terminal_values() {
        let simulator = MonteCarloSimulator::default();
        let base = SimulationParams {
            seed: Some(11),
            ..SimulationParams::default()
        };
        let with_contrib = SimulationParams {
            annual_contribution: 1_000.0,
            ..base
        };

        let without = simulator
            .run(&base, &model(), &RunControl::unbounded())
            .expect("ok");
        let with = simulator
            .run(&with_contrib, &model(), &RunControl::unbounded())
            .expect("ok");
        // Ten years of 1000 at year-end add at least 10000 undiscounted.
        assert!(with.mean_terminal > without.mean_terminal + 10_000.0 * 0.9);
    }

    #[test]
    fn test_cancellation_aborts() {
        let simulator = MonteCarloSimulator::default();
        let control = RunControl::unbounded();
        control.canceller().cancel();

        let err = simulator
            .run(&SimulationParams::default(), &model(), &control)
            .unwrap_err();
        assert!(matches!(err, RiskError::Cancelled));
    }

    #[test]
    fn test_timeout_without_opt_in_fails() {
        let simulator = MonteCarloSimulator::default();
        let control = RunControl::with_timeout(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));

        let err = simulator
            .run(&SimulationParams::default(), &model(), &control)
            .unwrap_err();
        assert!(matches!(err, RiskError::Timeout { .. }));
    }

    #[test]
    fn test_timeout_with_opt_in_but_nothing_completed_still_fails() {
        // Partial results require at least one completed batch.
        let simulator = MonteCarloSimulator::default();
        let control = RunControl::with_timeout(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        let params = SimulationParams {
            allow_partial: true,
            ..SimulationParams::default()
        };

        let err = simulator.run(&params, &model(), &control).unwrap_err();
        assert!(matches!(err, RiskError::Timeout { .. }));
    }

    #[test]
    fn test_partial_result_flagged_on_midrun_timeout() {
        let simulator = MonteCarloSimulator::new(MonteCarloTuning {
            batch_size: 100,
            ..MonteCarloTuning::default()
        });
        let params = SimulationParams {
            simulations: 1000,
            allow_partial: true,
            seed: Some(3),
            ..SimulationParams::default()
        };

        // Deterministic deadline: trip after three batches.
        let result = simulator
            .run_with_checkpoint(&params, &model(), |completed| {
                if completed >= 300 {
                    Err(RiskError::Timeout {
                        elapsed: Duration::from_millis(1),
                    })
                } else {
                    Ok(())
                }
            })
            .expect("partial accepted");

        assert!(result.partial);
        assert_eq!(result.completed_simulations, 300);
        assert_eq!(result.simulations, 1000);
        assert!(result.percentiles.p10 <= result.percentiles.p90);
    }

    #[test]
    fn test_zero_volatility_is_deterministic_growth() {
        let simulator = MonteCarloSimulator::default();
        let flat = ReturnModel::fitted(0.05, 0.0).expect("valid");
        let params = SimulationParams {
            years: 2,
            ..SimulationParams::default()
        };

        let result = simulator
            .run(&params, &flat, &RunControl::unbounded())
            .expect("ok");
        let expected = 10_000.0 * 1.05_f64.powi(2);
        assert!((result.percentiles.median - expected).abs() < 1e-6);
        assert!((result.percentiles.p10 - result.percentiles.p90).abs() < 1e-9);
    }

    #[test]
    fn test_historical_model_annualizes() {
        use chrono::NaiveDate;
        use portrisk_core::types::{ReturnSeries, ReturnsDataset};

        let start = NaiveDate::from_ymd_opt(2023, 1, 2).expect("valid");
        // Alternating daily returns with nonzero mean and spread.
        let values: Vec<f64> = (0..252)
            .map(|i| if i % 2 == 0 { 0.002 } else { -0.001 })
            .collect();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &r)| (start + chrono::Days::new(i as u64), r))
            .collect();
        let ds = ReturnsDataset::from_series(vec![
            ReturnSeries::new("PORT", points).expect("valid"),
        ])
        .expect("aligned");
        let weights = PortfolioWeights::new([("PORT".to_owned(), 1.0)]);

        let model = ReturnModel::from_history(&ds, &weights).expect("ok");
        assert!((model.annual_mean - 0.0005 * 252.0).abs() < 1e-9);
        assert!(model.annual_volatility > 0.0);
    }
}
