//! Result records produced by the engines.
//!
//! Every record is an immutable value computed fresh per request. Fractions
//! are decimals in [−1, large], never pre-multiplied by 100; dates serialize
//! as ISO-8601. Display conversion belongs to consumers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Value at Risk
// ============================================================================

/// VaR estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaRMethod {
    /// Empirical quantile of realized portfolio returns.
    Historical,
    /// Variance-covariance closed form under normality.
    Parametric,
    /// Correlated simulation through the Cholesky factor.
    MonteCarlo,
}

impl std::fmt::Display for VaRMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Historical => write!(f, "historical"),
            Self::Parametric => write!(f, "parametric"),
            Self::MonteCarlo => write!(f, "monte-carlo"),
        }
    }
}

/// Value-at-Risk estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaRResult {
    /// Fractional loss threshold, always ≥ 0.
    pub value: f64,
    /// Confidence level in (0, 1).
    pub confidence_level: f64,
    /// Horizon in periods.
    pub horizon: u32,
    /// How the estimate was produced.
    pub method: VaRMethod,
    /// `value` × the supplied portfolio value.
    pub absolute_value: f64,
}

// ============================================================================
// Stress testing
// ============================================================================

/// Where a position's effective shock came from, in specificity order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShockSource {
    /// Asset-specific shock.
    Asset,
    /// Sector-level shock.
    Sector,
    /// Market-wide shock.
    Market,
    /// Market shock scaled by the position's beta.
    Beta,
    /// No applicable shock; impact reported as zero, never guessed.
    Unshocked,
}

/// Per-position stress impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionImpact {
    /// Portfolio weight of the position.
    pub weight: f64,
    /// Effective fractional price change applied.
    pub price_change: f64,
    /// Pre-shock position value.
    pub position_value: f64,
    /// Loss in currency units (≤ 0 for adverse shocks).
    pub position_loss: f64,
    /// Beta used, when the shock was beta-propagated.
    pub beta: Option<f64>,
    /// Which rule resolved the shock.
    pub source: ShockSource,
}

/// Aggregated impact for one sector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorImpact {
    /// Combined weight of the sector's positions.
    pub weight: f64,
    /// Combined loss in currency units.
    pub loss: f64,
    /// Tickers grouped into this sector.
    pub tickers: Vec<String>,
}

/// What was stressed: a named historical scenario or a custom shock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StressSource {
    /// A catalog scenario.
    Scenario {
        /// Catalog id.
        id: String,
        /// Display name.
        name: String,
    },
    /// A caller-supplied shock specification.
    Custom {
        /// Free-form description of the shock.
        description: String,
    },
}

/// Outcome of applying a stress scenario to a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestResult {
    /// Scenario reference or custom description.
    pub source: StressSource,
    /// Pre-shock portfolio value.
    pub portfolio_value: f64,
    /// Total loss in currency units (≤ 0 for adverse shocks).
    pub portfolio_loss: f64,
    /// Portfolio-level shock as a fraction of value.
    pub shock_percentage: f64,
    /// Portfolio value after the shock.
    pub portfolio_after_shock: f64,
    /// Estimated months to recover, when estimable.
    pub recovery_months: Option<f64>,
    /// Per-ticker impacts.
    pub positions: BTreeMap<String, PositionImpact>,
    /// Per-sector aggregates; tickers without a sector land in "Other".
    pub sectors: BTreeMap<String, SectorImpact>,
}

// ============================================================================
// Monte Carlo simulation
// ============================================================================

/// Terminal-value percentiles of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalPercentiles {
    /// 10th percentile.
    pub p10: f64,
    /// 25th percentile.
    pub p25: f64,
    /// Median.
    pub median: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 90th percentile.
    pub p90: f64,
}

/// Probabilities of notable outcomes across simulated paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbabilities {
    /// Terminal value ≥ 2× initial.
    pub reach_double: f64,
    /// Terminal value ≥ 3× initial.
    pub reach_triple: f64,
    /// Terminal value ≥ 4× initial.
    pub reach_quadruple: f64,
    /// Terminal value below total invested capital.
    pub negative_outcome: f64,
}

/// Forward-simulation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// Terminal-value percentiles.
    pub percentiles: TerminalPercentiles,
    /// Mean terminal value.
    pub mean_terminal: f64,
    /// Terminal value at the (1 − confidence) percentile (absolute, not a return).
    pub terminal_var: f64,
    /// Mean terminal value at or below `terminal_var`.
    pub terminal_cvar: f64,
    /// Outcome probabilities.
    pub probabilities: OutcomeProbabilities,
    /// Echoed input: projection years.
    pub years: u32,
    /// Echoed input: initial portfolio value.
    pub initial_value: f64,
    /// Echoed input: requested simulation count.
    pub simulations: u32,
    /// Paths actually completed (= `simulations` unless partial).
    pub completed_simulations: u32,
    /// True only when the caller opted into partial results on timeout.
    pub partial: bool,
}

// ============================================================================
// Drawdowns
// ============================================================================

/// One peak-to-trough episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownPeriod {
    /// Date of the last peak before the decline.
    pub start_date: NaiveDate,
    /// Date of the trough.
    pub valley_date: NaiveDate,
    /// First date at or above the prior peak; `None` while underwater.
    pub recovery_date: Option<NaiveDate>,
    /// Fractional depth, ≤ 0.
    pub depth: f64,
    /// Periods from start to valley.
    pub length: u32,
    /// Periods from valley to recovery; `None` while underwater.
    pub recovery: Option<u32>,
}

/// Full drawdown profile of a value series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownResult {
    /// Episodes in chronological order.
    pub periods: Vec<DrawdownPeriod>,
    /// Fractional distance below the running peak per date, ≤ 0.
    pub underwater: Vec<(NaiveDate, f64)>,
    /// Deepest episode depth (most negative), 0 when no episodes.
    pub max_drawdown: f64,
    /// Mean episode depth, 0 when no episodes.
    pub average_drawdown: f64,
    /// Mean recovery length over recovered episodes.
    pub average_recovery: Option<f64>,
    /// Episodes per year over the series span.
    pub drawdown_frequency: f64,
    /// Mean |underwater|.
    pub pain_index: f64,
    /// √(mean underwater²).
    pub ulcer_index: f64,
}

// ============================================================================
// Risk contributions
// ============================================================================

/// One asset's share of portfolio risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetContribution {
    /// ∂σₚ/∂wᵢ = (Σw)ᵢ / σₚ.
    pub marginal: f64,
    /// wᵢ · marginal; components sum to σₚ.
    pub component: f64,
    /// component / σₚ × 100; percentages sum to 100.
    pub percentage: f64,
}

/// Volatility decomposition across assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskContributionResult {
    /// Per-ticker contributions.
    pub contributions: BTreeMap<String, AssetContribution>,
    /// (Σ wᵢσᵢ) / σₚ, ≥ 1 for a long-only portfolio.
    pub diversification_ratio: f64,
    /// Portfolio volatility σₚ.
    pub portfolio_volatility: f64,
}

// ============================================================================
// Combined report
// ============================================================================

/// The facade's one-call summary, assembled from engines that ran
/// concurrently over one shared covariance estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// Parametric VaR at the configured defaults.
    pub value_at_risk: VaRResult,
    /// Stress test for the requested scenario.
    pub stress_test: StressTestResult,
    /// Drawdown profile of the realized portfolio value path.
    pub drawdowns: DrawdownResult,
    /// Volatility decomposition.
    pub risk_contribution: RiskContributionResult,
}
