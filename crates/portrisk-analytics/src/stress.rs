//! Stress-testing engine.
//!
//! Applies named historical scenarios or custom shock specifications to a
//! portfolio. Shock resolution follows specificity: asset-specific beats
//! sector, sector beats market-wide, and under `use_beta` the market shock
//! propagates through each position's beta. A position with no applicable
//! rule is reported with zero impact and flagged, never guessed.

use crate::scenarios::Scenario;
use crate::stats;
use crate::types::{PositionImpact, SectorImpact, ShockSource, StressSource, StressTestResult};
use portrisk_core::config::RecoveryPolicy;
use portrisk_core::error::{Result, RiskError};
use portrisk_core::types::{PortfolioWeights, ReturnsDataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sector bucket for tickers with no sector classification.
const UNCLASSIFIED_SECTOR: &str = "Other";

/// Asset metadata seam to the external market-data collaborator.
pub trait AssetInfoProvider {
    /// Sector classification for a ticker, when known.
    fn sector(&self, ticker: &str) -> Option<String>;
    /// Beta against the market proxy, when known.
    fn beta(&self, ticker: &str) -> Option<f64>;
}

/// Map-backed [`AssetInfoProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticAssetInfo {
    sectors: BTreeMap<String, String>,
    betas: BTreeMap<String, f64>,
}

impl StaticAssetInfo {
    /// An empty provider (no sectors, no betas).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ticker's sector.
    #[must_use]
    pub fn with_sector(mut self, ticker: impl Into<String>, sector: impl Into<String>) -> Self {
        self.sectors.insert(ticker.into(), sector.into());
        self
    }

    /// Register an externally sourced beta.
    #[must_use]
    pub fn with_beta(mut self, ticker: impl Into<String>, beta: f64) -> Self {
        self.betas.insert(ticker.into(), beta);
        self
    }

    /// Fill missing betas by OLS regression against a market proxy column
    /// of the dataset. Explicitly registered betas win; tickers whose
    /// regression is degenerate stay unset.
    pub fn with_estimated_betas(
        mut self,
        dataset: &ReturnsDataset,
        market_proxy: &str,
    ) -> Result<Self> {
        let market = dataset
            .returns_for(market_proxy)
            .ok_or_else(|| RiskError::not_found("ticker", market_proxy))?
            .to_vec();
        for ticker in dataset.tickers() {
            if ticker == market_proxy || self.betas.contains_key(ticker) {
                continue;
            }
            let asset = dataset.returns_for(ticker).unwrap_or(&[]);
            if let Some(beta) = stats::estimate_beta(asset, &market) {
                self.betas.insert(ticker.clone(), beta);
            }
        }
        Ok(self)
    }
}

impl AssetInfoProvider for StaticAssetInfo {
    fn sector(&self, ticker: &str) -> Option<String> {
        self.sectors.get(ticker).cloned()
    }

    fn beta(&self, ticker: &str) -> Option<f64> {
        self.betas.get(ticker).copied()
    }
}

/// Caller-supplied shock specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomShock {
    /// Market-wide shock fraction.
    pub market: Option<f64>,
    /// Per-sector shock fractions.
    pub sectors: BTreeMap<String, f64>,
    /// Per-asset shock fractions.
    pub assets: BTreeMap<String, f64>,
    /// Propagate the market shock through per-asset betas.
    pub use_beta: bool,
}

impl CustomShock {
    /// A market-wide shock.
    #[must_use]
    pub fn market_wide(shock: f64) -> Self {
        Self {
            market: Some(shock),
            ..Self::default()
        }
    }

    /// Add a sector shock.
    #[must_use]
    pub fn with_sector(mut self, sector: impl Into<String>, shock: f64) -> Self {
        self.sectors.insert(sector.into(), shock);
        self
    }

    /// Add an asset shock.
    #[must_use]
    pub fn with_asset(mut self, ticker: impl Into<String>, shock: f64) -> Self {
        self.assets.insert(ticker.into(), shock);
        self
    }

    /// Enable beta propagation of the market shock.
    #[must_use]
    pub fn with_beta_propagation(mut self) -> Self {
        self.use_beta = true;
        self
    }

    fn is_empty(&self) -> bool {
        self.market.is_none() && self.sectors.is_empty() && self.assets.is_empty()
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(m) = self.market {
            parts.push(format!("market {:+.1}%", m * 100.0));
        }
        if !self.sectors.is_empty() {
            parts.push(format!("{} sector shock(s)", self.sectors.len()));
        }
        if !self.assets.is_empty() {
            parts.push(format!("{} asset shock(s)", self.assets.len()));
        }
        if self.use_beta {
            parts.push("beta-propagated".to_owned());
        }
        format!("Custom shock: {}", parts.join(", "))
    }
}

/// Resolved shock for one position.
struct ResolvedShock {
    shock: f64,
    source: ShockSource,
    beta: Option<f64>,
}

/// Stress-testing engine.
#[derive(Debug, Clone)]
pub struct StressTestEngine {
    recovery: RecoveryPolicy,
}

impl Default for StressTestEngine {
    fn default() -> Self {
        Self::new(RecoveryPolicy::default())
    }
}

impl StressTestEngine {
    /// Create an engine with the given custom-shock recovery policy.
    #[must_use]
    pub fn new(recovery: RecoveryPolicy) -> Self {
        Self { recovery }
    }

    /// Apply a named historical scenario.
    ///
    /// Recovery uses the scenario's observed recovery time.
    pub fn run_scenario(
        &self,
        weights: &PortfolioWeights,
        portfolio_value: f64,
        scenario: &Scenario,
        info: &dyn AssetInfoProvider,
    ) -> Result<StressTestResult> {
        Self::validate(weights, portfolio_value)?;
        let shock = CustomShock {
            market: Some(scenario.market_shock),
            sectors: scenario.sector_shocks.clone(),
            assets: scenario.asset_shocks.clone(),
            use_beta: false,
        };
        let mut result = self.apply(weights, portfolio_value, &shock, info);
        result.source = StressSource::Scenario {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
        };
        result.recovery_months = Some(scenario.recovery_months);
        tracing::info!(
            scenario = %scenario.id,
            loss = result.portfolio_loss,
            "stress scenario applied"
        );
        Ok(result)
    }

    /// Apply a caller-supplied shock specification.
    ///
    /// Recovery is estimated from loss depth by the configured policy.
    pub fn run_custom(
        &self,
        weights: &PortfolioWeights,
        portfolio_value: f64,
        shock: &CustomShock,
        info: &dyn AssetInfoProvider,
    ) -> Result<StressTestResult> {
        Self::validate(weights, portfolio_value)?;
        if shock.is_empty() {
            return Err(RiskError::invalid_parameter(
                "shock",
                "custom shock must specify at least one of market, sectors, assets",
            ));
        }
        let mut result = self.apply(weights, portfolio_value, shock, info);
        result.recovery_months = if result.portfolio_loss < 0.0 {
            Some(self.recovery.months(result.shock_percentage))
        } else {
            Some(0.0)
        };
        tracing::info!(loss = result.portfolio_loss, "custom stress applied");
        Ok(result)
    }

    fn validate(weights: &PortfolioWeights, portfolio_value: f64) -> Result<()> {
        weights.validate()?;
        if !portfolio_value.is_finite() || portfolio_value <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "portfolio_value",
                "must be finite and positive",
            ));
        }
        Ok(())
    }

    fn apply(
        &self,
        weights: &PortfolioWeights,
        portfolio_value: f64,
        shock: &CustomShock,
        info: &dyn AssetInfoProvider,
    ) -> StressTestResult {
        let mut positions = BTreeMap::new();
        let mut sectors: BTreeMap<String, SectorImpact> = BTreeMap::new();
        let mut portfolio_loss = 0.0;

        for (ticker, weight) in weights.iter() {
            let resolved = Self::resolve(ticker, shock, info);
            let position_value = weight * portfolio_value;
            let position_loss = position_value * resolved.shock;
            portfolio_loss += position_loss;

            let sector = info
                .sector(ticker)
                .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_owned());
            let entry = sectors.entry(sector).or_insert_with(|| SectorImpact {
                weight: 0.0,
                loss: 0.0,
                tickers: Vec::new(),
            });
            entry.weight += weight;
            entry.loss += position_loss;
            entry.tickers.push(ticker.to_owned());

            positions.insert(
                ticker.to_owned(),
                PositionImpact {
                    weight,
                    price_change: resolved.shock,
                    position_value,
                    position_loss,
                    beta: resolved.beta,
                    source: resolved.source,
                },
            );
        }

        StressTestResult {
            source: StressSource::Custom {
                description: shock.describe(),
            },
            portfolio_value,
            portfolio_loss,
            shock_percentage: portfolio_loss / portfolio_value,
            portfolio_after_shock: portfolio_value + portfolio_loss,
            recovery_months: None,
            positions,
            sectors,
        }
    }

    /// Specificity order: asset > sector > market; under `use_beta` the
    /// market shock is scaled by the position's beta, and a missing beta
    /// means zero impact with the `Unshocked` flag.
    fn resolve(ticker: &str, shock: &CustomShock, info: &dyn AssetInfoProvider) -> ResolvedShock {
        if let Some(&s) = shock.assets.get(ticker) {
            return ResolvedShock {
                shock: s,
                source: ShockSource::Asset,
                beta: None,
            };
        }
        if let Some(sector) = info.sector(ticker) {
            if let Some(&s) = shock.sectors.get(&sector) {
                return ResolvedShock {
                    shock: s,
                    source: ShockSource::Sector,
                    beta: None,
                };
            }
        }
        if let Some(market) = shock.market {
            if !shock.use_beta {
                return ResolvedShock {
                    shock: market,
                    source: ShockSource::Market,
                    beta: None,
                };
            }
            if let Some(beta) = info.beta(ticker) {
                return ResolvedShock {
                    shock: beta * market,
                    source: ShockSource::Beta,
                    beta: Some(beta),
                };
            }
        }
        ResolvedShock {
            shock: 0.0,
            source: ShockSource::Unshocked,
            beta: None,
        }
    }
}
