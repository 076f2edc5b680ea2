//! # PortRisk Analytics
//!
//! Portfolio risk analytics engines:
//!
//! - [`stats`] — mean/covariance/correlation estimation, Cholesky
//!   factorization, inverse-normal quantile
//! - [`var`] — historical, parametric, and Monte Carlo Value at Risk
//! - [`stress`] — scenario and custom-shock stress testing
//! - [`monte_carlo`] — forward simulation of portfolio value
//! - [`drawdown`] — peak-to-trough episode analysis
//! - [`contribution`] — per-asset risk decomposition
//! - [`facade`] — validated request entry point
//!
//! Engines are stateless between requests: they consume an immutable
//! [`portrisk_core::types::ReturnsDataset`] plus weights and return fresh
//! result records. The covariance estimate built for one request is shared
//! read-only across the engines that need it.

#![warn(missing_docs)]

pub mod contribution;
pub mod drawdown;
pub mod facade;
pub mod monte_carlo;
pub mod scenarios;
pub mod stats;
pub mod stress;
pub mod types;
pub mod var;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::contribution::RiskContributionEngine;
    pub use crate::drawdown::DrawdownAnalyzer;
    pub use crate::facade::RiskAnalyticsFacade;
    pub use crate::monte_carlo::{
        MonteCarloSimulator, RebalanceFrequency, ReturnModel, SimulationParams,
    };
    pub use crate::scenarios::{Scenario, ScenarioCatalog};
    pub use crate::stats::MarketStatistics;
    pub use crate::stress::{
        AssetInfoProvider, CustomShock, StaticAssetInfo, StressTestEngine,
    };
    pub use crate::types::*;
    pub use crate::var::{VaREngine, VaRParams};
    pub use portrisk_core::prelude::*;
}

pub use contribution::RiskContributionEngine;
pub use drawdown::DrawdownAnalyzer;
pub use facade::RiskAnalyticsFacade;
pub use monte_carlo::{MonteCarloSimulator, RebalanceFrequency, ReturnModel, SimulationParams};
pub use scenarios::{Scenario, ScenarioCatalog};
pub use stats::MarketStatistics;
pub use stress::{AssetInfoProvider, CustomShock, StaticAssetInfo, StressTestEngine};
pub use types::{
    DrawdownPeriod, DrawdownResult, MonteCarloResult, RiskContributionResult, RiskReport,
    StressTestResult, VaRMethod, VaRResult,
};
pub use var::{VaREngine, VaRParams};
