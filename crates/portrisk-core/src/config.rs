//! Analytics configuration.
//!
//! One [`AnalyticsConfig`] value parameterizes every engine: documented
//! defaults, the singular-covariance policy, the custom-shock recovery
//! policy, and cache limits. `development()` and `production()` shift only
//! operational knobs, never statistical semantics.

use crate::cache::CacheConfig;
use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when the sample covariance matrix is not positive-definite.
///
/// The choice is always explicit: engines either propagate
/// `SingularMatrixError` or degrade to the diagonal-only approximation, and
/// which one happens is decided here, not silently inside a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SingularPolicy {
    /// Propagate `SingularMatrixError` to the caller.
    #[default]
    Fail,
    /// Zero the off-diagonal entries and continue with per-asset variances.
    DiagonalFallback,
}

/// Recovery-time estimate for custom (non-historical) stress shocks.
///
/// months = `scale` · |shock|^`exponent`, a monotonic function of loss depth.
/// Named scenarios never use this; they carry observed recovery times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Months of recovery per unit (100%) of loss.
    pub scale: f64,
    /// Curvature; 1.0 is linear in loss depth.
    pub exponent: f64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        // A 35% drawdown maps to roughly a year of recovery.
        Self {
            scale: 36.0,
            exponent: 1.0,
        }
    }
}

impl RecoveryPolicy {
    /// Estimated months to recover from a fractional loss (sign ignored).
    #[must_use]
    pub fn months(&self, shock_fraction: f64) -> f64 {
        self.scale * shock_fraction.abs().powf(self.exponent)
    }

    fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale < 0.0 {
            return Err(RiskError::invalid_parameter(
                "recovery.scale",
                "must be finite and non-negative",
            ));
        }
        if !self.exponent.is_finite() || self.exponent <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "recovery.exponent",
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// VaR engine defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VaRDefaults {
    /// Default confidence level, in (0, 1).
    pub confidence_level: f64,
    /// Default horizon in periods.
    pub horizon: u32,
    /// Default Monte Carlo simulation count.
    pub simulations: u32,
}

impl Default for VaRDefaults {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            horizon: 1,
            simulations: 1000,
        }
    }
}

/// Monte Carlo simulator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloTuning {
    /// Paths per batch between cancellation checkpoints.
    pub batch_size: u32,
    /// Confidence level for terminal VaR/CVaR.
    pub confidence_level: f64,
}

impl Default for MonteCarloTuning {
    fn default() -> Self {
        Self {
            batch_size: 256,
            confidence_level: 0.95,
        }
    }
}

/// Configuration shared by every engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// VaR defaults.
    pub var: VaRDefaults,
    /// Monte Carlo tuning.
    pub monte_carlo: MonteCarloTuning,
    /// Singular-covariance handling.
    pub singular_policy: SingularPolicy,
    /// Custom-shock recovery policy.
    pub recovery: RecoveryPolicy,
    /// Cache TTL in seconds, for callers injecting a `TtlCache`.
    pub cache_ttl_secs: u64,
    /// Cache capacity, for callers injecting a `TtlCache`.
    pub cache_capacity: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            var: VaRDefaults::default(),
            monte_carlo: MonteCarloTuning::default(),
            singular_policy: SingularPolicy::default(),
            recovery: RecoveryPolicy::default(),
            cache_ttl_secs: 300,
            cache_capacity: 1024,
        }
    }
}

impl AnalyticsConfig {
    /// Development configuration: small batches so cancellation tests bite.
    #[must_use]
    pub fn development() -> Self {
        Self {
            monte_carlo: MonteCarloTuning {
                batch_size: 32,
                ..MonteCarloTuning::default()
            },
            cache_ttl_secs: 30,
            ..Self::default()
        }
    }

    /// Production configuration.
    #[must_use]
    pub fn production() -> Self {
        Self {
            monte_carlo: MonteCarloTuning {
                batch_size: 1024,
                ..MonteCarloTuning::default()
            },
            cache_ttl_secs: 900,
            cache_capacity: 4096,
            ..Self::default()
        }
    }

    /// Apply `PORTRISK_*` environment overrides to operational knobs.
    ///
    /// Recognized: `PORTRISK_MC_BATCH_SIZE`, `PORTRISK_CACHE_TTL_SECS`,
    /// `PORTRISK_SINGULAR_POLICY` (`fail` | `diagonal`).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("PORTRISK_MC_BATCH_SIZE") {
            config.monte_carlo.batch_size = raw.parse().map_err(|_| {
                RiskError::invalid_parameter("PORTRISK_MC_BATCH_SIZE", "must be a positive integer")
            })?;
        }
        if let Ok(raw) = std::env::var("PORTRISK_CACHE_TTL_SECS") {
            config.cache_ttl_secs = raw.parse().map_err(|_| {
                RiskError::invalid_parameter("PORTRISK_CACHE_TTL_SECS", "must be an integer")
            })?;
        }
        if let Ok(raw) = std::env::var("PORTRISK_SINGULAR_POLICY") {
            config.singular_policy = match raw.to_lowercase().as_str() {
                "fail" => SingularPolicy::Fail,
                "diagonal" => SingularPolicy::DiagonalFallback,
                other => {
                    return Err(RiskError::invalid_parameter(
                        "PORTRISK_SINGULAR_POLICY",
                        format!("unknown policy `{other}`"),
                    ))
                }
            };
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate every knob.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.var.confidence_level) || self.var.confidence_level <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "var.confidence_level",
                "must be in (0, 1)",
            ));
        }
        if self.var.horizon < 1 {
            return Err(RiskError::invalid_parameter("var.horizon", "must be >= 1"));
        }
        if self.monte_carlo.batch_size == 0 {
            return Err(RiskError::invalid_parameter(
                "monte_carlo.batch_size",
                "must be >= 1",
            ));
        }
        if !(0.0..1.0).contains(&self.monte_carlo.confidence_level)
            || self.monte_carlo.confidence_level <= 0.0
        {
            return Err(RiskError::invalid_parameter(
                "monte_carlo.confidence_level",
                "must be in (0, 1)",
            ));
        }
        self.recovery.validate()
    }

    /// Cache policy derived from the TTL/capacity knobs.
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: self.cache_capacity,
        }
    }
}
