//! Statistics utilities shared by every engine.
//!
//! This module provides the numerical substrate:
//! - Mean vector and sample covariance/correlation matrices
//! - Cholesky factorization with an explicit positive-definiteness check
//! - Inverse-normal quantile
//! - OLS beta estimation against a market proxy
//!
//! Matrices are flat row-major `Vec<f64>` indexed as `m[i * n + j]`.

use portrisk_core::config::SingularPolicy;
use portrisk_core::error::{Result, RiskError};
use portrisk_core::types::ReturnsDataset;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Pivot tolerance below which a Cholesky factorization is declared singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

// ============================================================================
// Scalar statistics
// ============================================================================

/// Arithmetic mean; 0.0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with the n−1 denominator.
pub fn sample_variance(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(RiskError::insufficient_data(
            2,
            values.len(),
            "sample variance",
        ));
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

/// Linear-interpolated quantile of an ascending-sorted slice.
///
/// Uses the continuous rank p·(n−1), interpolating between the two adjacent
/// order statistics.
#[must_use]
pub fn interpolated_quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Standard normal quantile Φ⁻¹(p).
pub fn inverse_normal_cdf(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(RiskError::invalid_parameter(
            "probability",
            format!("must be in (0, 1), got {p}"),
        ));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| RiskError::invalid_parameter("normal", e.to_string()))?;
    Ok(normal.inverse_cdf(p))
}

/// OLS beta of an asset against a market proxy: cov(a, m) / var(m).
///
/// Returns `None` when the series lengths differ, fewer than two paired
/// observations exist, or the market variance is effectively zero.
#[must_use]
pub fn estimate_beta(asset: &[f64], market: &[f64]) -> Option<f64> {
    if asset.len() != market.len() || asset.len() < 2 {
        return None;
    }
    let mean_a = mean(asset);
    let mean_m = mean(market);
    let mut cov = 0.0;
    let mut var_m = 0.0;
    for (a, m) in asset.iter().zip(market.iter()) {
        cov += (a - mean_a) * (m - mean_m);
        var_m += (m - mean_m) * (m - mean_m);
    }
    if var_m < PIVOT_TOLERANCE {
        return None;
    }
    Some(cov / var_m)
}

// ============================================================================
// Matrix statistics
// ============================================================================

/// Per-ticker sample means in dataset column order.
#[must_use]
pub fn mean_vector(dataset: &ReturnsDataset) -> Vec<f64> {
    (0..dataset.n_assets())
        .map(|i| mean(dataset.column(i)))
        .collect()
}

/// Sample covariance matrix (n−1 denominator), flat row-major.
///
/// A non-degenerate estimate needs at least `n_assets + 1` observations;
/// enforcing that bound is the caller's job (see [`MarketStatistics`]) so
/// pairwise uses with fewer assets stay available.
pub fn covariance_matrix(dataset: &ReturnsDataset) -> Result<Vec<f64>> {
    let n = dataset.n_assets();
    let obs = dataset.n_observations();
    if obs < 2 {
        return Err(RiskError::insufficient_data(2, obs, "covariance matrix"));
    }

    let means = mean_vector(dataset);
    let mut cov = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let (col_i, col_j) = (dataset.column(i), dataset.column(j));
            let mut sum = 0.0;
            for t in 0..obs {
                sum += (col_i[t] - means[i]) * (col_j[t] - means[j]);
            }
            let value = sum / (obs - 1) as f64;
            cov[i * n + j] = value;
            cov[j * n + i] = value;
        }
    }
    Ok(cov)
}

/// Correlation matrix derived from a covariance matrix.
///
/// Zero-variance assets get 0 off-diagonal and 1 on the diagonal; NaN never
/// escapes.
#[must_use]
pub fn correlation_from_covariance(cov: &[f64], n: usize) -> Vec<f64> {
    let mut corr = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                corr[i * n + j] = 1.0;
                continue;
            }
            let denom = (cov[i * n + i] * cov[j * n + j]).sqrt();
            corr[i * n + j] = if denom < PIVOT_TOLERANCE {
                0.0
            } else {
                cov[i * n + j] / denom
            };
        }
    }
    corr
}

/// Covariance with all off-diagonal entries zeroed.
///
/// The explicit degraded form used under
/// [`SingularPolicy::DiagonalFallback`].
#[must_use]
pub fn diagonal_covariance(cov: &[f64], n: usize) -> Vec<f64> {
    let mut diag = vec![0.0; n * n];
    for i in 0..n {
        diag[i * n + i] = cov[i * n + i];
    }
    diag
}

/// Lower-triangular Cholesky factor L with Σ = L·Lᵀ, flat row-major.
///
/// A pivot at or below tolerance means Σ is not positive-definite; that is
/// reported as `SingularMatrixError`, never patched over.
pub fn cholesky(matrix: &[f64], n: usize) -> Result<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i * n + k] * l[j * n + k];
            }
            if i == j {
                let pivot = matrix[i * n + i] - sum;
                if pivot <= PIVOT_TOLERANCE {
                    return Err(RiskError::singular_matrix(format!(
                        "non-positive pivot at row {i}"
                    )));
                }
                l[i * n + j] = pivot.sqrt();
            } else {
                l[i * n + j] = (matrix[i * n + j] - sum) / l[j * n + j];
            }
        }
    }
    Ok(l)
}

/// Apply a lower-triangular factor to a vector of independent normals.
#[must_use]
pub fn apply_cholesky(l: &[f64], z: &[f64], n: usize) -> Vec<f64> {
    let mut result = vec![0.0; n];
    for i in 0..n {
        for j in 0..=i {
            result[i] += l[i * n + j] * z[j];
        }
    }
    result
}

/// Per-period realized portfolio returns Σ wᵢ·rᵢₜ for dataset-aligned weights.
#[must_use]
pub fn portfolio_returns(dataset: &ReturnsDataset, aligned_weights: &[f64]) -> Vec<f64> {
    let obs = dataset.n_observations();
    let mut series = vec![0.0; obs];
    for (i, &w) in aligned_weights.iter().enumerate() {
        if w == 0.0 {
            continue;
        }
        let col = dataset.column(i);
        for t in 0..obs {
            series[t] += w * col[t];
        }
    }
    series
}

// ============================================================================
// Shared per-request state
// ============================================================================

/// Covariance state built once per facade request and read-shared by the
/// engines. A value, never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatistics {
    tickers: Vec<String>,
    mean: Vec<f64>,
    covariance: Vec<f64>,
    correlation: Vec<f64>,
    cholesky: Vec<f64>,
    n_observations: usize,
    periods_per_year: f64,
    degraded_to_diagonal: bool,
}

impl MarketStatistics {
    /// Estimate from a dataset under the given singular-covariance policy.
    ///
    /// Requires `n_assets + 1` observations for a non-degenerate estimate.
    /// On a singular covariance, [`SingularPolicy::Fail`] propagates the
    /// error; [`SingularPolicy::DiagonalFallback`] retains per-asset
    /// variances only and records the degradation.
    pub fn from_dataset(dataset: &ReturnsDataset, policy: SingularPolicy) -> Result<Self> {
        let n = dataset.n_assets();
        let required = n + 1;
        if dataset.n_observations() < required {
            return Err(RiskError::insufficient_data(
                required,
                dataset.n_observations(),
                "covariance estimation",
            ));
        }

        let mean = mean_vector(dataset);
        let mut covariance = covariance_matrix(dataset)?;
        let mut degraded = false;

        let factor = match cholesky(&covariance, n) {
            Ok(l) => l,
            Err(err) => match policy {
                SingularPolicy::Fail => return Err(err),
                SingularPolicy::DiagonalFallback => {
                    tracing::warn!(
                        n_assets = n,
                        "covariance not positive-definite, degrading to diagonal"
                    );
                    degraded = true;
                    covariance = diagonal_covariance(&covariance, n);
                    // Diagonal factor: sqrt of each variance. Zero-variance
                    // assets simply contribute no randomness.
                    let mut l = vec![0.0; n * n];
                    for i in 0..n {
                        l[i * n + i] = covariance[i * n + i].max(0.0).sqrt();
                    }
                    l
                }
            },
        };

        let correlation = correlation_from_covariance(&covariance, n);
        Ok(Self {
            tickers: dataset.tickers().to_vec(),
            mean,
            covariance,
            correlation,
            cholesky: factor,
            n_observations: dataset.n_observations(),
            periods_per_year: dataset.periods_per_year(),
            degraded_to_diagonal: degraded,
        })
    }

    /// Number of assets.
    #[must_use]
    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    /// Tickers in matrix order.
    #[must_use]
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Per-asset mean returns.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Covariance matrix, flat row-major.
    #[must_use]
    pub fn covariance(&self) -> &[f64] {
        &self.covariance
    }

    /// Correlation matrix, flat row-major.
    #[must_use]
    pub fn correlation(&self) -> &[f64] {
        &self.correlation
    }

    /// Lower-triangular Cholesky factor of the (possibly degraded) covariance.
    #[must_use]
    pub fn cholesky_factor(&self) -> &[f64] {
        &self.cholesky
    }

    /// Observations behind the estimate.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// Observation frequency of the underlying dataset.
    #[must_use]
    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// True when the diagonal fallback was taken.
    #[must_use]
    pub fn degraded_to_diagonal(&self) -> bool {
        self.degraded_to_diagonal
    }

    /// Covariance entry (i, j).
    #[must_use]
    pub fn covariance_at(&self, i: usize, j: usize) -> f64 {
        self.covariance[i * self.n_assets() + j]
    }

    /// Per-asset volatility √Σᵢᵢ.
    #[must_use]
    pub fn asset_volatility(&self, i: usize) -> f64 {
        self.covariance_at(i, i).max(0.0).sqrt()
    }

    /// Σ·w for dataset-aligned weights.
    #[must_use]
    pub fn covariance_times(&self, weights: &[f64]) -> Vec<f64> {
        let n = self.n_assets();
        let mut out = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                out[i] += self.covariance[i * n + j] * weights[j];
            }
        }
        out
    }

    /// Weight vector aligned to this estimate's ticker order.
    pub fn align_weights(
        &self,
        weights: &portrisk_core::types::PortfolioWeights,
    ) -> Result<Vec<f64>> {
        weights.validate()?;
        let mut aligned = vec![0.0; self.n_assets()];
        for (ticker, weight) in weights.iter() {
            let idx = self
                .tickers
                .iter()
                .position(|t| t == ticker)
                .ok_or_else(|| RiskError::not_found("ticker", ticker))?;
            aligned[idx] = weight;
        }
        Ok(aligned)
    }

    /// Portfolio mean wᵗm.
    #[must_use]
    pub fn portfolio_mean(&self, weights: &[f64]) -> f64 {
        weights.iter().zip(self.mean.iter()).map(|(w, m)| w * m).sum()
    }

    /// Portfolio variance wᵗΣw, floored at zero against rounding.
    #[must_use]
    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        let sigma_w = self.covariance_times(weights);
        weights
            .iter()
            .zip(sigma_w.iter())
            .map(|(w, sw)| w * sw)
            .sum::<f64>()
            .max(0.0)
    }
}
