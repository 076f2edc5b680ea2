//! Error types for PortRisk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `RiskError`.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors that can occur during risk analytics.
#[derive(Debug, Clone, Error)]
pub enum RiskError {
    /// Malformed or out-of-range input parameter.
    #[error("Invalid parameter `{field}`: {message}")]
    InvalidParameter {
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Too few observations for the requested statistic.
    #[error("Insufficient data for {context}: need {required} observations, got {actual}")]
    InsufficientData {
        /// Minimum observations required.
        required: usize,
        /// Observations actually available.
        actual: usize,
        /// The statistic or engine that needed them.
        context: String,
    },

    /// Covariance matrix is not positive-definite.
    #[error("Singular covariance matrix in {context}")]
    SingularMatrix {
        /// Where the factorization failed.
        context: String,
    },

    /// Unknown scenario id or ticker not present in the supplied returns.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up ("scenario", "ticker").
        kind: String,
        /// The missing identifier.
        id: String,
    },

    /// A run was cancelled cooperatively.
    #[error("Computation cancelled")]
    Cancelled,

    /// A run exceeded its wall-clock deadline.
    #[error("Computation timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before the deadline check fired.
        elapsed: std::time::Duration,
    },
}

impl RiskError {
    /// Construct an `InvalidParameter` error.
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Construct an `InsufficientData` error.
    pub fn insufficient_data(required: usize, actual: usize, context: impl Into<String>) -> Self {
        Self::InsufficientData {
            required,
            actual,
            context: context.into(),
        }
    }

    /// Construct a `SingularMatrix` error.
    pub fn singular_matrix(context: impl Into<String>) -> Self {
        Self::SingularMatrix {
            context: context.into(),
        }
    }

    /// Construct a `NotFound` error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Stable kind tag for the discriminated error surface.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::SingularMatrix { .. } => ErrorKind::SingularMatrix,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The offending field, when one applies.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidParameter { field, .. } => Some(field),
            Self::NotFound { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Serializable discriminated form consumed by presentation layers.
    #[must_use]
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
            field: self.field().map(str::to_owned),
        }
    }
}

/// Stable error kind tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    InvalidParameter,
    /// Too few observations.
    InsufficientData,
    /// Covariance not positive-definite.
    SingularMatrix,
    /// Unknown scenario id or ticker.
    NotFound,
    /// Cooperative cancellation.
    Cancelled,
    /// Deadline exceeded.
    Timeout,
}

/// Flat error record returned to callers across the facade boundary.
///
/// The facade never substitutes a plausible-looking number for a failed
/// computation; failures always surface as one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Discriminant.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Offending field, where applicable.
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_carries_field() {
        let err = RiskError::invalid_parameter("confidence_level", "must be in (0, 1)");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.field(), Some("confidence_level"));
        assert!(err.to_string().contains("confidence_level"));
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = RiskError::insufficient_data(20, 5, "historical VaR");
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(err.to_string().contains("need 20"));
        assert!(err.to_string().contains("got 5"));
    }

    #[test]
    fn test_error_info_roundtrip() {
        let err = RiskError::not_found("scenario", "dotcom-bust");
        let info = err.to_info();
        assert_eq!(info.kind, ErrorKind::NotFound);
        assert_eq!(info.field.as_deref(), Some("dotcom-bust"));

        let json = serde_json::to_string(&info).expect("serialize");
        let back: ErrorInfo = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_timeout_formats_elapsed() {
        let err = RiskError::Timeout {
            elapsed: std::time::Duration::from_millis(1500),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.field().is_none());
    }
}
