//! Domain error types.

use crate::domain::risk_tier::RiskTier;
use crate::domain::strategy::Strategy;

/// Top-level error type for tierfolio.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TierfolioError {
    #[error("insufficient candidates for {tier}: {survivors} survived screening, need {minimum}")]
    InsufficientCandidates {
        tier: RiskTier,
        survivors: usize,
        minimum: usize,
    },

    #[error(
        "insufficient history for {tier} pool of {pool_size}: {overlap} overlapping prices, need {required}"
    )]
    InsufficientHistory {
        tier: RiskTier,
        pool_size: usize,
        overlap: usize,
        required: usize,
    },

    #[error("{strategy} optimization infeasible for {tier} pool of {pool_size}: {reason}")]
    OptimizationInfeasible {
        strategy: Strategy,
        tier: RiskTier,
        pool_size: usize,
        reason: String,
    },

    #[error("single-position cap {cap} infeasible for {tier} pool of {pool_size}")]
    CapInfeasible {
        tier: RiskTier,
        pool_size: usize,
        cap: f64,
    },

    #[error("all strategies failed for {tier} pool of {pool_size}: {}", failures.join("; "))]
    AllStrategiesFailed {
        tier: RiskTier,
        pool_size: usize,
        failures: Vec<String>,
    },

    #[error("invalid instrument {ticker}: {reason}")]
    InvalidInstrument { ticker: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("io error: {reason}")]
    Io { reason: String },
}

impl TierfolioError {
    /// Whether a caller may retry the request with a different strategy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TierfolioError::OptimizationInfeasible { .. })
    }
}

impl From<std::io::Error> for TierfolioError {
    fn from(err: std::io::Error) -> Self {
        TierfolioError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<&TierfolioError> for std::process::ExitCode {
    fn from(err: &TierfolioError) -> Self {
        let code: u8 = match err {
            TierfolioError::Io { .. } => 1,
            TierfolioError::ConfigParse { .. }
            | TierfolioError::ConfigMissing { .. }
            | TierfolioError::ConfigInvalid { .. } => 2,
            TierfolioError::Data { .. } | TierfolioError::InvalidInstrument { .. } => 3,
            TierfolioError::InsufficientCandidates { .. }
            | TierfolioError::InsufficientHistory { .. } => 4,
            TierfolioError::OptimizationInfeasible { .. }
            | TierfolioError::CapInfeasible { .. }
            | TierfolioError::AllStrategiesFailed { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_optimization_failures_are_retryable() {
        let infeasible = TierfolioError::OptimizationInfeasible {
            strategy: Strategy::Mathematical,
            tier: RiskTier::Aggressive,
            pool_size: 4,
            reason: "deadline exceeded".into(),
        };
        let cap = TierfolioError::CapInfeasible {
            tier: RiskTier::Stable,
            pool_size: 2,
            cap: 0.05,
        };
        assert!(infeasible.is_retryable());
        assert!(!cap.is_retryable());
    }

    #[test]
    fn messages_carry_context() {
        let err = TierfolioError::InsufficientCandidates {
            tier: RiskTier::Stable,
            survivors: 1,
            minimum: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("stable"));
        assert!(msg.contains("1 survived"));

        let err = TierfolioError::AllStrategiesFailed {
            tier: RiskTier::Neutral,
            pool_size: 3,
            failures: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().ends_with("a; b"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TierfolioError = io.into();
        assert!(matches!(err, TierfolioError::Io { reason } if reason.contains("gone")));
    }
}
