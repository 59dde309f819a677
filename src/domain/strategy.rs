//! Optimization strategy identity and dispatch.

use crate::domain::error::TierfolioError;
use crate::domain::estimator::EstimationResult;
use crate::domain::optimizer::{self, OptimizerConfig};
use crate::domain::risk_tier::{RiskTier, TierProfile};
use crate::domain::screener::CandidatePool;
use crate::domain::weights::WeightVector;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    Mathematical,
    Practical,
    Conservative,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::Mathematical,
        Strategy::Practical,
        Strategy::Conservative,
    ];

    /// Strategy used when the caller does not request one.
    pub fn default_for(tier: RiskTier) -> Self {
        match tier {
            RiskTier::Stable | RiskTier::StableSeeking => Strategy::Conservative,
            RiskTier::Neutral => Strategy::Practical,
            RiskTier::Aggressive | RiskTier::HighRisk => Strategy::Mathematical,
        }
    }

    /// Produces a raw (pre-enforcement) weight vector in pool order.
    pub fn optimize(
        self,
        pool: &CandidatePool,
        estimation: &EstimationResult,
        profile: &TierProfile,
        config: &OptimizerConfig,
    ) -> Result<WeightVector, TierfolioError> {
        if pool.is_empty() {
            return Err(self.infeasible(pool, "empty candidate pool"));
        }
        let tickers = pool.tickers();
        if estimation.tickers().len() != tickers.len()
            || estimation.tickers().iter().zip(&tickers).any(|(a, b)| a != b)
        {
            return Err(TierfolioError::Data {
                reason: format!(
                    "estimation covers {:?}, pool is {:?}",
                    estimation.tickers(),
                    tickers
                ),
            });
        }

        let weights = match self {
            Strategy::Mathematical => optimizer::mathematical::optimize(estimation, config)
                .map_err(|reason| self.infeasible(pool, &reason))?,
            Strategy::Practical => optimizer::practical::optimize(pool, estimation, profile, config),
            Strategy::Conservative => optimizer::conservative::optimize(pool, estimation, config),
        };
        let weights = WeightVector::from_parts(&tickers, &weights);
        if self == Strategy::Mathematical && config.weight_cutoff > 0.0 {
            return Ok(weights.cleaned(config.weight_cutoff));
        }
        Ok(weights)
    }

    fn infeasible(self, pool: &CandidatePool, reason: &str) -> TierfolioError {
        TierfolioError::OptimizationInfeasible {
            strategy: self,
            tier: pool.tier(),
            pool_size: pool.len(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Mathematical => write!(f, "mathematical"),
            Strategy::Practical => write!(f, "practical"),
            Strategy::Conservative => write!(f, "conservative"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mathematical" | "math" | "mean_variance" => Ok(Strategy::Mathematical),
            "practical" => Ok(Strategy::Practical),
            "conservative" => Ok(Strategy::Conservative),
            other => Err(format!(
                "unknown strategy '{}' (expected mathematical, practical or conservative)",
                other
            )),
        }
    }
}
