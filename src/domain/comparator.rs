//! Side-by-side strategy comparison on a shared estimation.

use crate::domain::enforcer::{self, enforce};
use crate::domain::error::TierfolioError;
use crate::domain::estimator::EstimationResult;
use crate::domain::metrics::PortfolioStats;
use crate::domain::optimizer::OptimizerConfig;
use crate::domain::risk_tier::TierProfile;
use crate::domain::screener::CandidatePool;
use crate::domain::strategy::Strategy;
use crate::domain::weights::StrategyResult;
use tracing::{info, warn};

/// Optimizes, enforces the cap and scores one strategy.
pub fn evaluate(
    strategy: Strategy,
    pool: &CandidatePool,
    estimation: &EstimationResult,
    profile: &TierProfile,
    config: &OptimizerConfig,
    risk_free_rate: f64,
) -> Result<StrategyResult, TierfolioError> {
    let raw = strategy.optimize(pool, estimation, profile, config)?;
    let enforced = enforce(&raw, profile)?;
    let stats = PortfolioStats::compute(&enforced.weights, estimation, pool, risk_free_rate);
    Ok(StrategyResult {
        strategy,
        weights: enforced.weights,
        score: stats.sharpe_ratio,
        stats,
        rationale: enforced.rationale,
    })
}

/// Runs every strategy and returns the survivors best-first by expected
/// Sharpe ratio. Ties keep the [`Strategy::ALL`] order.
pub fn compare(
    pool: &CandidatePool,
    estimation: &EstimationResult,
    profile: &TierProfile,
    config: &OptimizerConfig,
    risk_free_rate: f64,
) -> Result<Vec<StrategyResult>, TierfolioError> {
    // An unreachable cap fails every strategy the same way.
    enforcer::check_cap(profile, pool.len())?;

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for strategy in Strategy::ALL {
        match evaluate(strategy, pool, estimation, profile, config, risk_free_rate) {
            Ok(result) => results.push(result),
            Err(err) => {
                warn!(
                    %strategy,
                    tier = %pool.tier(),
                    pool_size = pool.len(),
                    error = %err,
                    "strategy omitted from comparison"
                );
                failures.push(format!("{}: {}", strategy, err));
            }
        }
    }

    if results.is_empty() {
        return Err(TierfolioError::AllStrategiesFailed {
            tier: pool.tier(),
            pool_size: pool.len(),
            failures,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.strategy.cmp(&b.strategy))
    });
    info!(
        tier = %pool.tier(),
        pool_size = pool.len(),
        survivors = results.len(),
        best = %results[0].strategy,
        "comparison complete"
    );
    Ok(results)
}
