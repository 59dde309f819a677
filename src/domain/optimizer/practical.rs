//! Inverse-volatility weighting with sector tilt, blended with equal weight.

use super::{OptimizerConfig, equal_weights, normalize_weights};
use crate::domain::estimator::EstimationResult;
use crate::domain::risk_tier::TierProfile;
use crate::domain::screener::CandidatePool;

/// Volatility floor so a flat price series does not take the whole pool.
const MIN_VOLATILITY: f64 = 1e-4;

pub fn optimize(
    pool: &CandidatePool,
    estimation: &EstimationResult,
    profile: &TierProfile,
    config: &OptimizerConfig,
) -> Vec<f64> {
    let n = pool.len();
    let baseline = equal_weights(n);

    let mut tilted: Vec<f64> = pool
        .candidates()
        .iter()
        .zip(estimation.volatilities())
        .map(|(candidate, vol)| {
            let boost = profile.sector_boost(&candidate.instrument.sector);
            (1.0 + boost) / vol.max(MIN_VOLATILITY)
        })
        .collect();
    normalize_weights(&mut tilted);

    let blend = config.practical_blend.clamp(0.0, 1.0);
    tilted
        .iter()
        .zip(&baseline)
        .map(|(t, e)| blend * t + (1.0 - blend) * e)
        .collect()
}
