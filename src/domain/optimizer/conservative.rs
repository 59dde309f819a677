//! Equal weight with a bounded tilt toward calm, stable instruments.

use super::{OptimizerConfig, equal_weights};
use crate::domain::estimator::EstimationResult;
use crate::domain::screener::CandidatePool;

/// Each weight stays within `conservative_band` of `1/n`. The band is
/// narrowed to `1/n` when wider so no weight goes negative.
pub fn optimize(pool: &CandidatePool, estimation: &EstimationResult, config: &OptimizerConfig) -> Vec<f64> {
    let n = pool.len();
    let mut weights = equal_weights(n);
    if n < 2 {
        return weights;
    }
    let band = config.conservative_band.clamp(0.0, 1.0 / n as f64);

    let vols = estimation.volatilities();
    let lo = vols.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = vols.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let calm: Vec<f64> = vols
        .iter()
        .map(|v| if hi - lo > 0.0 { (hi - v) / (hi - lo) } else { 0.5 })
        .collect();

    let signal: Vec<f64> = pool
        .candidates()
        .iter()
        .zip(&calm)
        .map(|(c, calm)| calm + c.score.stability)
        .collect();
    let mean = signal.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = signal.iter().map(|s| s - mean).collect();
    let spread = centered.iter().map(|t| t.abs()).fold(0.0, f64::max);
    if spread < 1e-12 {
        return weights;
    }

    for (w, t) in weights.iter_mut().zip(&centered) {
        *w += band * t / spread;
    }
    weights
}
