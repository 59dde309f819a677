//! Raw weight generation for the three strategies.
//!
//! Each strategy returns weights in pool order that are non-negative and sum
//! to one. The single-position cap is not applied here; see
//! [`crate::domain::enforcer`].

pub mod conservative;
pub mod mathematical;
pub mod practical;

use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Penalty on portfolio variance in the mean-variance objective.
    pub risk_aversion: f64,
    /// Share of the inverse-volatility weights in the practical blend.
    pub practical_blend: f64,
    /// Maximum per-instrument deviation from equal weight.
    pub conservative_band: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub deadline: Option<Instant>,
    /// Mathematical weights below this are zeroed before enforcement.
    pub weight_cutoff: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_aversion: 1.0,
            practical_blend: 0.7,
            conservative_band: 0.05,
            max_iterations: 10_000,
            tolerance: 1e-10,
            deadline: None,
            weight_cutoff: 0.0,
        }
    }
}

pub(crate) fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Scales `w` to unit sum in place. Leaves it untouched if the sum is not
/// positive.
pub(crate) fn normalize_weights(w: &mut [f64]) {
    let total: f64 = w.iter().sum();
    if total > 0.0 {
        for wi in w.iter_mut() {
            *wi /= total;
        }
    }
}

/// Euclidean projection onto the probability simplex.
pub(crate) fn project_onto_simplex(v: &[f64]) -> Vec<f64> {
    let n = v.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (k, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (k + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }
    v.iter().map(|x| (x - theta).max(0.0)).collect()
}
