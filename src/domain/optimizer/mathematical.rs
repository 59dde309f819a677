//! Long-only mean-variance optimization by accelerated projected gradient.
//!
//! Maximizes `mu . w - risk_aversion * w' Sigma w` over the simplex with
//! FISTA steps of size `1 / (2 * risk_aversion * lambda_max)`. Momentum is
//! reset whenever a step would lower the objective. The solve stops once a
//! plain projected step from the current point moves no weight by more than
//! `tolerance`, which is the fixed-point form of the KKT conditions.

use super::{OptimizerConfig, equal_weights, project_onto_simplex};
use crate::domain::estimator::EstimationResult;
use nalgebra::DVector;
use std::time::Instant;
use tracing::{debug, warn};

/// Returns the optimal weights, or a reason the solve was abandoned.
///
/// Every iterate is feasible, so running out of iterations yields the best
/// point reached rather than an error.
pub fn optimize(estimation: &EstimationResult, config: &OptimizerConfig) -> Result<Vec<f64>, String> {
    let n = estimation.len();
    if !(config.risk_aversion > 0.0) {
        return Err(format!("risk aversion must be positive, got {}", config.risk_aversion));
    }
    if n == 1 {
        return Ok(vec![1.0]);
    }

    let max_eig = estimation.max_eigenvalue();
    let min_eig = estimation.min_eigenvalue();
    if !max_eig.is_finite() || !min_eig.is_finite() {
        return Err("covariance has non-finite eigenvalues".to_string());
    }
    if min_eig <= config.tolerance * max_eig.max(1.0) {
        return Err(format!(
            "covariance is singular (min eigenvalue {:.3e})",
            min_eig
        ));
    }

    let mu = estimation.expected_returns();
    let sigma = estimation.covariance();
    let lambda = config.risk_aversion;
    let step = 1.0 / (2.0 * lambda * max_eig);

    let objective = |w: &DVector<f64>| mu.dot(w) - lambda * w.dot(&(sigma * w));
    let ascend = |w: &DVector<f64>| -> Result<DVector<f64>, String> {
        let gradient = mu - (sigma * w) * (2.0 * lambda);
        let moved: Vec<f64> = w.iter().zip(gradient.iter()).map(|(wi, gi)| wi + step * gi).collect();
        let next = project_onto_simplex(&moved);
        if next.iter().any(|x| !x.is_finite()) {
            return Err("non-finite iterate".to_string());
        }
        Ok(DVector::from_vec(next))
    };
    let residual = |from: &DVector<f64>, to: &DVector<f64>| (from - to).amax();

    let mut w = DVector::from_vec(equal_weights(n));
    let mut previous = w.clone();
    let mut momentum = 1.0_f64;
    let mut restarts = 0usize;

    for iteration in 0..config.max_iterations {
        if let Some(deadline) = config.deadline {
            if Instant::now() >= deadline {
                return Err(format!("deadline exceeded after {} iterations", iteration));
            }
        }

        let plain = ascend(&w)?;
        if residual(&w, &plain) < config.tolerance {
            debug!(iterations = iteration, restarts, "mean-variance converged");
            return Ok(plain.iter().copied().collect());
        }

        let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
        let extrapolated = &w + (&w - &previous) * ((momentum - 1.0) / next_momentum);
        let accelerated = ascend(&extrapolated)?;

        previous = w;
        if objective(&accelerated) < objective(&plain) {
            w = plain;
            momentum = 1.0;
            restarts += 1;
        } else {
            w = accelerated;
            momentum = next_momentum;
        }
    }

    warn!(
        iterations = config.max_iterations,
        residual = residual(&w, &ascend(&w)?),
        "mean-variance iteration budget exhausted; using last iterate"
    );
    Ok(w.iter().copied().collect())
}
