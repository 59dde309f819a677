//! Single-position cap enforcement.
//!
//! Clips weights above the tier cap and hands the excess to the instruments
//! still below it, proportionally to their current weight. The loop runs at
//! most `n + 1` times: every pass with excess pins at least one more
//! instrument to the cap.

use crate::domain::error::TierfolioError;
use crate::domain::risk_tier::TierProfile;
use crate::domain::weights::{RationaleTag, TagKind, WeightVector};
use tracing::debug;

/// Slack when comparing a weight to the cap.
const CAP_EPSILON: f64 = 1e-12;

/// Weight changes smaller than this are not reported.
const TAG_THRESHOLD: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Enforcement {
    pub weights: WeightVector,
    pub rationale: Vec<RationaleTag>,
}

/// Fails with `CapInfeasible` when `pool_size` positions at the tier cap
/// cannot reach a full allocation.
pub fn check_cap(profile: &TierProfile, pool_size: usize) -> Result<(), TierfolioError> {
    let cap = profile.single_position_cap;
    if pool_size == 0 || (pool_size as f64) * cap < 1.0 - CAP_EPSILON {
        return Err(TierfolioError::CapInfeasible {
            tier: profile.tier,
            pool_size,
            cap,
        });
    }
    Ok(())
}

pub fn enforce(raw: &WeightVector, profile: &TierProfile) -> Result<Enforcement, TierfolioError> {
    let n = raw.len();
    let cap = profile.single_position_cap;
    let infeasible = || TierfolioError::CapInfeasible {
        tier: profile.tier,
        pool_size: n,
        cap,
    };
    check_cap(profile, n)?;

    let before = raw.values();
    let mut w: Vec<f64> = before
        .iter()
        .map(|x| if x.is_finite() { x.max(0.0) } else { 0.0 })
        .collect();
    let total: f64 = w.iter().sum();
    if total <= 0.0 {
        w = vec![1.0 / n as f64; n];
    } else if (total - 1.0).abs() > CAP_EPSILON {
        for x in w.iter_mut() {
            *x /= total;
        }
    }

    let mut clipped = vec![false; n];
    let mut raised = vec![false; n];
    let mut passes = 0;
    loop {
        let mut excess = 0.0;
        for (i, x) in w.iter_mut().enumerate() {
            if *x > cap + CAP_EPSILON {
                excess += *x - cap;
                *x = cap;
                clipped[i] = true;
            }
        }
        if excess == 0.0 {
            break;
        }
        passes += 1;
        if passes > n + 1 {
            return Err(infeasible());
        }

        let below: Vec<usize> = (0..n).filter(|&i| w[i] < cap).collect();
        if below.is_empty() {
            return Err(infeasible());
        }
        let below_total: f64 = below.iter().map(|&i| w[i]).sum();
        for &i in &below {
            let share = if below_total > 0.0 {
                w[i] / below_total
            } else {
                1.0 / below.len() as f64
            };
            if share > 0.0 {
                w[i] += excess * share;
                raised[i] = true;
            }
        }
    }

    let sum: f64 = w.iter().sum();
    if (sum - 1.0).abs() > CAP_EPSILON {
        for x in w.iter_mut() {
            *x /= sum;
        }
    }

    let tickers = raw.tickers();
    let rationale: Vec<RationaleTag> = (0..n)
        .filter(|&i| (w[i] - before[i]).abs() > TAG_THRESHOLD)
        .map(|i| RationaleTag {
            kind: if clipped[i] {
                TagKind::Capped
            } else if raised[i] {
                TagKind::Raised
            } else {
                TagKind::Normalized
            },
            ticker: tickers[i].to_string(),
            before: before[i],
            after: w[i],
        })
        .collect();

    debug!(
        tier = %profile.tier,
        pool_size = n,
        cap,
        passes,
        altered = rationale.len(),
        "weights enforced"
    );

    Ok(Enforcement {
        weights: WeightVector::from_parts(&tickers, &w),
        rationale,
    })
}
