//! Request pipeline: screen, estimate, optimize, enforce, report.

use crate::domain::comparator::{self, evaluate};
use crate::domain::enforcer;
use crate::domain::error::TierfolioError;
use crate::domain::estimator::{EstimationResult, EstimatorConfig, estimate};
use crate::domain::instrument::Instrument;
use crate::domain::metrics::{ConcentrationWarning, DEFAULT_RISK_FREE_RATE, RiskGrade, concentration_warnings};
use crate::domain::optimizer::OptimizerConfig;
use crate::domain::risk_tier::{RiskTier, TierProfile};
use crate::domain::screener::{CandidatePool, ScreenOptions, screen_with};
use crate::domain::strategy::Strategy;
use crate::domain::weights::{StrategyResult, WeightVector};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub risk_free_rate: f64,
    pub screening: ScreenOptions,
    pub estimator: EstimatorConfig,
    pub optimizer: OptimizerConfig,
    /// Budget for the whole optimization phase of one request.
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            screening: ScreenOptions::default(),
            estimator: EstimatorConfig::default(),
            optimizer: OptimizerConfig::default(),
            timeout: None,
        }
    }
}

impl EngineConfig {
    /// Optimizer settings with the deadline anchored at the current instant.
    fn optimizer_for_request(&self) -> OptimizerConfig {
        let mut optimizer = self.optimizer.clone();
        if let Some(timeout) = self.timeout {
            optimizer.deadline = Instant::now().checked_add(timeout);
        }
        optimizer
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fallback {
    pub from: Strategy,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub tier: RiskTier,
    pub requested: Strategy,
    pub fallback: Option<Fallback>,
    pub pool: CandidatePool,
    pub estimation: EstimationResult,
    pub result: StrategyResult,
    pub risk_grade: RiskGrade,
    /// Whether `risk_grade` is among the grades allowed for `tier`.
    pub suitable: bool,
    pub warnings: Vec<ConcentrationWarning>,
    /// Equity weights scaled to the tier's equity allocation.
    pub portfolio_weights: WeightVector,
}

impl Recommendation {
    pub fn strategy(&self) -> Strategy {
        self.result.strategy
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub tier: RiskTier,
    pub pool: CandidatePool,
    pub estimation: EstimationResult,
    /// Best first.
    pub results: Vec<StrategyResult>,
}

/// Screens and estimates, then runs the requested strategy (or the tier
/// default). A retryable Mathematical failure falls back to Practical.
pub fn recommend(
    universe: &[Instrument],
    profile: &TierProfile,
    requested: Option<Strategy>,
    config: &EngineConfig,
) -> Result<Recommendation, TierfolioError> {
    let (pool, estimation) = prepare(universe, profile, config)?;
    enforcer::check_cap(profile, pool.len())?;

    let requested = requested.unwrap_or_else(|| Strategy::default_for(profile.tier));
    let optimizer = config.optimizer_for_request();
    let run = |strategy| evaluate(strategy, &pool, &estimation, profile, &optimizer, config.risk_free_rate);

    let (result, fallback) = match run(requested) {
        Ok(result) => (result, None),
        Err(err) if err.is_retryable() && requested == Strategy::Mathematical => {
            warn!(
                tier = %profile.tier,
                pool_size = pool.len(),
                error = %err,
                "mathematical optimization failed; falling back to practical"
            );
            let result = run(Strategy::Practical)?;
            let reason = match err {
                TierfolioError::OptimizationInfeasible { reason, .. } => reason,
                other => other.to_string(),
            };
            (
                result,
                Some(Fallback {
                    from: Strategy::Mathematical,
                    reason,
                }),
            )
        }
        Err(err) => return Err(err),
    };

    let risk_grade = result.stats.risk_grade();
    let suitable = risk_grade.suits(profile.tier);
    let warnings = concentration_warnings(&result.weights);
    let portfolio_weights = result.weights.scaled(profile.allocation.equity);

    info!(
        tier = %profile.tier,
        pool_size = pool.len(),
        strategy = %result.strategy,
        sharpe = result.score,
        grade = %risk_grade,
        suitable,
        "recommendation ready"
    );

    Ok(Recommendation {
        tier: profile.tier,
        requested,
        fallback,
        pool,
        estimation,
        result,
        risk_grade,
        suitable,
        warnings,
        portfolio_weights,
    })
}

pub fn compare_universe(
    universe: &[Instrument],
    profile: &TierProfile,
    config: &EngineConfig,
) -> Result<Comparison, TierfolioError> {
    let (pool, estimation) = prepare(universe, profile, config)?;
    let optimizer = config.optimizer_for_request();
    let results = comparator::compare(&pool, &estimation, profile, &optimizer, config.risk_free_rate)?;
    Ok(Comparison {
        tier: profile.tier,
        pool,
        estimation,
        results,
    })
}

fn prepare(
    universe: &[Instrument],
    profile: &TierProfile,
    config: &EngineConfig,
) -> Result<(CandidatePool, EstimationResult), TierfolioError> {
    let pool = screen_with(universe, profile, &config.screening)?;
    let estimation = estimate(&pool, &config.estimator)?;
    Ok((pool, estimation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::{FinancialPeriod, PricePoint};
    use crate::domain::risk_tier::standard_table;
    use chrono::NaiveDate;

    fn instrument(ticker: &str, sector: &str, drift: f64, swing: f64, seed: u64) -> Instrument {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
        let mut close = 100.0;
        let prices = (0..60)
            .map(|i| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let uniform = (state >> 11) as f64 / (1u64 << 53) as f64;
                close *= 1.0 + drift + swing * (uniform - 0.5);
                PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    close,
                }
            })
            .collect();
        Instrument::new(ticker, sector)
            .with_period(FinancialPeriod {
                year: 2023,
                revenue: 5000.0,
                operating_margin: 12.0,
                net_income: Some(100.0),
            })
            .with_prices(prices)
    }

    fn universe(n: usize) -> Vec<Instrument> {
        (0..n)
            .map(|i| {
                instrument(
                    &format!("{:06}", i + 1),
                    "electronics",
                    0.001 * (i as f64 + 1.0),
                    0.02 + 0.008 * i as f64,
                    i as u64,
                )
            })
            .collect()
    }

    #[test]
    fn default_strategy_follows_tier() {
        let profile = standard_table().get(RiskTier::Neutral);
        let rec = recommend(&universe(8), profile, None, &EngineConfig::default()).unwrap();
        assert_eq!(rec.requested, Strategy::Practical);
        assert_eq!(rec.strategy(), Strategy::Practical);
        assert!(rec.fallback.is_none());
        assert!(rec.result.weights.is_normalized());
        assert!(rec.result.weights.max_weight() <= profile.single_position_cap + 1e-6);
        assert!((rec.portfolio_weights.sum() - profile.allocation.equity).abs() < 1e-6);
    }

    #[test]
    fn mathematical_falls_back_when_deadline_passes() {
        let profile = standard_table().get(RiskTier::Aggressive);
        let config = EngineConfig {
            timeout: Some(Duration::ZERO),
            ..EngineConfig::default()
        };
        let rec = recommend(&universe(6), profile, Some(Strategy::Mathematical), &config).unwrap();
        assert_eq!(rec.strategy(), Strategy::Practical);
        let fallback = rec.fallback.unwrap();
        assert_eq!(fallback.from, Strategy::Mathematical);
        assert!(fallback.reason.contains("deadline"));
    }

    #[test]
    fn stable_tier_with_tiny_universe_is_cap_infeasible() {
        let profile = standard_table().get(RiskTier::Stable);
        let err = recommend(&universe(3), profile, None, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, TierfolioError::CapInfeasible { pool_size: 3, .. }));
    }

    #[test]
    fn compare_ranks_all_strategies() {
        let profile = standard_table().get(RiskTier::HighRisk);
        let cmp = compare_universe(&universe(6), profile, &EngineConfig::default()).unwrap();
        assert_eq!(cmp.tier, RiskTier::HighRisk);
        assert!(!cmp.results.is_empty());
        for pair in cmp.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn short_history_aborts_request() {
        let profile = standard_table().get(RiskTier::Neutral);
        let config = EngineConfig {
            estimator: EstimatorConfig {
                min_overlap: 100,
                ..EstimatorConfig::default()
            },
            ..EngineConfig::default()
        };
        let err = recommend(&universe(8), profile, None, &config).unwrap_err();
        assert!(matches!(err, TierfolioError::InsufficientHistory { .. }));
    }
}
