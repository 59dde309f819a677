//! End-to-end tests of the screening, estimation, optimization and
//! enforcement pipeline on synthetic universes.

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use tierfolio::domain::comparator::compare;
use tierfolio::domain::enforcer::enforce;
use tierfolio::domain::engine::{EngineConfig, compare_universe, recommend};
use tierfolio::domain::error::TierfolioError;
use tierfolio::domain::estimator::{EstimatorConfig, estimate};
use tierfolio::domain::optimizer::OptimizerConfig;
use tierfolio::domain::risk_tier::{RiskTier, standard_table};
use tierfolio::domain::screener::{ExclusionReason, screen};
use tierfolio::domain::strategy::Strategy;
use tierfolio::ports::universe_port::UniversePort;

fn korean_sample() -> Vec<tierfolio::domain::instrument::Instrument> {
    let mut loss_maker = priced_instrument("XYZ", "biotech", 50.0, -3.0, 3);
    loss_maker.financials[0].net_income = Some(-4.0);
    vec![
        priced_instrument("005930", "semiconductors", 3000.0, 12.0, 1),
        priced_instrument("000660", "semiconductors", 800.0, 8.0, 2),
        loss_maker,
    ]
}

mod screening {
    use super::*;

    #[test]
    fn stable_pool_drops_small_loss_maker() {
        let pool = screen(&korean_sample(), standard_table().get(RiskTier::Stable)).unwrap();
        assert_eq!(pool.tickers(), vec!["005930", "000660"]);
        let xyz = pool.excluded().iter().find(|e| e.ticker == "XYZ").unwrap();
        assert_eq!(xyz.reason, ExclusionReason::LossMaking);
    }

    #[test]
    fn high_risk_keeps_the_loss_maker() {
        let pool = screen(&korean_sample(), standard_table().get(RiskTier::HighRisk)).unwrap();
        assert_eq!(pool.len(), 3);
        assert!(pool.excluded().is_empty());
    }

    #[test]
    fn pools_shrink_as_tiers_get_safer() {
        let mut universe = synthetic_universe(6, "electronics");
        universe.push(make_instrument("SMALL", "gaming", 40.0, -5.0));
        universe.push(make_instrument("MID", "chemicals", 200.0, 1.0));
        let sizes: Vec<usize> = RiskTier::ALL
            .iter()
            .map(|t| screen(&universe, standard_table().get(*t)).unwrap().len())
            .collect();
        for pair in sizes.windows(2) {
            assert!(pair[0] <= pair[1], "pool sizes {:?}", sizes);
        }
    }
}

mod cap_feasibility {
    use super::*;

    #[test]
    fn stable_pair_cannot_meet_five_percent_cap() {
        let profile = standard_table().get(RiskTier::Stable);
        let err = recommend(&korean_sample(), profile, None, &EngineConfig::default()).unwrap_err();
        match err {
            TierfolioError::CapInfeasible { tier, pool_size, .. } => {
                assert_eq!(tier, RiskTier::Stable);
                assert_eq!(pool_size, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn neutral_pair_optimizes_but_fails_enforcement() {
        let universe = vec![
            priced_instrument("AAA", "electronics", 1200.0, 9.0, 11),
            priced_instrument("BBB", "chemicals", 900.0, 6.0, 12),
        ];
        let profile = standard_table().get(RiskTier::Neutral);
        let pool = screen(&universe, profile).unwrap();
        let estimation = estimate(&pool, &EstimatorConfig::default()).unwrap();

        let raw = Strategy::Practical
            .optimize(&pool, &estimation, profile, &OptimizerConfig::default())
            .unwrap();
        assert_abs_diff_eq!(raw.sum(), 1.0, epsilon = 1e-9);

        let err = enforce(&raw, profile).unwrap_err();
        assert!(matches!(err, TierfolioError::CapInfeasible { pool_size: 2, .. }));
    }
}

mod singular_covariance {
    use super::*;

    /// Eight instruments where two share an identical price history.
    fn universe_with_twins() -> Vec<tierfolio::domain::instrument::Instrument> {
        let mut universe = synthetic_universe(7, "electronics");
        let twin = make_instrument("TWIN", "electronics", 1500.0, 7.0)
            .with_prices(universe[0].prices.clone());
        universe.push(twin);
        universe
    }

    #[test]
    fn comparison_omits_mathematical() {
        let profile = standard_table().get(RiskTier::Neutral);
        let cmp = compare_universe(&universe_with_twins(), profile, &EngineConfig::default()).unwrap();
        let strategies: Vec<Strategy> = cmp.results.iter().map(|r| r.strategy).collect();
        assert_eq!(strategies.len(), 2);
        assert!(strategies.contains(&Strategy::Practical));
        assert!(strategies.contains(&Strategy::Conservative));
    }

    #[test]
    fn mathematical_request_falls_back_to_practical() {
        let profile = standard_table().get(RiskTier::Neutral);
        let rec = recommend(
            &universe_with_twins(),
            profile,
            Some(Strategy::Mathematical),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(rec.requested, Strategy::Mathematical);
        assert_eq!(rec.strategy(), Strategy::Practical);
        let fallback = rec.fallback.unwrap();
        assert!(fallback.reason.contains("singular"), "{}", fallback.reason);
    }
}

mod pipeline {
    use super::*;

    #[test]
    fn every_tier_respects_its_cap() {
        let universe = synthetic_universe(24, "electronics");
        for tier in RiskTier::ALL {
            let profile = standard_table().get(tier);
            let cmp = compare_universe(&universe, profile, &EngineConfig::default()).unwrap();
            assert!(!cmp.results.is_empty());
            for pair in cmp.results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
            for result in &cmp.results {
                assert!(result.weights.is_normalized(), "{} {}", tier, result.strategy);
                assert!(result.weights.max_weight() <= profile.single_position_cap + 1e-6);
                assert!(result.weights.values().iter().all(|w| *w >= 0.0));
            }
        }
    }

    #[test]
    fn recommendation_is_deterministic() {
        let universe = synthetic_universe(12, "automotive");
        let profile = standard_table().get(RiskTier::Aggressive);
        let first = recommend(&universe, profile, None, &EngineConfig::default()).unwrap();
        let second = recommend(&universe, profile, None, &EngineConfig::default()).unwrap();
        assert_eq!(first.result.weights, second.result.weights);
        assert_eq!(first.risk_grade, second.risk_grade);
    }

    #[test]
    fn portfolio_weights_follow_equity_allocation() {
        let universe = synthetic_universe(10, "electronics");
        for tier in [RiskTier::Neutral, RiskTier::Aggressive, RiskTier::HighRisk] {
            let profile = standard_table().get(tier);
            let rec = recommend(&universe, profile, None, &EngineConfig::default()).unwrap();
            assert_abs_diff_eq!(rec.portfolio_weights.sum(), profile.allocation.equity, epsilon = 1e-6);
            assert_eq!(rec.portfolio_weights.len(), rec.result.weights.len());
        }
    }

    #[test]
    fn compare_on_shared_estimation_matches_engine() {
        let universe = synthetic_universe(10, "electronics");
        let profile = standard_table().get(RiskTier::HighRisk);
        let pool = screen(&universe, profile).unwrap();
        let estimation = estimate(&pool, &EstimatorConfig::default()).unwrap();
        let direct = compare(&pool, &estimation, profile, &OptimizerConfig::default(), 0.02).unwrap();
        let engine = compare_universe(&universe, profile, &EngineConfig::default()).unwrap();
        let direct_order: Vec<Strategy> = direct.iter().map(|r| r.strategy).collect();
        let engine_order: Vec<Strategy> = engine.results.iter().map(|r| r.strategy).collect();
        assert_eq!(direct_order, engine_order);
    }

    #[test]
    fn mock_universe_feeds_the_engine() {
        let port = MockUniversePort::new().with_instruments(synthetic_universe(8, "electronics"));
        let universe = port.load_universe().unwrap();
        assert_eq!(universe.len(), 8);
        let profile = standard_table().get(RiskTier::Neutral);
        let rec = recommend(&universe, profile, None, &EngineConfig::default()).unwrap();
        assert_eq!(rec.strategy(), Strategy::Practical);
    }

    #[test]
    fn unrelated_prices_are_insufficient_history() {
        let mut late = priced_instrument("LATE", "electronics", 1000.0, 8.0, 9);
        for p in late.prices.iter_mut() {
            p.date += chrono::Duration::days(365);
        }
        let universe = vec![priced_instrument("EARLY", "electronics", 1000.0, 8.0, 8), late];
        let profile = standard_table().get(RiskTier::HighRisk);
        let err = recommend(&universe, profile, None, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, TierfolioError::InsufficientHistory { .. }));
    }
}
