//! Portfolio statistics, risk grading and concentration checks.

use super::estimator::EstimationResult;
use super::risk_tier::RiskTier;
use super::screener::CandidatePool;
use super::weights::WeightVector;
use std::fmt;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Any single holding above this share triggers a warning.
pub const SINGLE_POSITION_WARNING: f64 = 0.20;

/// Combined share of the three largest holdings above this triggers a warning.
pub const TOP_THREE_WARNING: f64 = 0.60;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioStats {
    /// Annualized.
    pub expected_return: f64,
    /// Annualized.
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Herfindahl-Hirschman index of the weights.
    pub hhi: f64,
    /// `1 / hhi`.
    pub effective_holdings: f64,
    /// Sector share, largest first.
    pub sector_distribution: Vec<(String, f64)>,
}

impl PortfolioStats {
    /// `weights` must be in pool order, as produced by the optimizers.
    pub fn compute(
        weights: &WeightVector,
        estimation: &EstimationResult,
        pool: &CandidatePool,
        risk_free_rate: f64,
    ) -> Self {
        let w = weights.values();
        let expected_return = estimation.portfolio_return(&w);
        let volatility = estimation.portfolio_variance(&w).max(0.0).sqrt();
        let sharpe_ratio = sharpe(expected_return, volatility, risk_free_rate);

        let hhi: f64 = w.iter().map(|x| x * x).sum();
        let effective_holdings = if hhi > 0.0 { 1.0 / hhi } else { 0.0 };

        let mut sector_distribution: Vec<(String, f64)> = Vec::new();
        for (candidate, weight) in pool.candidates().iter().zip(&w) {
            let sector = &candidate.instrument.sector;
            match sector_distribution.iter_mut().find(|(s, _)| s == sector) {
                Some((_, total)) => *total += weight,
                None => sector_distribution.push((sector.clone(), *weight)),
            }
        }
        sector_distribution.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        PortfolioStats {
            expected_return,
            volatility,
            sharpe_ratio,
            hhi,
            effective_holdings,
            sector_distribution,
        }
    }

    pub fn risk_grade(&self) -> RiskGrade {
        RiskGrade::from_volatility(self.volatility)
    }
}

pub fn sharpe(expected_return: f64, volatility: f64, risk_free_rate: f64) -> f64 {
    if volatility > 0.0 && volatility.is_finite() {
        (expected_return - risk_free_rate) / volatility
    } else {
        0.0
    }
}

/// Portfolio risk grade by annualized volatility band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskGrade {
    VeryLow,
    Low,
    Medium,
    MediumHigh,
    High,
    VeryHigh,
}

impl RiskGrade {
    pub fn from_volatility(volatility: f64) -> Self {
        if volatility > 0.40 {
            RiskGrade::VeryHigh
        } else if volatility > 0.25 {
            RiskGrade::High
        } else if volatility > 0.15 {
            RiskGrade::MediumHigh
        } else if volatility > 0.10 {
            RiskGrade::Medium
        } else if volatility > 0.05 {
            RiskGrade::Low
        } else {
            RiskGrade::VeryLow
        }
    }

    /// Grades an investor of `tier` is suited to hold.
    pub fn allowed_for(tier: RiskTier) -> &'static [RiskGrade] {
        use RiskGrade::*;
        match tier {
            RiskTier::Stable => &[VeryLow, Low],
            RiskTier::StableSeeking => &[VeryLow, Low, Medium],
            RiskTier::Neutral => &[Low, Medium, MediumHigh],
            RiskTier::Aggressive => &[Medium, MediumHigh, High],
            RiskTier::HighRisk => &[MediumHigh, High, VeryHigh],
        }
    }

    pub fn suits(self, tier: RiskTier) -> bool {
        Self::allowed_for(tier).contains(&self)
    }
}

impl fmt::Display for RiskGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskGrade::VeryLow => "very_low",
            RiskGrade::Low => "low",
            RiskGrade::Medium => "medium",
            RiskGrade::MediumHigh => "medium_high",
            RiskGrade::High => "high",
            RiskGrade::VeryHigh => "very_high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConcentrationWarning {
    SinglePosition { ticker: String, weight: f64 },
    TopThree { share: f64 },
}

impl fmt::Display for ConcentrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcentrationWarning::SinglePosition { ticker, weight } => write!(
                f,
                "{} holds {:.1}% (above {:.0}%)",
                ticker,
                weight * 100.0,
                SINGLE_POSITION_WARNING * 100.0
            ),
            ConcentrationWarning::TopThree { share } => write!(
                f,
                "top three holdings make up {:.1}% (above {:.0}%)",
                share * 100.0,
                TOP_THREE_WARNING * 100.0
            ),
        }
    }
}

pub fn concentration_warnings(weights: &WeightVector) -> Vec<ConcentrationWarning> {
    let mut warnings: Vec<ConcentrationWarning> = weights
        .iter()
        .filter(|(_, w)| *w > SINGLE_POSITION_WARNING)
        .map(|(t, w)| ConcentrationWarning::SinglePosition {
            ticker: t.to_string(),
            weight: w,
        })
        .collect();

    let mut sorted = weights.values();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let share: f64 = sorted.iter().take(3).sum();
    if sorted.len() > 3 && share > TOP_THREE_WARNING {
        warnings.push(ConcentrationWarning::TopThree { share });
    }
    warnings
}
