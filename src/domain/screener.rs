//! Candidate screening.
//!
//! Filters a universe against a tier's financial thresholds, scores the
//! survivors on profitability, stability and growth, and ranks them into a
//! [`CandidatePool`].

use crate::domain::error::TierfolioError;
use crate::domain::instrument::Instrument;
use crate::domain::risk_tier::{RiskTier, TierProfile};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const MIN_POOL_SIZE: usize = 2;

/// Score added per unit of sector preference boost.
pub const SECTOR_BONUS: f64 = 0.1;

const GROWTH_CLAMP: (f64, f64) = (-1.0, 3.0);

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOptions {
    pub min_pool_size: usize,
    pub max_pool_size: Option<usize>,
    pub excluded_sectors: Vec<String>,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            min_pool_size: MIN_POOL_SIZE,
            max_pool_size: None,
            excluded_sectors: Vec::new(),
        }
    }
}

/// Per-dimension scores, each normalized to [0, 1] across the survivors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningScore {
    pub profitability: f64,
    pub stability: f64,
    pub growth: f64,
    pub sector_bonus: f64,
    pub composite: f64,
}

impl ScreeningScore {
    pub fn neutral() -> Self {
        Self {
            profitability: 0.5,
            stability: 0.5,
            growth: 0.5,
            sector_bonus: 0.0,
            composite: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub instrument: Instrument,
    pub score: ScreeningScore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    Invalid(String),
    NoFinancials,
    BelowRevenue { revenue: f64, minimum: f64 },
    BelowMargin { margin: f64, minimum: f64 },
    LossMaking,
    ExcludedSector,
    BeyondPoolSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub ticker: String,
    pub reason: ExclusionReason,
}

/// Ranked candidates for one tier. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePool {
    tier: RiskTier,
    candidates: Vec<Candidate>,
    excluded: Vec<Exclusion>,
}

impl CandidatePool {
    /// Wraps instruments that were screened elsewhere, keeping their order.
    pub fn from_ranked(tier: RiskTier, instruments: Vec<Instrument>) -> Self {
        let candidates = instruments
            .into_iter()
            .map(|instrument| Candidate {
                instrument,
                score: ScreeningScore::neutral(),
            })
            .collect();
        Self {
            tier,
            candidates,
            excluded: Vec::new(),
        }
    }

    pub fn tier(&self) -> RiskTier {
        self.tier
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn excluded(&self) -> &[Exclusion] {
        &self.excluded
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .map(|c| c.instrument.ticker.as_str())
            .collect()
    }

}

pub fn screen(universe: &[Instrument], profile: &TierProfile) -> Result<CandidatePool, TierfolioError> {
    screen_with(universe, profile, &ScreenOptions::default())
}

pub fn screen_with(
    universe: &[Instrument],
    profile: &TierProfile,
    options: &ScreenOptions,
) -> Result<CandidatePool, TierfolioError> {
    let mut survivors: Vec<&Instrument> = Vec::new();
    let mut excluded = Vec::new();

    let mut seen: HashSet<&str> = HashSet::new();
    for instrument in universe {
        let verdict = if seen.insert(instrument.ticker.as_str()) {
            check_eligibility(instrument, profile, options)
        } else {
            warn!(ticker = %instrument.ticker, "duplicate ticker in universe");
            Some(ExclusionReason::Invalid("duplicate ticker".to_string()))
        };
        match verdict {
            None => survivors.push(instrument),
            Some(reason) => {
                debug!(ticker = %instrument.ticker, ?reason, "excluded by screening");
                excluded.push(Exclusion {
                    ticker: instrument.ticker.clone(),
                    reason,
                });
            }
        }
    }

    let scores = score_survivors(&survivors, profile);
    let mut candidates: Vec<Candidate> = survivors
        .into_iter()
        .zip(scores)
        .map(|(instrument, score)| Candidate {
            instrument: instrument.clone(),
            score,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .composite
            .partial_cmp(&a.score.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.instrument.ticker.cmp(&b.instrument.ticker))
    });

    if let Some(max) = options.max_pool_size {
        if candidates.len() > max {
            for dropped in candidates.drain(max..) {
                excluded.push(Exclusion {
                    ticker: dropped.instrument.ticker,
                    reason: ExclusionReason::BeyondPoolSize,
                });
            }
        }
    }

    if candidates.len() < options.min_pool_size {
        return Err(TierfolioError::InsufficientCandidates {
            tier: profile.tier,
            survivors: candidates.len(),
            minimum: options.min_pool_size,
        });
    }

    info!(
        tier = %profile.tier,
        pool_size = candidates.len(),
        excluded = excluded.len(),
        "screening complete"
    );

    Ok(CandidatePool {
        tier: profile.tier,
        candidates,
        excluded,
    })
}

fn check_eligibility(
    instrument: &Instrument,
    profile: &TierProfile,
    options: &ScreenOptions,
) -> Option<ExclusionReason> {
    if let Err(e) = instrument.validate() {
        warn!(ticker = %instrument.ticker, "invalid instrument: {e}");
        return Some(ExclusionReason::Invalid(e.to_string()));
    }

    if options
        .excluded_sectors
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&instrument.sector))
    {
        return Some(ExclusionReason::ExcludedSector);
    }

    if profile.excludes_loss_makers && instrument.is_loss_making() {
        return Some(ExclusionReason::LossMaking);
    }

    let thresholds = profile.thresholds?;

    let Some(latest) = instrument.latest() else {
        return Some(ExclusionReason::NoFinancials);
    };
    if latest.revenue < thresholds.min_revenue {
        return Some(ExclusionReason::BelowRevenue {
            revenue: latest.revenue,
            minimum: thresholds.min_revenue,
        });
    }
    if latest.operating_margin < thresholds.min_operating_margin {
        return Some(ExclusionReason::BelowMargin {
            margin: latest.operating_margin,
            minimum: thresholds.min_operating_margin,
        });
    }
    None
}

fn score_survivors(survivors: &[&Instrument], profile: &TierProfile) -> Vec<ScreeningScore> {
    let margins: Vec<f64> = survivors
        .iter()
        .map(|i| i.operating_margin().unwrap_or(0.0))
        .collect();
    let sizes: Vec<f64> = survivors
        .iter()
        .map(|i| i.revenue().unwrap_or(0.0).max(0.0).ln_1p())
        .collect();
    let steadiness: Vec<f64> = survivors
        .iter()
        .map(|i| 1.0 / (1.0 + i.margin_volatility()))
        .collect();
    let growth: Vec<f64> = survivors
        .iter()
        .map(|i| {
            i.revenue_growth()
                .unwrap_or(0.0)
                .clamp(GROWTH_CLAMP.0, GROWTH_CLAMP.1)
        })
        .collect();

    let margins = min_max(&margins);
    let sizes = min_max(&sizes);
    let steadiness = min_max(&steadiness);
    let growth = min_max(&growth);
    let w = profile.score_weights;

    survivors
        .iter()
        .enumerate()
        .map(|(i, instrument)| {
            let stability = 0.5 * sizes[i] + 0.5 * steadiness[i];
            let sector_bonus = SECTOR_BONUS * profile.sector_boost(&instrument.sector);
            let composite = w.profitability * margins[i]
                + w.stability * stability
                + w.growth * growth[i]
                + sector_bonus;
            ScreeningScore {
                profitability: margins[i],
                stability,
                growth: growth[i],
                sector_bonus,
                composite,
            }
        })
        .collect()
}

/// Min-max normalization to [0, 1]; a flat series maps to 0.5.
fn min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|&v| if range > 1e-12 { (v - min) / range } else { 0.5 })
        .collect()
}
