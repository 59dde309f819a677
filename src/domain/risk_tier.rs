//! Risk tier table.
//!
//! Five ordered investor risk tiers, each mapped to allocation bounds and
//! screening thresholds. The table is immutable once built and is handed to
//! the engine explicitly as `&TierProfile`.

use crate::domain::error::TierfolioError;
use crate::ports::config_port::ConfigPort;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RiskTier {
    Stable,
    StableSeeking,
    Neutral,
    Aggressive,
    HighRisk,
}

impl RiskTier {
    pub const ALL: [RiskTier; 5] = [
        RiskTier::Stable,
        RiskTier::StableSeeking,
        RiskTier::Neutral,
        RiskTier::Aggressive,
        RiskTier::HighRisk,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RiskTier::Stable => "stable",
            RiskTier::StableSeeking => "stable_seeking",
            RiskTier::Neutral => "neutral",
            RiskTier::Aggressive => "aggressive",
            RiskTier::HighRisk => "high_risk",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RiskTier {
    type Err = String;

    /// Accepts the snake_case names, hyphenated forms, and the Korean tier
    /// labels used by upstream classifiers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "stable" | "안정형" => Ok(RiskTier::Stable),
            "stable_seeking" | "stableseeking" | "안정추구형" => Ok(RiskTier::StableSeeking),
            "neutral" | "위험중립형" => Ok(RiskTier::Neutral),
            "aggressive" | "적극투자형" => Ok(RiskTier::Aggressive),
            "high_risk" | "highrisk" | "공격투자형" => Ok(RiskTier::HighRisk),
            _ => Err(format!("unknown risk tier '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityShareRange {
    pub min: f64,
    pub max: f64,
}

impl EquityShareRange {
    pub fn contains(&self, share: f64) -> bool {
        share >= self.min && share <= self.max
    }
}

/// Whole-portfolio asset mix targets, as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationGuideline {
    pub equity: f64,
    pub bonds: f64,
    pub cash: f64,
}

/// Revenue in 억원 (10^8 KRW), operating margin in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningThresholds {
    pub min_revenue: f64,
    pub min_operating_margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorPreference {
    pub sector: String,
    pub boost: f64,
}

/// Relative weight of each screening dimension. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub profitability: f64,
    pub stability: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierProfile {
    pub tier: RiskTier,
    pub equity_share: EquityShareRange,
    pub allocation: AllocationGuideline,
    pub single_position_cap: f64,
    pub preferred_sectors: Vec<SectorPreference>,
    /// `None` means every instrument passes the financial filter.
    pub thresholds: Option<ScreeningThresholds>,
    pub excludes_loss_makers: bool,
    pub score_weights: ScoreWeights,
}

impl TierProfile {
    /// Boost for `sector`, or 0 when the sector is not preferred.
    pub fn sector_boost(&self, sector: &str) -> f64 {
        self.preferred_sectors
            .iter()
            .find(|p| p.sector.eq_ignore_ascii_case(sector))
            .map(|p| p.boost)
            .unwrap_or(0.0)
    }
}

fn sectors(entries: &[(&str, f64)]) -> Vec<SectorPreference> {
    entries
        .iter()
        .map(|&(sector, boost)| SectorPreference {
            sector: sector.to_string(),
            boost,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskTierTable {
    profiles: Vec<TierProfile>,
}

impl RiskTierTable {
    pub fn standard() -> Self {
        let profiles = vec![
            TierProfile {
                tier: RiskTier::Stable,
                equity_share: EquityShareRange { min: 0.0, max: 0.10 },
                allocation: AllocationGuideline {
                    equity: 0.05,
                    bonds: 0.85,
                    cash: 0.10,
                },
                single_position_cap: 0.05,
                preferred_sectors: sectors(&[
                    ("utilities", 1.0),
                    ("telecom", 1.0),
                    ("consumer_staples", 0.8),
                ]),
                thresholds: Some(ScreeningThresholds {
                    min_revenue: 500.0,
                    min_operating_margin: 5.0,
                }),
                excludes_loss_makers: true,
                score_weights: ScoreWeights {
                    profitability: 0.3,
                    stability: 0.6,
                    growth: 0.1,
                },
            },
            TierProfile {
                tier: RiskTier::StableSeeking,
                equity_share: EquityShareRange { min: 0.10, max: 0.30 },
                allocation: AllocationGuideline {
                    equity: 0.20,
                    bonds: 0.70,
                    cash: 0.10,
                },
                single_position_cap: 0.10,
                preferred_sectors: sectors(&[
                    ("financials", 1.0),
                    ("insurance", 1.0),
                    ("electronics", 0.7),
                    ("chemicals", 0.6),
                ]),
                thresholds: Some(ScreeningThresholds {
                    min_revenue: 300.0,
                    min_operating_margin: 3.0,
                }),
                excludes_loss_makers: false,
                score_weights: ScoreWeights {
                    profitability: 0.35,
                    stability: 0.5,
                    growth: 0.15,
                },
            },
            TierProfile {
                tier: RiskTier::Neutral,
                equity_share: EquityShareRange { min: 0.35, max: 0.55 },
                allocation: AllocationGuideline {
                    equity: 0.45,
                    bonds: 0.45,
                    cash: 0.10,
                },
                single_position_cap: 0.15,
                preferred_sectors: sectors(&[
                    ("electronics", 1.0),
                    ("chemicals", 0.8),
                    ("automotive", 0.8),
                    ("machinery", 0.6),
                    ("construction", 0.5),
                ]),
                thresholds: Some(ScreeningThresholds {
                    min_revenue: 100.0,
                    min_operating_margin: 0.0,
                }),
                excludes_loss_makers: false,
                score_weights: ScoreWeights {
                    profitability: 0.4,
                    stability: 0.3,
                    growth: 0.3,
                },
            },
            TierProfile {
                tier: RiskTier::Aggressive,
                equity_share: EquityShareRange { min: 0.60, max: 0.80 },
                allocation: AllocationGuideline {
                    equity: 0.70,
                    bonds: 0.20,
                    cash: 0.10,
                },
                single_position_cap: 0.20,
                preferred_sectors: sectors(&[
                    ("semiconductors", 1.0),
                    ("batteries", 1.0),
                    ("biotech", 0.8),
                    ("it", 0.8),
                    ("gaming", 0.6),
                ]),
                thresholds: Some(ScreeningThresholds {
                    min_revenue: 10.0,
                    min_operating_margin: -10.0,
                }),
                excludes_loss_makers: false,
                score_weights: ScoreWeights {
                    profitability: 0.3,
                    stability: 0.2,
                    growth: 0.5,
                },
            },
            TierProfile {
                tier: RiskTier::HighRisk,
                equity_share: EquityShareRange { min: 0.80, max: 1.0 },
                allocation: AllocationGuideline {
                    equity: 0.90,
                    bonds: 0.10,
                    cash: 0.0,
                },
                single_position_cap: 0.25,
                preferred_sectors: sectors(&[
                    ("semiconductors", 1.0),
                    ("biotech", 1.0),
                    ("gaming", 0.8),
                    ("internet", 0.8),
                    ("renewables", 0.8),
                ]),
                thresholds: None,
                excludes_loss_makers: false,
                score_weights: ScoreWeights {
                    profitability: 0.2,
                    stability: 0.1,
                    growth: 0.7,
                },
            },
        ];
        Self { profiles }
    }

    pub fn get(&self, tier: RiskTier) -> &TierProfile {
        &self.profiles[tier.index()]
    }

    pub fn profiles(&self) -> &[TierProfile] {
        &self.profiles
    }

    /// Standard table with `[tier.<name>]` overrides applied, then validated.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TierfolioError> {
        let mut table = Self::standard();
        for profile in table.profiles.iter_mut() {
            let section = format!("tier.{}", profile.tier);
            if !config.has_section(&section) {
                continue;
            }
            if let Some(cap) = read_override(config, &section, "single_position_cap")? {
                profile.single_position_cap = cap;
            }
            let min_revenue = read_override(config, &section, "min_revenue")?;
            let min_margin = read_override(config, &section, "min_operating_margin")?;
            if min_revenue.is_some() || min_margin.is_some() {
                let base = profile.thresholds.unwrap_or(ScreeningThresholds {
                    min_revenue: f64::NEG_INFINITY,
                    min_operating_margin: f64::NEG_INFINITY,
                });
                profile.thresholds = Some(ScreeningThresholds {
                    min_revenue: min_revenue.unwrap_or(base.min_revenue),
                    min_operating_margin: min_margin.unwrap_or(base.min_operating_margin),
                });
            }
        }
        table.validate()?;
        Ok(table)
    }

    /// Checks caps are in (0, 1] and strictly increase with tier index, and
    /// that screening thresholds strictly relax with tier index.
    pub fn validate(&self) -> Result<(), TierfolioError> {
        for profile in &self.profiles {
            let cap = profile.single_position_cap;
            if !(cap > 0.0 && cap <= 1.0) {
                return Err(invalid_tier(
                    profile.tier,
                    "single_position_cap",
                    "single_position_cap must be in (0, 1]",
                ));
            }
        }

        for pair in self.profiles.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);
            if higher.single_position_cap <= lower.single_position_cap {
                return Err(invalid_tier(
                    higher.tier,
                    "single_position_cap",
                    &format!(
                        "single_position_cap must exceed {} cap of {}",
                        lower.tier, lower.single_position_cap
                    ),
                ));
            }
            match (lower.thresholds, higher.thresholds) {
                (None, Some(_)) => {
                    return Err(invalid_tier(
                        higher.tier,
                        "min_revenue",
                        &format!("thresholds cannot tighten after unbounded {}", lower.tier),
                    ));
                }
                (Some(lo), Some(hi)) => {
                    if hi.min_revenue >= lo.min_revenue {
                        return Err(invalid_tier(
                            higher.tier,
                            "min_revenue",
                            &format!("min_revenue must be below {} value", lower.tier),
                        ));
                    }
                    if hi.min_operating_margin >= lo.min_operating_margin {
                        return Err(invalid_tier(
                            higher.tier,
                            "min_operating_margin",
                            &format!("min_operating_margin must be below {} value", lower.tier),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Process-wide standard table, built on first use.
pub fn standard_table() -> &'static RiskTierTable {
    static TABLE: OnceLock<RiskTierTable> = OnceLock::new();
    TABLE.get_or_init(RiskTierTable::standard)
}

fn read_override(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, TierfolioError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| TierfolioError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("expected a number, got '{}'", raw.trim()),
            }),
    }
}

fn invalid_tier(tier: RiskTier, key: &str, reason: &str) -> TierfolioError {
    TierfolioError::ConfigInvalid {
        section: format!("tier.{}", tier),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
