//! Configuration validation.
//!
//! Reads every engine setting through `ConfigPort`, rejects values outside
//! their domain, and builds the `EngineConfig` a run uses. Missing keys take
//! their defaults; malformed ones are errors rather than silent defaults.

use crate::domain::engine::EngineConfig;
use crate::domain::error::TierfolioError;
use crate::domain::estimator::ReturnKind;
use crate::domain::risk_tier::{RiskTier, RiskTierTable};
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

/// Every section a run depends on, read and checked once.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub data_path: PathBuf,
    pub default_tier: Option<RiskTier>,
    pub engine: EngineConfig,
    pub table: RiskTierTable,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<ValidatedConfig, TierfolioError> {
    Ok(ValidatedConfig {
        data_path: data_path(config)?,
        default_tier: default_tier(config)?,
        engine: load_engine_config(config)?,
        table: RiskTierTable::from_config(config)?,
    })
}

pub fn data_path(config: &dyn ConfigPort) -> Result<PathBuf, TierfolioError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(PathBuf::from(s.trim())),
        _ => Err(TierfolioError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

/// `[engine] tier`, used when the command line names no tier.
pub fn default_tier(config: &dyn ConfigPort) -> Result<Option<RiskTier>, TierfolioError> {
    match config.get_string("engine", "tier") {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .parse::<RiskTier>()
            .map(Some)
            .map_err(|reason| invalid("engine", "tier", &reason)),
    }
}

pub fn load_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, TierfolioError> {
    let mut engine = EngineConfig::default();

    if let Some(rate) = number(config, "engine", "risk_free_rate")? {
        if !(0.0..1.0).contains(&rate) {
            return Err(invalid("engine", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
        }
        engine.risk_free_rate = rate;
    }

    let est = &mut engine.estimator;
    if let Some(lookback) = integer(config, "estimator", "lookback")? {
        if lookback < 2 {
            return Err(invalid("estimator", "lookback", "lookback must be at least 2"));
        }
        est.lookback = lookback as usize;
    }
    if let Some(kind) = config.get_string("estimator", "return_kind") {
        est.return_kind = kind
            .parse::<ReturnKind>()
            .map_err(|reason| invalid("estimator", "return_kind", &reason))?;
    }
    if let Some(periods) = number(config, "estimator", "periods_per_year")? {
        if periods <= 0.0 {
            return Err(invalid("estimator", "periods_per_year", "periods_per_year must be positive"));
        }
        est.periods_per_year = periods;
    }
    if let Some(overlap) = integer(config, "estimator", "min_overlap")? {
        if overlap < 2 {
            return Err(invalid("estimator", "min_overlap", "min_overlap must be at least 2"));
        }
        est.min_overlap = overlap as usize;
    }

    let opt = &mut engine.optimizer;
    if let Some(lambda) = number(config, "optimizer", "risk_aversion")? {
        if lambda <= 0.0 {
            return Err(invalid("optimizer", "risk_aversion", "risk_aversion must be positive"));
        }
        opt.risk_aversion = lambda;
    }
    if let Some(blend) = number(config, "optimizer", "practical_blend")? {
        if !(0.0..=1.0).contains(&blend) {
            return Err(invalid("optimizer", "practical_blend", "practical_blend must be between 0 and 1"));
        }
        opt.practical_blend = blend;
    }
    if let Some(band) = number(config, "optimizer", "conservative_band")? {
        if !(0.0..=0.5).contains(&band) {
            return Err(invalid(
                "optimizer",
                "conservative_band",
                "conservative_band must be between 0 and 0.5",
            ));
        }
        opt.conservative_band = band;
    }
    if let Some(iterations) = integer(config, "optimizer", "max_iterations")? {
        if iterations < 1 {
            return Err(invalid("optimizer", "max_iterations", "max_iterations must be at least 1"));
        }
        opt.max_iterations = iterations as usize;
    }
    if let Some(tolerance) = number(config, "optimizer", "tolerance")? {
        if !(tolerance > 0.0 && tolerance < 1.0) {
            return Err(invalid("optimizer", "tolerance", "tolerance must be in (0, 1)"));
        }
        opt.tolerance = tolerance;
    }
    if let Some(cutoff) = number(config, "optimizer", "weight_cutoff")? {
        if !(0.0..1.0).contains(&cutoff) {
            return Err(invalid("optimizer", "weight_cutoff", "weight_cutoff must be in [0, 1)"));
        }
        opt.weight_cutoff = cutoff;
    }
    if let Some(ms) = integer(config, "optimizer", "timeout_ms")? {
        if ms < 0 {
            return Err(invalid("optimizer", "timeout_ms", "timeout_ms must be non-negative"));
        }
        engine.timeout = Some(Duration::from_millis(ms as u64));
    }

    let screening = &mut engine.screening;
    if let Some(min) = integer(config, "screening", "min_pool_size")? {
        if min < 1 {
            return Err(invalid("screening", "min_pool_size", "min_pool_size must be at least 1"));
        }
        screening.min_pool_size = min as usize;
    }
    if let Some(max) = integer(config, "screening", "max_pool_size")? {
        if max < screening.min_pool_size as i64 {
            return Err(invalid(
                "screening",
                "max_pool_size",
                "max_pool_size must not be below min_pool_size",
            ));
        }
        screening.max_pool_size = Some(max as usize);
    }
    if let Some(list) = config.get_string("screening", "excluded_sectors") {
        screening.excluded_sectors = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    Ok(engine)
}

fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TierfolioError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("expected a number, got '{}'", raw.trim()))),
        },
    }
}

fn integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<i64>, TierfolioError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("expected an integer, got '{}'", raw.trim()))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> TierfolioError {
    TierfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
