//! Return/risk estimation.
//!
//! Expected returns and covariance are computed from price series aligned
//! on the dates every pool member shares. The covariance handed downstream
//! is always positive semi-definite: an indefinite sample matrix is shrunk
//! toward its diagonal until it is.

use crate::domain::error::TierfolioError;
use crate::domain::screener::CandidatePool;
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

const SHRINKAGE_STEPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Simple,
    Log,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Simple => write!(f, "simple"),
            ReturnKind::Log => write!(f, "log"),
        }
    }
}

impl FromStr for ReturnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ReturnKind::Simple),
            "log" => Ok(ReturnKind::Log),
            other => Err(format!("unknown return kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    /// Most recent return observations used.
    pub lookback: usize,
    pub return_kind: ReturnKind,
    pub periods_per_year: f64,
    /// Minimum overlapping price observations across the pool.
    pub min_overlap: usize,
    pub psd_tolerance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            lookback: 252,
            return_kind: ReturnKind::Simple,
            periods_per_year: TRADING_DAYS_PER_YEAR,
            min_overlap: 10,
            psd_tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationResult {
    tickers: Vec<String>,
    expected_returns: DVector<f64>,
    covariance: DMatrix<f64>,
    shrinkage: f64,
    observations: usize,
}

impl EstimationResult {
    /// Builds an estimation from externally supplied moments. The matrix must
    /// be square, symmetric and match the return vector; it is shrunk toward
    /// its diagonal if indefinite.
    pub fn new(
        tickers: Vec<String>,
        expected_returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
    ) -> Result<Self, TierfolioError> {
        let n = tickers.len();
        if expected_returns.len() != n || covariance.len() != n {
            return Err(TierfolioError::Data {
                reason: format!(
                    "estimation dimensions disagree: {} tickers, {} returns, {} covariance rows",
                    n,
                    expected_returns.len(),
                    covariance.len()
                ),
            });
        }
        if let Some(row) = covariance.iter().position(|r| r.len() != n) {
            return Err(TierfolioError::Data {
                reason: format!("covariance row {} has {} columns, expected {}", row, covariance[row].len(), n),
            });
        }
        if expected_returns.iter().any(|r| !r.is_finite())
            || covariance.iter().flatten().any(|c| !c.is_finite())
        {
            return Err(TierfolioError::Data {
                reason: "estimation contains a non-finite return or covariance entry".to_string(),
            });
        }
        let matrix = DMatrix::from_fn(n, n, |i, j| covariance[i][j]);
        for i in 0..n {
            for j in (i + 1)..n {
                if (matrix[(i, j)] - matrix[(j, i)]).abs() > 1e-9 {
                    return Err(TierfolioError::Data {
                        reason: format!("covariance not symmetric at ({}, {})", i, j),
                    });
                }
            }
        }
        let (covariance, shrinkage) = ensure_psd(matrix, EstimatorConfig::default().psd_tolerance);
        Ok(Self {
            tickers,
            expected_returns: DVector::from_vec(expected_returns),
            covariance,
            shrinkage,
            observations: 0,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn expected_returns(&self) -> &DVector<f64> {
        &self.expected_returns
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Diagonal blend weight applied to restore semi-definiteness; 0 if none.
    pub fn shrinkage(&self) -> f64 {
        self.shrinkage
    }

    /// Return observations behind the estimate; 0 when supplied externally.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Annualized volatility per instrument.
    pub fn volatilities(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.covariance[(i, i)].max(0.0).sqrt())
            .collect()
    }

    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        self.expected_returns
            .iter()
            .zip(weights)
            .map(|(mu, w)| mu * w)
            .sum()
    }

    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        (w.transpose() * &self.covariance * &w)[(0, 0)]
    }

    pub fn min_eigenvalue(&self) -> f64 {
        min_eigenvalue(&self.covariance)
    }

    /// NaN if any eigenvalue is NaN.
    pub fn max_eigenvalue(&self) -> f64 {
        if self.covariance.is_empty() {
            return 0.0;
        }
        self.covariance
            .clone()
            .symmetric_eigen()
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, |acc, x| if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.max(x) })
    }
}

pub fn estimate(
    pool: &CandidatePool,
    config: &EstimatorConfig,
) -> Result<EstimationResult, TierfolioError> {
    let instruments: Vec<_> = pool.candidates().iter().map(|c| &c.instrument).collect();
    let required = config.min_overlap.max(3);

    let dates = common_dates(pool);
    if dates.len() < required {
        return Err(TierfolioError::InsufficientHistory {
            tier: pool.tier(),
            pool_size: pool.len(),
            overlap: dates.len(),
            required,
        });
    }

    let window_start = dates.len().saturating_sub(config.lookback + 1);
    let window = &dates[window_start..];
    let t = window.len() - 1;
    let n = instruments.len();

    let mut returns = DMatrix::<f64>::zeros(t, n);
    for (j, instrument) in instruments.iter().enumerate() {
        let prices: Vec<f64> = window
            .iter()
            .map(|d| instrument.price_on(*d).unwrap_or(f64::NAN))
            .collect();
        for i in 0..t {
            returns[(i, j)] = period_return(prices[i], prices[i + 1], config.return_kind);
        }
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(TierfolioError::Data {
            reason: "non-finite return in aligned price window".to_string(),
        });
    }

    let means: Vec<f64> = (0..n).map(|j| returns.column(j).mean()).collect();
    let centered = DMatrix::from_fn(t, n, |i, j| returns[(i, j)] - means[j]);
    let sample = (centered.transpose() * &centered) * (config.periods_per_year / (t as f64 - 1.0));
    if sample.iter().any(|c| !c.is_finite()) {
        return Err(TierfolioError::Data {
            reason: "non-finite sample covariance".to_string(),
        });
    }
    let (covariance, shrinkage) = ensure_psd(sample, config.psd_tolerance);

    debug!(
        tier = %pool.tier(),
        pool_size = n,
        observations = t,
        shrinkage,
        "estimation complete"
    );

    Ok(EstimationResult {
        tickers: instruments.iter().map(|i| i.ticker.clone()).collect(),
        expected_returns: DVector::from_iterator(
            n,
            means.iter().map(|m| m * config.periods_per_year),
        ),
        covariance,
        shrinkage,
        observations: t,
    })
}

fn common_dates(pool: &CandidatePool) -> Vec<NaiveDate> {
    let mut candidates = pool.candidates().iter();
    let Some(first) = candidates.next() else {
        return Vec::new();
    };
    let mut dates: BTreeSet<NaiveDate> = first.instrument.prices.iter().map(|p| p.date).collect();
    for candidate in candidates {
        dates.retain(|d| candidate.instrument.price_on(*d).is_some());
    }
    dates.into_iter().collect()
}

fn period_return(prev: f64, curr: f64, kind: ReturnKind) -> f64 {
    match kind {
        ReturnKind::Simple => curr / prev - 1.0,
        ReturnKind::Log => (curr / prev).ln(),
    }
}

fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    matrix
        .clone()
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, |acc, x| if acc.is_nan() || x.is_nan() { f64::NAN } else { acc.min(x) })
}

/// Blends `matrix` toward its diagonal in fixed steps until the smallest
/// eigenvalue clears `-tolerance` (scaled by the trace). Returns the matrix
/// and the blend weight used.
fn ensure_psd(matrix: DMatrix<f64>, tolerance: f64) -> (DMatrix<f64>, f64) {
    let scale = matrix.trace().abs().max(1.0);
    let floor = -tolerance * scale;
    let min_eig = min_eigenvalue(&matrix);
    if min_eig.is_nan() || min_eig >= floor {
        return (matrix, 0.0);
    }

    let diagonal = DMatrix::from_diagonal(&matrix.diagonal());
    for step in 1..=SHRINKAGE_STEPS {
        let delta = step as f64 / SHRINKAGE_STEPS as f64;
        let blended = &matrix * (1.0 - delta) + &diagonal * delta;
        if min_eigenvalue(&blended) >= floor {
            warn!(shrinkage = delta, "covariance indefinite; shrunk toward diagonal");
            return (blended, delta);
        }
    }
    (diagonal, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::{Instrument, PricePoint};
    use crate::domain::risk_tier::RiskTier;
    use approx::assert_relative_eq;

    fn series(start: NaiveDate, closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                close,
            })
            .collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn pool_of(instruments: Vec<Instrument>) -> CandidatePool {
        CandidatePool::from_ranked(RiskTier::Neutral, instruments)
    }

    fn alternating(n: usize, base: f64, up: f64, down: f64) -> Vec<f64> {
        let mut closes = vec![base];
        for i in 1..n {
            let prev = closes[i - 1];
            closes.push(if i % 2 == 1 { prev * (1.0 + up) } else { prev * (1.0 - down) });
        }
        closes
    }

    #[test]
    fn expected_return_is_annualized_mean() {
        let closes = alternating(21, 100.0, 0.02, 0.01);
        let a = Instrument::new("A", "it").with_prices(series(day(1), &closes));
        let b = Instrument::new("B", "it").with_prices(series(day(1), &alternating(21, 50.0, 0.01, 0.01)));
        let result = estimate(&pool_of(vec![a, b]), &EstimatorConfig::default()).unwrap();

        let mean = (0.02 - 0.01) / 2.0;
        assert_relative_eq!(result.expected_returns()[0], mean * 252.0, epsilon = 1e-9);
        assert_eq!(result.observations(), 20);
        assert_eq!(result.tickers(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn covariance_is_symmetric_and_annualized() {
        let a = Instrument::new("A", "it").with_prices(series(day(1), &alternating(21, 100.0, 0.02, 0.01)));
        let b = Instrument::new("B", "it").with_prices(series(day(1), &alternating(21, 50.0, 0.01, 0.03)));
        let result = estimate(&pool_of(vec![a, b]), &EstimatorConfig::default()).unwrap();
        let cov = result.covariance();
        assert_relative_eq!(cov[(0, 1)], cov[(1, 0)], epsilon = 1e-15);
        // returns alternate +0.02 / -0.01: sample variance = 0.015^2 * 20/19
        let expected = 0.015f64.powi(2) * 20.0 / 19.0 * 252.0;
        assert_relative_eq!(cov[(0, 0)], expected, epsilon = 1e-9);
        assert!(result.min_eigenvalue() >= -1e-12);
        assert_eq!(result.shrinkage(), 0.0);
    }

    #[test]
    fn log_returns_supported() {
        let closes = vec![100.0, 110.0, 121.0, 133.1];
        let a = Instrument::new("A", "it").with_prices(series(day(1), &closes));
        let b = Instrument::new("B", "it").with_prices(series(day(1), &[10.0, 11.0, 10.0, 11.0]));
        let config = EstimatorConfig {
            return_kind: ReturnKind::Log,
            min_overlap: 3,
            ..EstimatorConfig::default()
        };
        let result = estimate(&pool_of(vec![a, b]), &config).unwrap();
        assert_relative_eq!(result.expected_returns()[0], 1.1f64.ln() * 252.0, epsilon = 1e-9);
    }

    #[test]
    fn only_overlapping_dates_are_used() {
        let a = Instrument::new("A", "it").with_prices(series(day(1), &alternating(20, 100.0, 0.01, 0.01)));
        let b = Instrument::new("B", "it").with_prices(series(day(6), &alternating(20, 100.0, 0.01, 0.01)));
        let result = estimate(&pool_of(vec![a, b]), &EstimatorConfig::default()).unwrap();
        assert_eq!(result.observations(), 14);
    }

    #[test]
    fn lookback_limits_window() {
        let a = Instrument::new("A", "it").with_prices(series(day(1), &alternating(30, 100.0, 0.01, 0.01)));
        let b = Instrument::new("B", "it").with_prices(series(day(1), &alternating(30, 100.0, 0.02, 0.01)));
        let config = EstimatorConfig {
            lookback: 12,
            ..EstimatorConfig::default()
        };
        let result = estimate(&pool_of(vec![a, b]), &config).unwrap();
        assert_eq!(result.observations(), 12);
    }

    #[test]
    fn insufficient_overlap_fails() {
        let a = Instrument::new("A", "it").with_prices(series(day(1), &alternating(10, 100.0, 0.01, 0.01)));
        let b = Instrument::new("B", "it").with_prices(series(day(8), &alternating(10, 100.0, 0.01, 0.01)));
        let err = estimate(&pool_of(vec![a, b]), &EstimatorConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            TierfolioError::InsufficientHistory { overlap: 3, required: 10, pool_size: 2, .. }
        ));
    }

    #[test]
    fn indefinite_input_is_shrunk() {
        let result = EstimationResult::new(
            vec!["A".into(), "B".into()],
            vec![0.1, 0.05],
            vec![vec![0.04, 0.05], vec![0.05, 0.02]],
        )
        .unwrap();
        assert_relative_eq!(result.shrinkage(), 0.5, epsilon = 1e-12);
        assert!(result.min_eigenvalue() >= 0.0);
        assert_relative_eq!(result.covariance()[(0, 0)], 0.04, epsilon = 1e-12);
        assert_relative_eq!(result.covariance()[(0, 1)], 0.025, epsilon = 1e-12);
    }

    #[test]
    fn positive_definite_input_is_untouched() {
        let result = EstimationResult::new(
            vec!["A".into(), "B".into()],
            vec![0.1, 0.05],
            vec![vec![0.04, 0.01], vec![0.01, 0.02]],
        )
        .unwrap();
        assert_eq!(result.shrinkage(), 0.0);
        assert_relative_eq!(result.volatilities()[0], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn asymmetric_input_rejected() {
        let err = EstimationResult::new(
            vec!["A".into(), "B".into()],
            vec![0.1, 0.05],
            vec![vec![0.04, 0.01], vec![0.02, 0.02]],
        )
        .unwrap_err();
        assert!(matches!(err, TierfolioError::Data { .. }));
    }

    #[test]
    fn non_finite_moments_rejected() {
        let nan_cov = EstimationResult::new(
            vec!["A".into(), "B".into()],
            vec![0.1, f64::NAN],
            vec![vec![0.04, f64::NAN], vec![f64::NAN, 0.02]],
        )
        .unwrap_err();
        assert!(matches!(nan_cov, TierfolioError::Data { ref reason } if reason.contains("non-finite")));

        let infinite_mu = EstimationResult::new(
            vec!["A".into(), "B".into()],
            vec![f64::INFINITY, 0.05],
            vec![vec![0.04, 0.01], vec![0.01, 0.02]],
        );
        assert!(infinite_mu.is_err());
    }

    #[test]
    fn portfolio_moments() {
        let result = EstimationResult::new(
            vec!["A".into(), "B".into()],
            vec![0.1, 0.05],
            vec![vec![0.04, 0.01], vec![0.01, 0.02]],
        )
        .unwrap();
        let w = [0.5, 0.5];
        assert_relative_eq!(result.portfolio_return(&w), 0.075, epsilon = 1e-12);
        // 0.25*0.04 + 2*0.25*0.01 + 0.25*0.02
        assert_relative_eq!(result.portfolio_variance(&w), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn return_kind_parse() {
        assert_eq!("LOG".parse::<ReturnKind>(), Ok(ReturnKind::Log));
        assert!("weird".parse::<ReturnKind>().is_err());
    }
}
