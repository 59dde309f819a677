//! Weight vectors, rationale tags and per-strategy results.

use crate::domain::metrics::PortfolioStats;
use crate::domain::strategy::Strategy;
use std::fmt;

/// Interop tolerance on the unit-sum invariant.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Ticker-to-fraction mapping kept in candidate pool order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    entries: Vec<(String, f64)>,
}

impl WeightVector {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn from_parts(tickers: &[&str], weights: &[f64]) -> Self {
        Self {
            entries: tickers
                .iter()
                .zip(weights)
                .map(|(t, w)| (t.to_string(), *w))
                .collect(),
        }
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.entries.iter().find(|(t, _)| t == ticker).map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.entries.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, w)| *w).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn max_weight(&self) -> f64 {
        self.entries.iter().map(|(_, w)| *w).fold(0.0, f64::max)
    }

    /// True when every weight is non-negative and the sum is 1 within
    /// [`SUM_TOLERANCE`].
    pub fn is_normalized(&self) -> bool {
        self.entries.iter().all(|(_, w)| *w >= 0.0) && (self.sum() - 1.0).abs() <= SUM_TOLERANCE
    }

    /// Every weight multiplied by `factor`, e.g. projecting equity weights
    /// onto the whole portfolio via the tier's equity allocation.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(t, w)| (t.clone(), w * factor))
                .collect(),
        }
    }

    /// Zeroes weights below `cutoff`, renormalizes and rounds to four
    /// decimals. Returns the vector unchanged when nothing would survive.
    pub fn cleaned(&self, cutoff: f64) -> Self {
        let kept: Vec<f64> = self
            .entries
            .iter()
            .map(|(_, w)| if *w < cutoff { 0.0 } else { *w })
            .collect();
        let total: f64 = kept.iter().sum();
        if total <= 0.0 {
            return self.clone();
        }
        Self {
            entries: self
                .entries
                .iter()
                .zip(kept)
                .map(|((t, _), w)| (t.clone(), round4(w / total)))
                .collect(),
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Clipped down to the single-position cap.
    Capped,
    /// Received redistributed excess.
    Raised,
    /// Changed by renormalization or negative clamping only.
    Normalized,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Capped => write!(f, "capped"),
            TagKind::Raised => write!(f, "raised"),
            TagKind::Normalized => write!(f, "normalized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RationaleTag {
    pub kind: TagKind,
    pub ticker: String,
    pub before: f64,
    pub after: f64,
}

impl fmt::Display for RationaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {:.1}%\u{2192}{:.1}%",
            self.kind,
            self.ticker,
            self.before * 100.0,
            self.after * 100.0
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub strategy: Strategy,
    pub weights: WeightVector,
    /// Expected Sharpe ratio under the shared estimation.
    pub score: f64,
    pub stats: PortfolioStats,
    pub rationale: Vec<RationaleTag>,
}
