//! CSV report adapter implementing `ReportPort`.
//!
//! Writes one row per (strategy, ticker) to the output path and the
//! rationale tags to a sibling `<stem>_rationale.csv`.

use crate::domain::error::TierfolioError;
use crate::domain::risk_tier::TierProfile;
use crate::domain::weights::StrategyResult;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct WeightRow<'a> {
    rank: usize,
    tier: &'a str,
    strategy: String,
    score: f64,
    ticker: &'a str,
    weight: f64,
    portfolio_weight: f64,
}

#[derive(Debug, Serialize)]
struct RationaleRow<'a> {
    strategy: String,
    kind: String,
    ticker: &'a str,
    before: f64,
    after: f64,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `out/report.csv` -> `out/report_rationale.csv`.
    pub fn rationale_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{}_rationale.csv", stem))
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn csv_error(path: &Path, e: impl std::fmt::Display) -> TierfolioError {
    TierfolioError::Io {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        results: &[StrategyResult],
        profile: &TierProfile,
        output_path: &str,
    ) -> Result<(), TierfolioError> {
        let path = Path::new(output_path);
        let tier = profile.tier.name();

        let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
        for (rank, result) in results.iter().enumerate() {
            for (ticker, weight) in result.weights.iter() {
                writer
                    .serialize(WeightRow {
                        rank: rank + 1,
                        tier,
                        strategy: result.strategy.to_string(),
                        score: result.score,
                        ticker,
                        weight,
                        portfolio_weight: weight * profile.allocation.equity,
                    })
                    .map_err(|e| csv_error(path, e))?;
            }
        }
        writer.flush().map_err(|e| csv_error(path, e))?;

        let rationale_path = Self::rationale_path(path);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&rationale_path)
            .map_err(|e| csv_error(&rationale_path, e))?;
        // Header is written even when no weight was altered.
        writer
            .write_record(["strategy", "kind", "ticker", "before", "after"])
            .map_err(|e| csv_error(&rationale_path, e))?;
        for result in results {
            for tag in &result.rationale {
                writer
                    .serialize(RationaleRow {
                        strategy: result.strategy.to_string(),
                        kind: tag.kind.to_string(),
                        ticker: &tag.ticker,
                        before: tag.before,
                        after: tag.after,
                    })
                    .map_err(|e| csv_error(&rationale_path, e))?;
            }
        }
        writer.flush().map_err(|e| csv_error(&rationale_path, e))?;
        Ok(())
    }
}
