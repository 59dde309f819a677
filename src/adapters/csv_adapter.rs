//! CSV file universe adapter.
//!
//! Layout under the base directory:
//! - `financials.csv`: `ticker,sector,year,revenue,operating_margin,net_income`
//! - `prices/<TICKER>.csv`: `date,close`

use crate::domain::error::TierfolioError;
use crate::domain::instrument::{FinancialPeriod, Instrument, PricePoint};
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const FINANCIALS_FILE: &str = "financials.csv";
pub const PRICES_DIR: &str = "prices";

#[derive(Debug, Deserialize)]
struct FinancialRow {
    ticker: String,
    sector: String,
    year: i32,
    revenue: f64,
    operating_margin: f64,
    net_income: Option<f64>,
}

pub struct CsvUniverseAdapter {
    base_path: PathBuf,
}

impl CsvUniverseAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn financials_path(&self) -> PathBuf {
        self.base_path.join(FINANCIALS_FILE)
    }

    fn price_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(PRICES_DIR).join(format!("{}.csv", ticker))
    }

    fn read_financials(&self) -> Result<BTreeMap<String, Instrument>, TierfolioError> {
        let path = self.financials_path();
        let content = read(&path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut instruments: BTreeMap<String, Instrument> = BTreeMap::new();
        for (line, result) in rdr.deserialize::<FinancialRow>().enumerate() {
            let row = result.map_err(|e| TierfolioError::Data {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            if row.ticker.is_empty() {
                return Err(TierfolioError::Data {
                    reason: format!("{} row {}: empty ticker", path.display(), line + 1),
                });
            }
            if !is_file_safe(&row.ticker) {
                return Err(TierfolioError::Data {
                    reason: format!(
                        "{} row {}: ticker '{}' is not a plain file name",
                        path.display(),
                        line + 1,
                        row.ticker
                    ),
                });
            }

            let instrument = instruments
                .entry(row.ticker.clone())
                .or_insert_with(|| Instrument::new(&row.ticker, &row.sector));
            if !instrument.sector.eq_ignore_ascii_case(&row.sector) {
                return Err(TierfolioError::Data {
                    reason: format!(
                        "{} listed under sectors '{}' and '{}'",
                        row.ticker, instrument.sector, row.sector
                    ),
                });
            }
            if instrument.financials.iter().any(|p| p.year == row.year) {
                return Err(TierfolioError::Data {
                    reason: format!("{} has two rows for {}", row.ticker, row.year),
                });
            }
            instrument.financials.push(FinancialPeriod {
                year: row.year,
                revenue: row.revenue,
                operating_margin: row.operating_margin,
                net_income: row.net_income,
            });
        }

        for instrument in instruments.values_mut() {
            instrument.financials.sort_by_key(|p| p.year);
        }
        Ok(instruments)
    }

    /// Prices sorted by date. Duplicate dates are kept so screening can
    /// reject the instrument with a reason.
    fn read_prices(&self, ticker: &str) -> Result<Vec<PricePoint>, TierfolioError> {
        let path = self.price_path(ticker);
        if !path.exists() {
            warn!(ticker, path = %path.display(), "no price file");
            return Ok(Vec::new());
        }
        let content = read(&path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut prices = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TierfolioError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| TierfolioError::Data {
                reason: format!("{}: missing date column", path.display()),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                TierfolioError::Data {
                    reason: format!("{}: invalid date '{}': {}", path.display(), date_str, e),
                }
            })?;

            let close: f64 = record
                .get(1)
                .ok_or_else(|| TierfolioError::Data {
                    reason: format!("{}: missing close column", path.display()),
                })?
                .parse()
                .map_err(|e| TierfolioError::Data {
                    reason: format!("{}: invalid close value: {}", path.display(), e),
                })?;

            prices.push(PricePoint { date, close });
        }

        prices.sort_by_key(|p| p.date);
        debug!(ticker, observations = prices.len(), "prices loaded");
        Ok(prices)
    }
}

/// Tickers name price files, so they may not climb out of `prices/`.
fn is_file_safe(ticker: &str) -> bool {
    ticker != "." && !ticker.contains("..") && !ticker.contains(['/', '\\'])
}

fn read(path: &Path) -> Result<String, TierfolioError> {
    fs::read_to_string(path).map_err(|e| TierfolioError::Io {
        reason: format!("failed to read {}: {}", path.display(), e),
    })
}

impl UniversePort for CsvUniverseAdapter {
    fn load_universe(&self) -> Result<Vec<Instrument>, TierfolioError> {
        let instruments = self.read_financials()?;
        instruments
            .into_values()
            .map(|instrument| {
                let prices = self.read_prices(&instrument.ticker)?;
                Ok(instrument.with_prices(prices))
            })
            .collect()
    }
}
