#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use tierfolio::domain::error::TierfolioError;
use tierfolio::domain::instrument::{FinancialPeriod, Instrument, PricePoint};
use tierfolio::domain::risk_tier::TierProfile;
use tierfolio::domain::strategy::Strategy;
use tierfolio::domain::weights::StrategyResult;
use tierfolio::ports::report_port::ReportPort;
use tierfolio::ports::universe_port::UniversePort;

pub struct MockUniversePort {
    pub instruments: Vec<Instrument>,
    pub error: Option<String>,
}

impl MockUniversePort {
    pub fn new() -> Self {
        Self {
            instruments: Vec::new(),
            error: None,
        }
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instruments.push(instrument);
        self
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments.extend(instruments);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl UniversePort for MockUniversePort {
    fn load_universe(&self) -> Result<Vec<Instrument>, TierfolioError> {
        if let Some(reason) = &self.error {
            return Err(TierfolioError::Data {
                reason: reason.clone(),
            });
        }
        let mut instruments = self.instruments.clone();
        instruments.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(instruments)
    }
}

/// Records what would have been written instead of touching disk.
pub struct MockReportPort {
    pub written: RefCell<Vec<(Vec<Strategy>, String)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            written: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write(
        &self,
        results: &[StrategyResult],
        _profile: &TierProfile,
        output_path: &str,
    ) -> Result<(), TierfolioError> {
        self.written.borrow_mut().push((
            results.iter().map(|r| r.strategy).collect(),
            output_path.to_string(),
        ));
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Deterministic random walk: each day moves by `drift` plus a uniform
/// shock of width `swing`.
pub fn lcg_prices(seed: u64, days: usize, drift: f64, swing: f64) -> Vec<PricePoint> {
    let start = date(2024, 1, 1);
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    let mut close = 100.0;
    (0..days)
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
        .collect()
}

pub fn make_instrument(ticker: &str, sector: &str, revenue: f64, margin: f64) -> Instrument {
    Instrument::new(ticker, sector).with_period(FinancialPeriod {
        year: 2023,
        revenue,
        operating_margin: margin,
        net_income: Some(revenue * margin / 100.0),
    })
}

pub fn priced_instrument(
    ticker: &str,
    sector: &str,
    revenue: f64,
    margin: f64,
    seed: u64,
) -> Instrument {
    let drift = 0.0005 * ((seed % 5) as f64 + 1.0);
    let swing = 0.02 + 0.005 * (seed % 7) as f64;
    make_instrument(ticker, sector, revenue, margin).with_prices(lcg_prices(seed, 90, drift, swing))
}

/// `n` profitable, well-priced instruments that pass every tier's screen.
pub fn synthetic_universe(n: usize, sector: &str) -> Vec<Instrument> {
    (0..n)
        .map(|i| {
            priced_instrument(
                &format!("{:06}", i + 1),
                sector,
                1000.0 + 250.0 * i as f64,
                6.0 + (i % 4) as f64,
                i as u64 + 1,
            )
        })
        .collect()
}
