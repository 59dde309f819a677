//! Instrument universe access port trait.

use crate::domain::error::TierfolioError;
use crate::domain::instrument::Instrument;

pub trait UniversePort {
    /// Every instrument with financials and prices attached, ordered by ticker.
    fn load_universe(&self) -> Result<Vec<Instrument>, TierfolioError>;

    /// Instruments restricted to `tickers`. Unknown tickers are an error.
    fn load_subset(&self, tickers: &[String]) -> Result<Vec<Instrument>, TierfolioError> {
        let universe = self.load_universe()?;
        tickers
            .iter()
            .map(|t| {
                universe
                    .iter()
                    .find(|i| &i.ticker == t)
                    .cloned()
                    .ok_or_else(|| TierfolioError::Data {
                        reason: format!("unknown ticker {}", t),
                    })
            })
            .collect()
    }
}
