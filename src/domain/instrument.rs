//! Instrument records consumed by the screener and estimator.

use crate::domain::error::TierfolioError;
use chrono::NaiveDate;

/// One fiscal period of financial statements. Revenue in 억원, margin in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialPeriod {
    pub year: i32,
    pub revenue: f64,
    pub operating_margin: f64,
    pub net_income: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub ticker: String,
    pub sector: String,
    /// Chronological, latest period last.
    pub financials: Vec<FinancialPeriod>,
    /// Chronological, no duplicate dates.
    pub prices: Vec<PricePoint>,
}

impl Instrument {
    pub fn new(ticker: &str, sector: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            sector: sector.to_string(),
            financials: Vec::new(),
            prices: Vec::new(),
        }
    }

    pub fn with_period(mut self, period: FinancialPeriod) -> Self {
        self.financials.push(period);
        self.financials.sort_by_key(|p| p.year);
        self
    }

    pub fn with_prices(mut self, prices: Vec<PricePoint>) -> Self {
        self.prices = prices;
        self
    }

    pub fn latest(&self) -> Option<&FinancialPeriod> {
        self.financials.last()
    }

    pub fn revenue(&self) -> Option<f64> {
        self.latest().map(|p| p.revenue)
    }

    pub fn operating_margin(&self) -> Option<f64> {
        self.latest().map(|p| p.operating_margin)
    }

    /// Net loss in the latest period. Falls back to a negative operating
    /// margin when net income was not reported.
    pub fn is_loss_making(&self) -> bool {
        match self.latest() {
            Some(p) => match p.net_income {
                Some(ni) => ni < 0.0,
                None => p.operating_margin < 0.0,
            },
            None => false,
        }
    }

    /// Latest period-over-period revenue change as a fraction.
    pub fn revenue_growth(&self) -> Option<f64> {
        let n = self.financials.len();
        if n < 2 {
            return None;
        }
        let prev = self.financials[n - 2].revenue;
        let curr = self.financials[n - 1].revenue;
        if prev > 0.0 {
            Some(curr / prev - 1.0)
        } else {
            None
        }
    }

    /// Population standard deviation of operating margin across periods.
    pub fn margin_volatility(&self) -> f64 {
        let n = self.financials.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.financials.iter().map(|p| p.operating_margin).sum::<f64>() / n as f64;
        let var = self
            .financials
            .iter()
            .map(|p| (p.operating_margin - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        var.sqrt()
    }

    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.prices
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.prices[i].close)
    }

    /// Checks the price series is chronological with positive closes and no
    /// duplicate dates, and that financial values are finite.
    pub fn validate(&self) -> Result<(), TierfolioError> {
        if self.ticker.trim().is_empty() {
            return Err(self.invalid("empty ticker"));
        }
        for pair in self.prices.windows(2) {
            if pair[1].date == pair[0].date {
                return Err(self.invalid(&format!("duplicate price date {}", pair[1].date)));
            }
            if pair[1].date < pair[0].date {
                return Err(self.invalid(&format!(
                    "prices not chronological at {}",
                    pair[1].date
                )));
            }
        }
        if let Some(p) = self.prices.iter().find(|p| !(p.close > 0.0) || !p.close.is_finite()) {
            return Err(self.invalid(&format!("non-positive close on {}", p.date)));
        }
        if self
            .financials
            .iter()
            .any(|p| !p.revenue.is_finite() || !p.operating_margin.is_finite())
        {
            return Err(self.invalid("non-finite financial value"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> TierfolioError {
        TierfolioError::InvalidInstrument {
            ticker: self.ticker.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(year: i32, revenue: f64, margin: f64) -> FinancialPeriod {
        FinancialPeriod {
            year,
            revenue,
            operating_margin: margin,
            net_income: None,
        }
    }

    #[test]
    fn latest_period_is_last_by_year() {
        let inst = Instrument::new("005930", "semiconductors")
            .with_period(period(2023, 2800.0, 10.0))
            .with_period(period(2022, 2500.0, 9.0));
        assert_eq!(inst.latest().unwrap().year, 2023);
        assert_eq!(inst.revenue(), Some(2800.0));
        assert_eq!(inst.operating_margin(), Some(10.0));
    }

    #[test]
    fn revenue_growth_uses_last_two_periods() {
        let inst = Instrument::new("A", "it")
            .with_period(period(2022, 100.0, 5.0))
            .with_period(period(2023, 120.0, 5.0));
        assert!((inst.revenue_growth().unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(Instrument::new("B", "it").revenue_growth(), None);
    }

    #[test]
    fn margin_volatility_of_single_period_is_zero() {
        let inst = Instrument::new("A", "it").with_period(period(2023, 100.0, 5.0));
        assert_eq!(inst.margin_volatility(), 0.0);
    }

    #[test]
    fn margin_volatility_population_stddev() {
        let inst = Instrument::new("A", "it")
            .with_period(period(2022, 100.0, 4.0))
            .with_period(period(2023, 100.0, 8.0));
        assert!((inst.margin_volatility() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn loss_making_prefers_net_income() {
        let mut p = period(2023, 100.0, 5.0);
        p.net_income = Some(-1.0);
        let inst = Instrument::new("A", "it").with_period(p);
        assert!(inst.is_loss_making());

        let inst = Instrument::new("B", "it").with_period(period(2023, 50.0, -3.0));
        assert!(inst.is_loss_making());

        let inst = Instrument::new("C", "it").with_period(period(2023, 50.0, 3.0));
        assert!(!inst.is_loss_making());
    }

    #[test]
    fn price_lookup_by_date() {
        let inst = Instrument::new("A", "it").with_prices(vec![
            PricePoint { date: date(2024, 1, 1), close: 10.0 },
            PricePoint { date: date(2024, 1, 3), close: 11.0 },
        ]);
        assert_eq!(inst.price_on(date(2024, 1, 3)), Some(11.0));
        assert_eq!(inst.price_on(date(2024, 1, 2)), None);
    }

    #[test]
    fn validate_rejects_duplicate_dates() {
        let inst = Instrument::new("A", "it").with_prices(vec![
            PricePoint { date: date(2024, 1, 1), close: 10.0 },
            PricePoint { date: date(2024, 1, 1), close: 11.0 },
        ]);
        let err = inst.validate().unwrap_err();
        assert!(matches!(err, TierfolioError::InvalidInstrument { reason, .. } if reason.contains("duplicate")));
    }

    #[test]
    fn validate_rejects_unordered_prices() {
        let inst = Instrument::new("A", "it").with_prices(vec![
            PricePoint { date: date(2024, 1, 2), close: 10.0 },
            PricePoint { date: date(2024, 1, 1), close: 11.0 },
        ]);
        assert!(inst.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_close() {
        let inst = Instrument::new("A", "it").with_prices(vec![PricePoint {
            date: date(2024, 1, 2),
            close: 0.0,
        }]);
        assert!(inst.validate().is_err());
    }

    #[test]
    fn validate_accepts_clean_instrument() {
        let inst = Instrument::new("A", "it")
            .with_period(period(2023, 100.0, 5.0))
            .with_prices(vec![
                PricePoint { date: date(2024, 1, 1), close: 10.0 },
                PricePoint { date: date(2024, 1, 2), close: 10.5 },
            ]);
        assert!(inst.validate().is_ok());
    }
}
