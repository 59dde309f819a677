//! Report generation port trait.

use crate::domain::error::TierfolioError;
use crate::domain::risk_tier::TierProfile;
use crate::domain::weights::StrategyResult;

/// Port for writing strategy results.
pub trait ReportPort {
    /// `results` are written in the given order, which is taken as the rank.
    fn write(
        &self,
        results: &[StrategyResult],
        profile: &TierProfile,
        output_path: &str,
    ) -> Result<(), TierfolioError>;
}
