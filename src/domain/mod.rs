//! Core domain types and logic.
//!
//! Leaf-first: the tier table and instruments feed the screener, whose pool
//! feeds the estimator; the strategies consume both, the enforcer applies
//! the single-position cap, and the comparator ranks strategies.

pub mod comparator;
pub mod config_validation;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod instrument;
pub mod metrics;
pub mod optimizer;
pub mod risk_tier;
pub mod screener;
pub mod strategy;
pub mod weights;
