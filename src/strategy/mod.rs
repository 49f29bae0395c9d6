//! Strategy arithmetic: pip distances, position sizing and the
//! placeholder confidence score shown on opportunity cards.

pub mod risk;

pub use risk::{confidence_pct, pip_value_per_lot, LotBreakdown, RiskPlan};
