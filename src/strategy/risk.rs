//! Position sizing and risk/reward arithmetic.
//!
//! All figures are illustrative: pip values assume a USD account and a
//! 100,000-unit standard lot.

use tracing::debug;

use crate::types::{pip_multiplier, Opportunity};

/// Flat pip value per standard lot used in outbound signals.
pub const FLAT_PIP_VALUE_PER_LOT: f64 = 10.0;

/// Units in one standard lot.
const STANDARD_LOT_UNITS: f64 = 100_000.0;

// ---------------------------------------------------------------------------
// Risk plan
// ---------------------------------------------------------------------------

/// Sizing summary for one opportunity at a given account risk.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RiskPlan {
    /// Distance entry → stop, in pips (or points).
    pub pips_at_risk: f64,
    /// Distance entry → target, in pips (or points).
    pub pips_to_target: f64,
    /// Reward per unit of risk. Zero when the stop distance is zero.
    pub reward_ratio: f64,
    /// Account currency at risk.
    pub risk_amount: f64,
    /// Standard lots.
    pub lot_size: f64,
    /// `risk_amount × reward_ratio`.
    pub potential_profit: f64,
}

impl RiskPlan {
    /// Plan with the flat $10-per-pip assumption.
    pub fn flat(opp: &Opportunity, balance: f64, risk_pct: f64) -> Self {
        Self::with_pip_value(opp, balance, risk_pct, FLAT_PIP_VALUE_PER_LOT)
    }

    /// Plan using the rate-adjusted pip value from [`pip_value_per_lot`].
    pub fn precise(opp: &Opportunity, balance: f64, risk_pct: f64) -> Self {
        let pip_value = pip_value_per_lot(&opp.pair, opp.entry_price);
        Self::with_pip_value(opp, balance, risk_pct, pip_value)
    }

    fn with_pip_value(opp: &Opportunity, balance: f64, risk_pct: f64, pip_value: f64) -> Self {
        let multiplier = pip_multiplier(&opp.pair);
        let pips_at_risk = (opp.entry_price - opp.stop_loss).abs() * multiplier;
        let pips_to_target = (opp.take_profit - opp.entry_price).abs() * multiplier;
        let reward_ratio = if pips_at_risk > 0.0 {
            pips_to_target / pips_at_risk
        } else {
            0.0
        };

        let risk_amount = balance * (risk_pct / 100.0);
        let lot_size = if pips_at_risk > 0.0 && pip_value > 0.0 {
            (risk_amount / pips_at_risk) / pip_value
        } else {
            0.0
        };

        debug!(
            pair = %opp.pair,
            pips_at_risk,
            reward_ratio,
            lot_size,
            "Risk plan computed"
        );

        Self {
            pips_at_risk,
            pips_to_target,
            reward_ratio,
            risk_amount,
            lot_size,
            potential_profit: risk_amount * reward_ratio,
        }
    }

    /// `1:3.0` style label.
    pub fn ratio_label(&self) -> String {
        format!("1:{:.1}", self.reward_ratio)
    }

    /// Lot size expressed as standard, mini and micro lots.
    pub fn lot_breakdown(&self) -> LotBreakdown {
        LotBreakdown {
            standard: self.lot_size,
            mini: self.lot_size * 10.0,
            micro: self.lot_size * 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LotBreakdown {
    pub standard: f64,
    pub mini: f64,
    pub micro: f64,
}

/// Pip value of one standard lot in USD at `rate`.
///
/// USD-quoted instruments (including metals and indices) are valued at a
/// flat $10. USD-based pairs convert through the rate. Crosses fall back
/// to the flat value.
pub fn pip_value_per_lot(pair: &str, rate: f64) -> f64 {
    let (base, quote) = pair.split_once('/').unwrap_or((pair, ""));
    if quote == "USD" {
        return FLAT_PIP_VALUE_PER_LOT;
    }
    if base == "USD" {
        if rate == 0.0 {
            return 0.0;
        }
        let pip = if pair.contains("JPY") { 0.01 } else { 0.0001 };
        return pip * STANDARD_LOT_UNITS / rate;
    }
    FLAT_PIP_VALUE_PER_LOT
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Placeholder confidence score: 65 + 7 per confluence, capped at 98.
/// Not derived from data.
pub fn confidence_pct(confluences: usize) -> u32 {
    (65 + confluences as u32 * 7).min(98)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_opportunity;
    use crate::types::Bias;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_reference_long_setup() {
        let opp = sample_opportunity("opp-1", "EUR/USD");
        let plan = RiskPlan::flat(&opp, 10_000.0, 1.0);
        assert!(approx(plan.pips_at_risk, 20.0), "got {}", plan.pips_at_risk);
        assert!(approx(plan.pips_to_target, 60.0), "got {}", plan.pips_to_target);
        assert_eq!(plan.ratio_label(), "1:3.0");
        assert!(approx(plan.risk_amount, 100.0));
        // $100 / 20 pips / $10 per pip = 0.5 lots
        assert!(approx(plan.lot_size, 0.5));
        assert!(approx(plan.potential_profit, 300.0));
    }

    #[test]
    fn test_short_setup_uses_absolute_distances() {
        let mut opp = sample_opportunity("opp-2", "EUR/USD");
        opp.bias = Bias::Bearish;
        opp.stop_loss = 1.1070;
        opp.take_profit = 1.1010;
        let plan = RiskPlan::flat(&opp, 10_000.0, 1.0);
        assert!(approx(plan.pips_at_risk, 20.0));
        assert!(approx(plan.pips_to_target, 40.0));
        assert_eq!(plan.ratio_label(), "1:2.0");
    }

    #[test]
    fn test_zero_stop_distance() {
        let mut opp = sample_opportunity("opp-3", "EUR/USD");
        opp.stop_loss = opp.entry_price;
        let plan = RiskPlan::flat(&opp, 10_000.0, 1.0);
        assert_eq!(plan.reward_ratio, 0.0);
        assert_eq!(plan.lot_size, 0.0);
        assert_eq!(plan.potential_profit, 0.0);
    }

    #[test]
    fn test_jpy_multiplier() {
        let mut opp = sample_opportunity("opp-4", "USD/JPY");
        opp.entry_price = 155.00;
        opp.stop_loss = 154.80;
        opp.take_profit = 155.60;
        let plan = RiskPlan::flat(&opp, 10_000.0, 1.0);
        assert!(approx(plan.pips_at_risk, 20.0));
        assert!(approx(plan.pips_to_target, 60.0));
    }

    #[test]
    fn test_pip_value_per_lot() {
        assert_eq!(pip_value_per_lot("EUR/USD", 1.10), 10.0);
        assert_eq!(pip_value_per_lot("XAU/USD", 2300.0), 10.0);
        assert!(approx(pip_value_per_lot("USD/CHF", 0.8), 12.5));
        assert!(approx(pip_value_per_lot("USD/JPY", 100.0), 10.0));
        assert_eq!(pip_value_per_lot("USD/CAD", 0.0), 0.0);
        assert_eq!(pip_value_per_lot("EUR/GBP", 0.85), 10.0);
    }

    #[test]
    fn test_precise_plan_for_usd_base() {
        let mut opp = sample_opportunity("opp-5", "USD/CHF");
        opp.entry_price = 0.8000;
        opp.stop_loss = 0.7980;
        opp.take_profit = 0.8060;
        let plan = RiskPlan::precise(&opp, 10_000.0, 1.0);
        // $100 / 20 pips / $12.5 per pip
        assert!(approx(plan.lot_size, 0.4));
        let lots = plan.lot_breakdown();
        assert!(approx(lots.mini, 4.0));
        assert!(approx(lots.micro, 40.0));
    }

    #[test]
    fn test_confidence_caps_at_98() {
        assert_eq!(confidence_pct(0), 65);
        assert_eq!(confidence_pct(3), 86);
        assert_eq!(confidence_pct(5), 98);
        assert_eq!(confidence_pct(10), 98);
    }
}
