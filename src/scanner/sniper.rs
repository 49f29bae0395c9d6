//! Randomized "sniper entry model" generator.
//!
//! Fabricates plausible Smart Money Concepts setups: a higher-timeframe
//! POI, a liquidity sweep, a market structure shift, an FVG or order
//! block entry zone, optional inducement, and an OTE entry. Price levels
//! are derived from the same narrative (stop beyond the sweep, target at
//! 3–8R). Nothing here reads market data.

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::OpportunityGenerator;
use crate::types::{
    Bias, Finding, Opportunity, SymbolKind, Timeframe, TimeframeAnalysis, AVAILABLE_SYMBOLS,
};

/// Probability that a scan finds nothing.
const EMPTY_SCAN_PROBABILITY: f64 = 0.2;

/// Most setups a single scan will ever produce.
const MAX_SETUPS_PER_SCAN: usize = 2;

/// Buffer applied beyond the liquidity sweep when placing the stop.
const STOP_BUFFER: f64 = 1.1;

/// Simulated scan latency.
const DEFAULT_LATENCY: Duration = Duration::from_millis(750);

pub struct SniperScanner {
    rng: Mutex<StdRng>,
    latency: Duration,
}

impl SniperScanner {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            latency: DEFAULT_LATENCY,
        }
    }

    /// Deterministic scanner with no simulated latency.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn scan(&self, max_count: usize) -> Vec<Opportunity> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if max_count == 0 || rng.gen_bool(EMPTY_SCAN_PROBABILITY) {
            return Vec::new();
        }

        let wanted = rng.gen_range(1..=MAX_SETUPS_PER_SCAN).min(max_count);
        let mut used = HashSet::new();
        let mut out = Vec::with_capacity(wanted);

        while out.len() < wanted {
            let Some(pair) = AVAILABLE_SYMBOLS.choose(&mut *rng).copied() else {
                break;
            };
            if !used.insert(pair) {
                continue;
            }
            out.push(build_setup(&mut *rng, pair));
        }

        out
    }
}

impl Default for SniperScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpportunityGenerator for SniperScanner {
    async fn generate(&self, max_count: usize) -> Result<Vec<Opportunity>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let batch = self.scan(max_count);
        debug!(count = batch.len(), max_count, "Sniper scan complete");
        Ok(batch)
    }

    fn name(&self) -> &str {
        "sniper"
    }
}

// ---------------------------------------------------------------------------
// Setup construction
// ---------------------------------------------------------------------------

fn base_price<R: Rng>(rng: &mut R, pair: &str) -> f64 {
    match SymbolKind::of(pair) {
        SymbolKind::Metal => 2300.0 + rng.gen::<f64>() * 100.0,
        SymbolKind::Index if pair.contains("US30") => 39_000.0 + rng.gen::<f64>() * 500.0,
        SymbolKind::Index => 18_000.0 + rng.gen::<f64>() * 500.0,
        SymbolKind::Forex => 1.05 + rng.gen::<f64>() * 0.2,
    }
}

fn build_setup<R: Rng>(rng: &mut R, pair: &str) -> Opportunity {
    let kind = SymbolKind::of(pair);
    let base = base_price(rng, pair);
    let bias = if rng.gen_bool(0.5) { Bias::Bullish } else { Bias::Bearish };
    let setup_timeframe = if rng.gen_bool(0.5) { Timeframe::M15 } else { Timeframe::M5 };
    let sign = if bias.is_bullish() { 1.0 } else { -1.0 };

    // Sweep beyond the range, shift structure the other way, then enter
    // on the pullback into the POI.
    let volatility = base * if kind == SymbolKind::Forex { 0.005 } else { 0.01 };
    let sweep = base - sign * volatility;
    let shift = base + sign * volatility * 0.5;
    let entry_price = shift - sign * volatility * 0.3;

    let stop_distance = (entry_price - sweep).abs() * STOP_BUFFER;
    let reward_ratio = 3.0 + rng.gen::<f64>() * 5.0;
    let target_distance = stop_distance * reward_ratio;

    let stop_loss = entry_price - sign * stop_distance;
    let take_profit = entry_price + sign * target_distance;

    let id = format!("opp-{}", Uuid::new_v4().simple());
    let setup_findings = sniper_findings(rng, bias, &id);

    let analysis = Timeframe::ORDER
        .iter()
        .map(|&tf| {
            if tf == setup_timeframe {
                return TimeframeAnalysis { timeframe: tf, findings: setup_findings.clone() };
            }
            let (concept, description) = if tf.is_higher_than(setup_timeframe) {
                ("Market Structure".to_string(), format!("{tf} structure is aligned with the {bias} bias."))
            } else {
                ("Confirmation".to_string(), format!("Watching {tf} to refine the entry."))
            };
            TimeframeAnalysis {
                timeframe: tf,
                findings: vec![Finding { id: format!("{id}-{tf}"), concept, description }],
            }
        })
        .collect();

    Opportunity {
        id,
        pair: pair.to_string(),
        bias,
        entry_price,
        stop_loss,
        take_profit,
        setup_timeframe,
        analysis,
    }
}

fn sniper_findings<R: Rng>(rng: &mut R, bias: Bias, id: &str) -> Vec<Finding> {
    let bullish = bias.is_bullish();
    let poi = if rng.gen_bool(0.5) { "Fair Value Gap (FVG)" } else { "Order Block (OB)" };

    let mut steps: Vec<(&str, String)> = vec![
        (
            "Higher Timeframe POI",
            format!(
                "Setup originates from a {} higher-timeframe point of interest.",
                if bullish { "bullish" } else { "bearish" }
            ),
        ),
        (
            "Liquidity Grab",
            format!(
                "Price swept liquidity {}.",
                if bullish { "below a key low (SSL)" } else { "above a key high (BSL)" }
            ),
        ),
        (
            "Market Structure Shift (MSS)",
            "A displacement leg caused a market structure shift, signalling a reversal.".to_string(),
        ),
        (poi, format!("The displacement left a high-probability {poi} that serves as the entry zone.")),
    ];

    if rng.gen_bool(0.6) {
        steps.push((
            "Inducement (IDM)",
            "Internal liquidity (IDM) was taken before price reached the main POI.".to_string(),
        ));
    }

    steps.push((
        "Optimal Trade Entry (OTE)",
        format!(
            "Entry is planned on the POI retest inside the {} OTE zone.",
            if bullish { "discount" } else { "premium" }
        ),
    ));

    steps
        .into_iter()
        .enumerate()
        .map(|(i, (concept, description))| Finding {
            id: format!("{id}-step{i}"),
            concept: concept.to_string(),
            description,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_setups_hold_invariants() {
        let scanner = SniperScanner::seeded(7);
        let mut seen = 0;
        for _ in 0..200 {
            for opp in scanner.scan(2) {
                opp.validate().unwrap();
                assert!(AVAILABLE_SYMBOLS.contains(&opp.pair.as_str()));
                assert!(matches!(opp.setup_timeframe, Timeframe::M15 | Timeframe::M5));
                assert_eq!(opp.analysis.len(), Timeframe::ORDER.len());
                let n = opp.confluence_count();
                assert!((5..=6).contains(&n), "unexpected confluence count {n}");
                seen += 1;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn test_reward_ratio_between_3_and_8() {
        let scanner = SniperScanner::seeded(11);
        for _ in 0..100 {
            for opp in scanner.scan(2) {
                let risk = (opp.entry_price - opp.stop_loss).abs();
                let reward = (opp.take_profit - opp.entry_price).abs();
                let rr = reward / risk;
                assert!((2.999..=8.001).contains(&rr), "rr {rr}");
            }
        }
    }

    #[test]
    fn test_respects_max_count_and_distinct_pairs() {
        let scanner = SniperScanner::seeded(3);
        for _ in 0..100 {
            let one = scanner.scan(1);
            assert!(one.len() <= 1);

            let two = scanner.scan(2);
            assert!(two.len() <= 2);
            if two.len() == 2 {
                assert_ne!(two[0].pair, two[1].pair);
            }
        }
        assert!(scanner.scan(0).is_empty());
    }

    #[test]
    fn test_ids_never_repeat() {
        let scanner = SniperScanner::seeded(5);
        let mut ids = HashSet::new();
        for _ in 0..200 {
            for opp in scanner.scan(2) {
                assert!(ids.insert(opp.id.clone()), "duplicate id {}", opp.id);
            }
        }
    }

    #[test]
    fn test_some_scans_are_empty() {
        let scanner = SniperScanner::seeded(42);
        let empties = (0..200).filter(|_| scanner.scan(2).is_empty()).count();
        assert!(empties > 0 && empties < 200);
    }

    #[tokio::test]
    async fn test_generate_via_trait() {
        let scanner = SniperScanner::seeded(1);
        let gen: &dyn OpportunityGenerator = &scanner;
        assert_eq!(gen.name(), "sniper");
        let batch = gen.generate(2).await.unwrap();
        assert!(batch.len() <= 2);
    }
}
