//! Per-pair market analysis on the higher timeframes.

use rand::Rng;
use uuid::Uuid;

use crate::types::{Bias, Finding, MarketAnalysis, PairMarketAnalysis, Timeframe, TimeframeAnalysis};

/// Timeframes covered by the market overview.
pub const ANALYSIS_TIMEFRAMES: [Timeframe; 4] = [Timeframe::D1, Timeframe::H4, Timeframe::H1, Timeframe::M15];

pub fn generate_market_analysis<R: Rng>(rng: &mut R, symbols: &[&str]) -> MarketAnalysis {
    let batch = Uuid::new_v4().simple().to_string();

    symbols
        .iter()
        .map(|&pair| {
            let bias = if rng.gen_bool(0.5) { Bias::Bullish } else { Bias::Bearish };
            let analysis = ANALYSIS_TIMEFRAMES
                .iter()
                .map(|&tf| TimeframeAnalysis {
                    timeframe: tf,
                    findings: vec![Finding {
                        id: format!("mkt-{batch}-{pair}-{tf}"),
                        concept: "Market Structure".to_string(),
                        description: format!("{tf} bias is {bias}. Trend confirmed by a recent BoS."),
                    }],
                })
                .collect();
            (pair.to_string(), PairMarketAnalysis { bias, analysis })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_one_entry_per_symbol_with_four_timeframes() {
        let mut rng = StdRng::seed_from_u64(4);
        let analysis = generate_market_analysis(&mut rng, &["EUR/USD", "XAU/USD"]);
        assert_eq!(analysis.len(), 2);

        let eur = &analysis["EUR/USD"];
        let tfs: Vec<Timeframe> = eur.analysis.iter().map(|a| a.timeframe).collect();
        assert_eq!(tfs, ANALYSIS_TIMEFRAMES.to_vec());
        assert!(eur.analysis[0].findings[0].description.contains(&eur.bias.to_string()));
    }
}
