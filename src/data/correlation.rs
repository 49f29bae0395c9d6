//! Pairwise correlation matrix.

use rand::Rng;
use std::collections::BTreeMap;

/// `matrix[a][b]` is the correlation of `a` with `b`, in [-1, 1].
pub type CorrelationMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// Random symmetric matrix with a unit diagonal.
pub fn generate_matrix<R: Rng>(rng: &mut R, pairs: &[String]) -> CorrelationMatrix {
    let mut matrix: CorrelationMatrix = pairs.iter().map(|p| (p.clone(), BTreeMap::new())).collect();

    for (i, a) in pairs.iter().enumerate() {
        for b in &pairs[i..] {
            let value = if a == b { 1.0 } else { rng.gen_range(-1.0..=1.0) };
            if let Some(row) = matrix.get_mut(a) {
                row.insert(b.clone(), value);
            }
            if let Some(row) = matrix.get_mut(b) {
                row.insert(a.clone(), value);
            }
        }
    }

    matrix
}

/// Coarse label used when rendering a cell.
pub fn strength_label(value: f64) -> &'static str {
    match value {
        v if v >= 0.7 => "Strong positive",
        v if v >= 0.3 => "Positive",
        v if v > -0.3 => "Weak",
        v if v > -0.7 => "Negative",
        _ => "Strong negative",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_symmetric_with_unit_diagonal() {
        let pairs: Vec<String> = ["EUR/USD", "GBP/USD", "USD/JPY", "XAU/USD"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let m = generate_matrix(&mut StdRng::seed_from_u64(2), &pairs);

        for a in &pairs {
            assert_eq!(m[a][a], 1.0);
            for b in &pairs {
                assert_eq!(m[a][b], m[b][a]);
                assert!((-1.0..=1.0).contains(&m[a][b]));
            }
        }
    }

    #[test]
    fn test_empty_pairs() {
        assert!(generate_matrix(&mut StdRng::seed_from_u64(2), &[]).is_empty());
    }

    #[test]
    fn test_strength_label() {
        assert_eq!(strength_label(1.0), "Strong positive");
        assert_eq!(strength_label(0.1), "Weak");
        assert_eq!(strength_label(-0.5), "Negative");
        assert_eq!(strength_label(-0.9), "Strong negative");
    }
}
