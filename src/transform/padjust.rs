//! Multiple-testing correction.

/// Benjamini-Hochberg false discovery rate adjustment.
///
/// Non-finite p-values are excluded from the family: `m` counts finite
/// values only and the excluded positions come back as `NaN`. Adjusted
/// values are monotone in p-value rank and capped at 1.
#[must_use]
pub fn benjamini_hochberg(p: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..p.len()).filter(|&i| p[i].is_finite()).collect();
    let m = order.len();
    let mut out = vec![f64::NAN; p.len()];
    if m == 0 {
        return out;
    }

    order.sort_by(|&a, &b| p[a].total_cmp(&p[b]));

    let mut running = 1.0_f64;
    for (rank0, &i) in order.iter().enumerate().rev() {
        let rank = (rank0 + 1) as f64;
        let adjusted = p[i] * m as f64 / rank;
        running = running.min(adjusted);
        out[i] = running.min(1.0);
    }
    out
}

/// Bonferroni family-wise error adjustment, `min(p * m, 1)`.
#[must_use]
pub fn bonferroni(p: &[f64]) -> Vec<f64> {
    let m = p.iter().filter(|v| v.is_finite()).count() as f64;
    p.iter()
        .map(|&v| if v.is_finite() { (v * m).min(1.0) } else { f64::NAN })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_bh_excludes_nan() {
        let adj = benjamini_hochberg(&[0.01, 0.04, 0.03, f64::NAN, 0.20]);
        assert_relative_eq!(adj[0], 0.04, epsilon = 1e-12);
        assert_relative_eq!(adj[1], 0.053_333_333_333, epsilon = 1e-9);
        assert_relative_eq!(adj[2], 0.053_333_333_333, epsilon = 1e-9);
        assert!(adj[3].is_nan());
        assert_relative_eq!(adj[4], 0.20, epsilon = 1e-12);
    }

    #[test]
    fn test_bh_caps_at_one() {
        let adj = benjamini_hochberg(&[0.9, 0.95, 0.99]);
        assert!(adj.iter().all(|&v| v <= 1.0));
        assert_relative_eq!(adj[2], 0.99, epsilon = 1e-12);
    }

    #[test]
    fn test_bh_all_nan() {
        let adj = benjamini_hochberg(&[f64::NAN, f64::NAN]);
        assert!(adj.iter().all(|v| v.is_nan()));
        assert!(benjamini_hochberg(&[]).is_empty());
    }

    #[test]
    fn test_bonferroni() {
        let adj = bonferroni(&[0.01, f64::NAN, 0.5]);
        assert_relative_eq!(adj[0], 0.02, epsilon = 1e-12);
        assert!(adj[1].is_nan());
        assert_relative_eq!(adj[2], 1.0);
    }

    mod proptests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_bh_monotone_and_bounded(
                p in proptest::collection::vec(prop_oneof![4 => 0.0..=1.0f64, 1 => Just(f64::NAN)], 1..60)
            ) {
                let adj = benjamini_hochberg(&p);
                prop_assert_eq!(adj.len(), p.len());
                for i in 0..p.len() {
                    prop_assert_eq!(p[i].is_nan(), adj[i].is_nan());
                    if p[i].is_finite() {
                        prop_assert!(adj[i] >= p[i] - 1e-12);
                        prop_assert!(adj[i] <= 1.0);
                    }
                    for j in 0..p.len() {
                        if p[i].is_finite() && p[j].is_finite() && p[i] < p[j] {
                            prop_assert!(adj[i] <= adj[j] + 1e-12);
                        }
                    }
                }
            }
        }
    }
}
