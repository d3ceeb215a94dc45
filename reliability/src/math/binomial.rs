use super::beta::beta_quantile;

/// Exact (Clopper-Pearson) two-sided binomial confidence interval.
///
/// Returns `(low, high)` as proportions in `[0, 1]`, or `None` when
/// `trials` is zero. Zero trials carries no information about the
/// detection probability, which is not the same as zero detections.
pub fn clopper_pearson(successes: u64, trials: u64, confidence: f64) -> Option<(f64, f64)> {
    if trials == 0 {
        return None;
    }
    debug_assert!(successes <= trials);
    debug_assert!(confidence > 0.0 && confidence < 1.0);

    #[allow(clippy::cast_precision_loss)]
    let (k, n) = (successes as f64, trials as f64);
    let alpha = 1.0 - confidence;
    let p_hat = k / n;

    let low = if successes == 0 {
        0.0
    } else {
        beta_quantile(alpha / 2.0, k, n - k + 1.0)
    };

    let high = if successes == trials {
        1.0
    } else {
        beta_quantile(1.0 - alpha / 2.0, k + 1.0, n - k)
    };

    // Bisection stops within an ulp or so of the root; never let that
    // push a bound across the point estimate.
    Some((low.min(p_hat), high.max(p_hat)))
}

#[cfg(test)]
mod tests {
    use super::clopper_pearson;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_trials() {
        assert_eq!(clopper_pearson(0, 0, 0.95), None);
    }

    #[test]
    fn test_all_present() {
        // With k == n the lower bound has the closed form (alpha/2)^(1/n).
        let (low, high) = clopper_pearson(40, 40, 0.95).unwrap();
        assert_relative_eq!(low, 0.025_f64.powf(1.0 / 40.0), epsilon = 1e-12);
        assert!(low < 1.0);
        assert_eq!(high, 1.0);
    }

    #[test]
    fn test_none_present() {
        let (low, high) = clopper_pearson(0, 10, 0.95).unwrap();
        assert_eq!(low, 0.0);
        assert_relative_eq!(high, 1.0 - 0.025_f64.powf(0.1), epsilon = 1e-12);
    }

    #[test]
    fn test_reference_values() {
        let (low, high) = clopper_pearson(5, 10, 0.95).unwrap();
        assert_relative_eq!(low, 0.187_086_028_447_398_5, epsilon = 1e-10);
        assert_relative_eq!(high, 0.812_913_971_552_601_3, epsilon = 1e-10);

        let (low, high) = clopper_pearson(950, 1000, 0.95).unwrap();
        assert_relative_eq!(low, 0.934_609_512_084_506_6, epsilon = 1e-9);
        assert_relative_eq!(high, 0.962_664_602_395_34, epsilon = 1e-9);
    }

    #[test]
    fn test_mirror_symmetry() {
        for (k, n) in [(1, 7), (12, 31), (300, 1000)] {
            let (low, high) = clopper_pearson(k, n, 0.95).unwrap();
            let (m_low, m_high) = clopper_pearson(n - k, n, 0.95).unwrap();
            assert_relative_eq!(low, 1.0 - m_high, epsilon = 1e-10);
            assert_relative_eq!(high, 1.0 - m_low, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_brackets_point_estimate() {
        for n in [1_u64, 2, 29, 30, 31, 500] {
            for k in 0..=n {
                let p = k as f64 / n as f64;
                let (low, high) = clopper_pearson(k, n, 0.95).unwrap();
                assert!((0.0..=1.0).contains(&low));
                assert!((0.0..=1.0).contains(&high));
                assert!(low <= p && p <= high, "k={k} n={n} ({low}, {high})");
            }
        }
    }

    #[test]
    fn test_wider_at_higher_confidence() {
        let (l95, h95) = clopper_pearson(20, 60, 0.95).unwrap();
        let (l99, h99) = clopper_pearson(20, 60, 0.99).unwrap();
        assert!(l99 < l95);
        assert!(h99 > h95);
    }
}
