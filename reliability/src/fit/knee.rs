use super::{curve, FitFailure, FittedRangeModel, RangeFitter};
use crate::bins::Bin;
use itertools::Itertools;
use log::debug;

/// Kneedle knee detection for a concave, decreasing reliability curve.
///
/// Operates on the raw bin points, without polynomial smoothing, in
/// online mode: every knee candidate met while scanning replaces the
/// previous one, so the reported knee is the last one found.
///
/// # References
///
/// 1. Satopää, Albrecht, Irwin, Raghavan, "Finding a 'Kneedle' in a
///    Haystack: Detecting Knee Points in System Behavior", 2011.
#[derive(Debug, Clone, Copy)]
pub struct Knee {
    sensitivity: f64,
}

impl Default for Knee {
    fn default() -> Self {
        Self { sensitivity: 1.0 }
    }
}

impl Knee {
    /// Kneedle `S` parameter. Larger values are more conservative.
    #[must_use]
    pub fn sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }
}

impl RangeFitter for Knee {
    fn name(&self) -> &'static str {
        "knee"
    }

    fn fit(&self, bins: &[Bin]) -> Result<FittedRangeModel, FitFailure> {
        let (xs, ys) = curve(bins)?;
        let knee = kneedle(&xs, &ys, self.sensitivity).ok_or_else(|| {
            FitFailure::NoConvergence("no knee in the reliability curve".to_string())
        })?;
        debug!("knee at {knee} nmi");
        Ok(FittedRangeModel {
            max_reliable_range: knee,
            near_range_reliability: None,
            far_range_slope: None,
        })
    }
}

fn kneedle(xs: &[f64], ys: &[f64], sensitivity: f64) -> Option<f64> {
    let n = xs.len();
    let x_norm = normalize(xs)?;
    let y_norm = normalize(ys)?;

    // Reversing a concave decreasing curve makes it concave increasing,
    // where the knee maximizes the distance above the diagonal.
    let difference: Vec<f64> = y_norm
        .iter()
        .rev()
        .zip(&x_norm)
        .map(|(y, x)| y - x)
        .collect();

    let maxima = local_extrema(&difference, |a, b| a >= b);
    let minima = local_extrema(&difference, |a, b| a <= b);

    #[allow(clippy::cast_precision_loss)]
    let step = sensitivity
        * x_norm
            .iter()
            .tuple_windows()
            .map(|(a, b)| (b - a).abs())
            .sum::<f64>()
        / (n - 1) as f64;

    let first = *maxima.first()?;
    let mut threshold = 0.0;
    let mut threshold_index = first;
    let mut knee_index = None;

    for i in first..n - 1 {
        if maxima.contains(&i) {
            threshold = difference[i] - step;
            threshold_index = i;
        }
        if minima.contains(&i) {
            threshold = 0.0;
        }
        if difference[i + 1] < threshold {
            knee_index = Some(threshold_index);
        }
    }

    // Undo the reversal.
    knee_index.map(|idx| xs[n - 1 - idx])
}

/// Scales `values` onto `[0, 1]`; `None` if they are all equal.
fn normalize(values: &[f64]) -> Option<Vec<f64>> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if range > 0.0 && range.is_finite() {
        Some(values.iter().map(|v| (v - lo) / range).collect())
    } else {
        None
    }
}

/// Indices where `cmp(value, neighbor)` holds for both neighbors. End
/// points only have one neighbor.
fn local_extrema(values: &[f64], cmp: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let last = values.len().saturating_sub(1);
    (0..values.len())
        .filter(|&i| {
            let prev = values[i.saturating_sub(1)];
            let next = values[(i + 1).min(last)];
            cmp(values[i], prev) && cmp(values[i], next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{kneedle, local_extrema, normalize, Knee};
    use crate::fit::{
        tests::{bin, piecewise_bins},
        FitFailure, RangeFitter,
    };

    #[test]
    fn test_knee_of_piecewise_curve() {
        for x0 in [60.0, 100.0, 150.0] {
            let bins = piecewise_bins(x0, 0.95, -0.002, 20);
            let model = Knee::default().fit(&bins).unwrap();
            assert_eq!(model.max_reliable_range, x0);
            assert_eq!(model.near_range_reliability, None);
            assert_eq!(model.far_range_slope, None);
        }
    }

    #[test]
    fn test_knee_of_smooth_curve() {
        let xs: Vec<f64> = (1..=20).map(|i| f64::from(i) * 10.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 1.0 - ((x - 250.0) / 40.0).exp()).collect();
        assert_eq!(kneedle(&xs, &ys, 1.0), Some(140.0));
    }

    #[test]
    fn test_flat_curve_has_no_knee() {
        let bins: Vec<_> = (1..=10).map(|i| bin(f64::from(i) * 10.0, 0.9)).collect();
        assert!(matches!(
            Knee::default().fit(&bins),
            Err(FitFailure::NoConvergence(_))
        ));
    }

    #[test]
    fn test_insufficient() {
        let bins = piecewise_bins(20.0, 0.95, -0.01, 2);
        assert!(matches!(
            Knee::default().fit(&bins),
            Err(FitFailure::Insufficient { valid_bins: 2, .. })
        ));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[2.0, 4.0, 3.0]), Some(vec![0.0, 1.0, 0.5]));
        assert_eq!(normalize(&[1.0, 1.0]), None);
    }

    #[test]
    fn test_local_extrema() {
        let values = [0.0, 2.0, 1.0, 1.0, 3.0];
        assert_eq!(local_extrema(&values, |a, b| a >= b), vec![1, 4]);
        assert_eq!(local_extrema(&values, |a, b| a <= b), vec![0, 2, 3]);
    }
}
