//! Range models fitted to the reliability curve.
//!
//! Two strategies are available behind [`RangeFitter`]:
//!
//! - [`PiecewiseLinear`] (default): least-squares fit of a flat segment
//!   followed by a linear decline. Produces all three figures of a
//!   [`FittedRangeModel`].
//! - [`Knee`]: Kneedle knee detection on the concave, decreasing curve.
//!   Produces only the maximum reliable range.
//!
//! The two can disagree on noisy curves, especially when the decline
//! is gradual.

mod knee;
mod piecewise;

pub use self::{knee::Knee, piecewise::PiecewiseLinear};
use crate::bins::Bin;
use serde::Serialize;
use thiserror::Error;

/// Minimum number of valid bins needed before any model is fitted.
pub const MIN_FIT_BINS: usize = 4;

/// The reliability curve compressed to interpretable figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FittedRangeModel {
    /// Distance (nautical miles) past which reliability declines.
    pub max_reliable_range: f64,

    /// Detection probability close to the receiver.
    pub near_range_reliability: Option<f64>,

    /// Change in detection probability per nautical mile beyond
    /// `max_reliable_range` (negative when reliability drops).
    pub far_range_slope: Option<f64>,
}

impl FittedRangeModel {
    /// Reliability lost over `distance` nautical miles beyond the knee,
    /// as a positive fraction.
    pub fn loss_over(&self, distance: f64) -> Option<f64> {
        self.far_range_slope.map(|m| -m * distance)
    }
}

/// Why no model was produced. Neither case is an error of the run: the
/// bin table stays valid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitFailure {
    #[error("insufficient data: {valid_bins} valid range bins, at least {required} needed")]
    Insufficient { valid_bins: usize, required: usize },

    #[error("could not fit: {0}")]
    NoConvergence(String),
}

/// A strategy that extracts a range model from aggregated bins.
pub trait RangeFitter: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Fits a model to the valid, non-empty bins of `bins`. Invalid and
    /// empty bins are ignored.
    fn fit(&self, bins: &[Bin]) -> Result<FittedRangeModel, FitFailure>;
}

/// Returns `(distance, proportion)` for every bin that may be fitted,
/// or `Insufficient` if there are too few of them.
fn curve(bins: &[Bin]) -> Result<(Vec<f64>, Vec<f64>), FitFailure> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = bins
        .iter()
        .filter(|bin| bin.valid)
        .filter_map(|bin| bin.proportion.map(|p| (bin.distance(), p)))
        .unzip();

    if xs.len() < MIN_FIT_BINS {
        Err(FitFailure::Insufficient {
            valid_bins: xs.len(),
            required: MIN_FIT_BINS,
        })
    } else {
        Ok((xs, ys))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{curve, FitFailure, FittedRangeModel};
    use crate::bins::Bin;

    /// A valid bin of width 10 ending at `hi` with the given proportion.
    pub(crate) fn bin(hi: f64, proportion: f64) -> Bin {
        Bin {
            lo: hi - 10.0,
            hi,
            present_count: (proportion * 1000.0).round() as u64,
            total_count: 1000,
            proportion: Some(proportion),
            ci_low: None,
            ci_high: None,
            valid: true,
        }
    }

    /// Flat at `y0` up to `x0`, then declining with slope `m`.
    pub(crate) fn piecewise_bins(x0: f64, y0: f64, m: f64, n: usize) -> Vec<Bin> {
        (1..=n)
            .map(|i| {
                let x = i as f64 * 10.0;
                let y = if x < x0 { y0 } else { y0 + m * (x - x0) };
                bin(x, y)
            })
            .collect()
    }

    #[test]
    fn test_curve_skips_invalid_and_empty() {
        let mut bins = piecewise_bins(100.0, 0.95, -0.002, 6);
        bins[1].valid = false;
        bins[2].total_count = 0;
        bins[2].proportion = None;
        bins[2].valid = false;
        let (xs, ys) = curve(&bins).unwrap();
        assert_eq!(xs, vec![10.0, 40.0, 50.0, 60.0]);
        assert_eq!(ys.len(), 4);
    }

    #[test]
    fn test_curve_insufficient() {
        let bins = piecewise_bins(100.0, 0.95, -0.002, 3);
        assert_eq!(
            curve(&bins),
            Err(FitFailure::Insufficient {
                valid_bins: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_loss_over() {
        let model = FittedRangeModel {
            max_reliable_range: 120.0,
            near_range_reliability: Some(0.97),
            far_range_slope: Some(-0.0015),
        };
        assert!((model.loss_over(10.0).unwrap() - 0.015).abs() < 1e-12);
        let knee_only = FittedRangeModel {
            far_range_slope: None,
            ..model
        };
        assert_eq!(knee_only.loss_over(10.0), None);
    }
}
