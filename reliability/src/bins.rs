//! Distance binning, per-bin detection proportion and the
//! statistical-validity filter.

use crate::{
    constants::{DEFAULT_BIN_WIDTH, DEFAULT_CONFIDENCE, DEFAULT_MIN_SAMPLES, MAX_BINS},
    math::clopper_pearson,
    presence::PresenceRecord,
    ReliabilityError,
};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

/// Aggregation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinConfig {
    /// Bin width in nautical miles.
    pub width: f64,

    /// Bins with fewer records than this are excluded from interval
    /// display and model fitting. Bins with exactly this many records
    /// are kept.
    pub min_samples: u64,

    /// Keep every non-empty bin regardless of `min_samples`.
    pub use_all: bool,

    /// Two-sided confidence level of each bin's interval.
    pub confidence: f64,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BIN_WIDTH,
            min_samples: DEFAULT_MIN_SAMPLES,
            use_all: false,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl BinConfig {
    pub fn validate(&self) -> Result<(), ReliabilityError> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(ReliabilityError::Parameter(
                "bin width",
                format!("{} is not a positive distance", self.width),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ReliabilityError::Parameter(
                "confidence",
                format!("{} is not in (0, 1)", self.confidence),
            ));
        }
        Ok(())
    }

    fn passes(&self, total_count: u64) -> bool {
        total_count > 0 && (self.use_all || total_count >= self.min_samples)
    }
}

/// A half-open distance interval `[lo, hi)` and its aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    /// Inclusive lower edge (nautical miles).
    pub lo: f64,

    /// Exclusive upper edge (nautical miles).
    pub hi: f64,

    /// Records whose aircraft was seen again at the next epoch.
    pub present_count: u64,

    /// Records that fell in this bin.
    pub total_count: u64,

    /// `present_count / total_count`, no value for an empty bin.
    pub proportion: Option<f64>,

    pub ci_low: Option<f64>,

    pub ci_high: Option<f64>,

    /// Passed the statistical-validity filter.
    pub valid: bool,
}

impl Bin {
    /// The distance this bin is plotted and fitted at: its upper edge.
    pub fn distance(&self) -> f64 {
        self.hi
    }

    pub fn contains(&self, distance_nmi: f64) -> bool {
        self.lo <= distance_nmi && distance_nmi < self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// Dense, ascending bins covering `[0, max_distance]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinTable {
    /// Bin width in nautical miles.
    pub width: f64,

    pub bins: Vec<Bin>,

    /// Non-empty bins excluded by the validity filter.
    pub filtered: usize,

    /// Records skipped because their distance was not a finite,
    /// non-negative number.
    pub rejected: usize,
}

impl BinTable {
    /// Bins that passed the validity filter, ascending.
    pub fn valid(&self) -> impl Iterator<Item = &Bin> + '_ {
        self.bins.iter().filter(|bin| bin.valid)
    }

    pub fn total_records(&self) -> u64 {
        self.bins.iter().map(|bin| bin.total_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Aggregates presence records into fixed-width distance bins.
///
/// The first bin starts at zero and the last one contains the maximum
/// observed distance, so every accepted record lands in exactly one
/// bin. Intervals are computed for every non-empty bin; the `valid`
/// flag tells consumers which ones to show and fit.
pub fn aggregate(
    records: &[PresenceRecord],
    config: &BinConfig,
) -> Result<BinTable, ReliabilityError> {
    config.validate()?;

    let max_distance = records
        .iter()
        .map(|record| record.distance_nmi)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))));
    let bin_count = match max_distance {
        Some(max) => bin_index(max, config.width)
            .map(|idx| idx + 1)
            .filter(|&count| count <= MAX_BINS)
            .ok_or_else(|| {
                ReliabilityError::Parameter(
                    "bin width",
                    format!(
                        "{} nmi bins out to {max} nmi exceed {MAX_BINS} bins",
                        config.width
                    ),
                )
            })?,
        None => 0,
    };

    let mut rejected = 0_usize;
    let mut counts: Vec<(u64, u64)> = vec![(0, 0); bin_count];

    for record in records {
        let Some(idx) = bin_index(record.distance_nmi, config.width) else {
            rejected += 1;
            continue;
        };
        let (present, total) = &mut counts[idx];
        *present += u64::from(record.present_next);
        *total += 1;
    }

    if rejected > 0 {
        warn!("skipped {rejected} records with an invalid distance");
    }

    let mut bins: Vec<Bin> = counts
        .into_iter()
        .enumerate()
        .map(|(idx, (present_count, total_count))| {
            #[allow(clippy::cast_precision_loss)]
            let (lo, hi) = (idx as f64 * config.width, (idx + 1) as f64 * config.width);
            #[allow(clippy::cast_precision_loss)]
            let proportion = (total_count > 0).then(|| present_count as f64 / total_count as f64);
            Bin {
                lo,
                hi,
                present_count,
                total_count,
                proportion,
                ci_low: None,
                ci_high: None,
                valid: config.passes(total_count),
            }
        })
        .collect();

    bins.par_iter_mut().for_each(|bin| {
        let interval = clopper_pearson(bin.present_count, bin.total_count, config.confidence);
        if let Some((low, high)) = interval {
            bin.ci_low = Some(low);
            bin.ci_high = Some(high);
        }
    });

    let filtered = bins
        .iter()
        .filter(|bin| !bin.valid && !bin.is_empty())
        .count();
    // A thin trailing bin is expected at the far edge; only speak up
    // when more than that was dropped.
    if filtered > 1 {
        warn!(
            "filtering {filtered} range bins because they had fewer than {} records \
             for valid statistics",
            config.min_samples
        );
    }
    info!(
        "{} records in {} bins of {} nmi, {} valid",
        records.len() - rejected,
        bins.len(),
        config.width,
        bins.iter().filter(|bin| bin.valid).count()
    );

    Ok(BinTable {
        width: config.width,
        bins,
        filtered,
        rejected,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bin_index(distance_nmi: f64, width: f64) -> Option<usize> {
    if !(distance_nmi.is_finite() && distance_nmi >= 0.0) {
        return None;
    }
    let idx = (distance_nmi / width).floor();
    // Guard against absurd distances allocating absurd tables.
    if idx > u32::MAX as f64 {
        return None;
    }
    let mut idx = idx as usize;
    // Division can land a hair on the wrong side of an edge; the edges
    // themselves are what `Bin::contains` checks against.
    #[allow(clippy::cast_precision_loss)]
    while idx > 0 && distance_nmi < idx as f64 * width {
        idx -= 1;
    }
    #[allow(clippy::cast_precision_loss)]
    while distance_nmi >= (idx + 1) as f64 * width {
        idx += 1;
    }
    Some(idx)
}

#[cfg(test)]
mod tests {
    use super::{aggregate, bin_index, BinConfig};
    use crate::{presence::PresenceRecord, ReliabilityError};
    use approx::assert_relative_eq;

    fn record(distance_nmi: f64, present_next: bool) -> PresenceRecord {
        PresenceRecord {
            aircraft_id: "abc123".to_string(),
            distance_nmi,
            present_next,
        }
    }

    #[test]
    fn test_single_record() {
        let table = aggregate(&[record(15.0, false)], &BinConfig::default()).unwrap();
        assert_eq!(table.bins.len(), 2);

        let empty = &table.bins[0];
        assert_eq!((empty.lo, empty.hi), (0.0, 10.0));
        assert_eq!(empty.total_count, 0);
        assert_eq!(empty.proportion, None);
        assert_eq!(empty.ci_low, None);
        assert_eq!(empty.ci_high, None);
        assert!(!empty.valid);

        let bin = &table.bins[1];
        assert_eq!((bin.lo, bin.hi), (10.0, 20.0));
        assert_eq!(bin.total_count, 1);
        assert_eq!(bin.present_count, 0);
        assert_eq!(bin.proportion, Some(0.0));
        assert_eq!(bin.distance(), 20.0);
    }

    #[test]
    fn test_edges_are_left_inclusive() {
        let records = [
            record(0.0, true),
            record(10.0, true),
            record(9.999_999, true),
            record(20.0, false),
        ];
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        let totals: Vec<u64> = table.bins.iter().map(|b| b.total_count).collect();
        assert_eq!(totals, vec![2, 1, 1]);
    }

    #[test]
    fn test_partition() {
        let config = BinConfig {
            width: 0.1,
            ..BinConfig::default()
        };
        let records: Vec<_> = (0..1000).map(|i| record(i as f64 * 0.037, i % 3 == 0)).collect();
        let table = aggregate(&records, &config).unwrap();

        for pair in table.bins.windows(2) {
            assert_eq!(pair[0].hi, pair[1].lo);
        }
        assert_eq!(table.bins[0].lo, 0.0);
        for bin in &table.bins {
            assert_relative_eq!(bin.hi - bin.lo, 0.1, epsilon = 1e-9);
        }
        for r in &records {
            let hits = table.bins.iter().filter(|b| b.contains(r.distance_nmi)).count();
            assert_eq!(hits, 1, "{}", r.distance_nmi);
        }
        assert_eq!(table.total_records(), 1000);
        let max = records.iter().map(|r| r.distance_nmi).fold(0.0, f64::max);
        assert!(table.bins.last().unwrap().contains(max));
    }

    #[test]
    fn test_all_present_interval() {
        let records = vec![record(42.0, true); 40];
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        let bin = table.bins.iter().find(|b| b.total_count > 0).unwrap();
        assert_eq!(bin.proportion, Some(1.0));
        let low = bin.ci_low.unwrap();
        assert!(low < 1.0);
        assert!(low > 0.85);
        assert_eq!(bin.ci_high, Some(1.0));
        assert!(bin.valid);
    }

    #[test]
    fn test_interval_brackets_proportion() {
        let records: Vec<_> = (0..500).map(|i| record((i % 97) as f64, i % 7 != 0)).collect();
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        for bin in &table.bins {
            match bin.proportion {
                Some(p) => {
                    assert!(bin.ci_low.unwrap() <= p);
                    assert!(p <= bin.ci_high.unwrap());
                }
                None => {
                    assert!(bin.ci_low.is_none());
                    assert!(bin.ci_high.is_none());
                }
            }
        }
    }

    #[test]
    fn test_validity_threshold_is_inclusive() {
        let mut records = vec![record(5.0, true); 30];
        records.extend(vec![record(15.0, true); 29]);
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        assert!(table.bins[0].valid);
        assert!(!table.bins[1].valid);
        assert_eq!(table.filtered, 1);
        assert_eq!(table.valid().count(), 1);

        let config = BinConfig {
            use_all: true,
            ..BinConfig::default()
        };
        let table = aggregate(&records, &config).unwrap();
        assert!(table.bins.iter().all(|b| b.valid));
        assert_eq!(table.filtered, 0);
    }

    #[test]
    fn test_gaps_are_not_filtered() {
        let mut records = vec![record(5.0, true); 50];
        records.extend(vec![record(45.0, false); 50]);
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        assert_eq!(table.bins.len(), 5);
        assert_eq!(table.valid().count(), 2);
        assert_eq!(table.filtered, 0);

        let config = BinConfig {
            use_all: true,
            ..BinConfig::default()
        };
        let table = aggregate(&records, &config).unwrap();
        assert_eq!(table.filtered, 0);
    }

    #[test]
    fn test_filtered_counts_thin_bins() {
        let mut records = vec![record(5.0, true); 50];
        records.extend(vec![record(25.0, true); 10]);
        records.extend(vec![record(45.0, false); 2]);
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        assert_eq!(table.filtered, 2);
    }

    #[test]
    fn test_use_all_still_excludes_empty_bins() {
        let records = [record(1.0, true), record(25.0, false)];
        let config = BinConfig {
            use_all: true,
            ..BinConfig::default()
        };
        let table = aggregate(&records, &config).unwrap();
        let valid: Vec<bool> = table.bins.iter().map(|b| b.valid).collect();
        assert_eq!(valid, vec![true, false, true]);
    }

    #[test]
    fn test_rejects_bad_distances() {
        let records = [record(f64::NAN, true), record(-1.0, true), record(3.0, true)];
        let table = aggregate(&records, &BinConfig::default()).unwrap();
        assert_eq!(table.rejected, 2);
        assert_eq!(table.total_records(), 1);
    }

    #[test]
    fn test_no_records() {
        let table = aggregate(&[], &BinConfig::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.filtered, 0);
    }

    #[test]
    fn test_invalid_config() {
        for width in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let config = BinConfig {
                width,
                ..BinConfig::default()
            };
            assert!(aggregate(&[], &config).is_err());
        }
        let config = BinConfig {
            confidence: 1.0,
            ..BinConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_too_many_bins() {
        let config = BinConfig {
            width: 1e-5,
            ..BinConfig::default()
        };
        let records = [record(1.0, true), record(200.0, true)];
        assert!(matches!(
            aggregate(&records, &config),
            Err(ReliabilityError::Parameter("bin width", _))
        ));
        assert!(aggregate(&[record(1e300, true)], &BinConfig::default()).is_err());
        // The same records fit at a coarser width.
        let config = BinConfig {
            width: 0.001,
            ..BinConfig::default()
        };
        let table = aggregate(&records, &config).unwrap();
        assert_eq!(table.total_records(), 2);
        assert!(table.bins.last().unwrap().contains(200.0));
    }

    #[test]
    fn test_bin_index() {
        assert_eq!(bin_index(0.0, 10.0), Some(0));
        assert_eq!(bin_index(9.99, 10.0), Some(0));
        assert_eq!(bin_index(10.0, 10.0), Some(1));
        assert_eq!(bin_index(0.3, 0.1), Some(2));
        assert_eq!(bin_index(-0.0, 10.0), Some(0));
        assert_eq!(bin_index(f64::INFINITY, 10.0), None);
        assert_eq!(bin_index(1e300, 10.0), None);
    }

    #[test]
    fn test_deterministic() {
        let records: Vec<_> = (0..2000)
            .map(|i| record((i * 7 % 311) as f64 / 1.3, i % 5 != 1))
            .collect();
        let a = aggregate(&records, &BinConfig::default()).unwrap();
        let b = aggregate(&records, &BinConfig::default()).unwrap();
        assert_eq!(a, b);
    }
}
