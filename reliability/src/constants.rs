/// Mean earth radius in meters, as used by the haversine distance.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_000.0;

/// Meters per international nautical mile.
pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

/// Default width of a distance bin (nautical miles).
pub const DEFAULT_BIN_WIDTH: f64 = 10.0;

/// Default minimum number of records a bin needs before its
/// proportion is considered statistically meaningful.
pub const DEFAULT_MIN_SAMPLES: u64 = 30;

/// Default two-sided confidence level for bin intervals.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Upper bound on the number of distance bins one table may hold.
pub const MAX_BINS: usize = 1_000_000;
