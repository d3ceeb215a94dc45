//! Raw capture records and their normalization into observations.

use crate::math::haversine_nmi;
use geo::Coord;
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sampling instant, in milliseconds since the Unix epoch.
///
/// Observations are grouped by exact equality on this value; no
/// tolerance window is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub i64);

impl Epoch {
    /// Returns the epoch for a fractional Unix timestamp in seconds,
    /// rounded to the nearest millisecond.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        let millis = (secs * 1000.0).round();
        // i64::MAX as f64 rounds up, so test against the next lower
        // representable bound.
        if millis.is_finite() && millis.abs() < 9.2e18 {
            Some(Self(millis as i64))
        } else {
            None
        }
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One aircraft entry inside a raw capture. Position fields are
/// optional because partial reports are common.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub aircraft_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Everything the receiver reported at one sampling instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapture {
    pub epoch: Epoch,
    pub entries: Vec<RawEntry>,
}

/// One transponder sighting at one sampling epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub aircraft_id: String,

    pub epoch: Epoch,

    /// Reported position (`x` is longitude, `y` is latitude, degrees).
    pub position: Coord<f64>,

    /// Great-circle distance from the receiver in nautical miles.
    pub distance_nmi: f64,
}

impl Observation {
    pub fn latitude(&self) -> f64 {
        self.position.y
    }

    pub fn longitude(&self) -> f64 {
        self.position.x
    }
}

/// Converts raw captures into observations relative to `home`.
///
/// Entries without both latitude and longitude are dropped silently.
/// Entries with a non-finite or out of range position are malformed
/// and dropped with a warning. Captures are processed in parallel but
/// the output keeps input order, so duplicate resolution downstream
/// (last write wins) is deterministic.
pub fn normalize(captures: &[RawCapture], home: Coord<f64>) -> Vec<Observation> {
    let (observations, counts) = captures
        .par_iter()
        .map(|capture| normalize_capture(capture, home))
        .reduce(
            || (Vec::new(), DropCounts::default()),
            |(mut obs, counts), (more, more_counts)| {
                obs.extend(more);
                (obs, counts + more_counts)
            },
        );

    if counts.malformed > 0 {
        warn!(
            "dropped {} entries with an invalid position",
            counts.malformed
        );
    }
    debug!(
        "normalized {} observations from {} captures, {} entries without position",
        observations.len(),
        captures.len(),
        counts.no_position
    );

    observations
}

#[derive(Debug, Default, Clone, Copy)]
struct DropCounts {
    no_position: usize,
    malformed: usize,
}

impl std::ops::Add for DropCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            no_position: self.no_position + rhs.no_position,
            malformed: self.malformed + rhs.malformed,
        }
    }
}

fn normalize_capture(capture: &RawCapture, home: Coord<f64>) -> (Vec<Observation>, DropCounts) {
    let mut counts = DropCounts::default();
    let mut observations = Vec::with_capacity(capture.entries.len());

    for entry in &capture.entries {
        let (Some(latitude), Some(longitude)) = (entry.latitude, entry.longitude) else {
            counts.no_position += 1;
            continue;
        };
        if !valid_position(latitude, longitude) {
            counts.malformed += 1;
            continue;
        }
        let position = Coord {
            x: longitude,
            y: latitude,
        };
        observations.push(Observation {
            aircraft_id: entry.aircraft_id.clone(),
            epoch: capture.epoch,
            position,
            distance_nmi: haversine_nmi(home, position),
        });
    }

    (observations, counts)
}

pub(crate) fn valid_position(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
