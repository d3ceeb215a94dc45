//! Presence continuity: is an aircraft seen at one epoch seen again at
//! the next one?

use crate::observation::{Epoch, Observation};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observation reduced to what the reliability curve needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub aircraft_id: String,

    /// Distance from the receiver in nautical miles.
    pub distance_nmi: f64,

    /// Whether the same aircraft appears at the next epoch.
    pub present_next: bool,
}

/// Observations keyed by epoch, then by aircraft id.
///
/// Epochs iterate in ascending order. This order defines which epoch
/// is "next"; it is the order of sampling instants that actually
/// occurred, not a fixed time step.
#[derive(Debug, Clone, Default)]
pub struct EpochIndex {
    epochs: BTreeMap<Epoch, BTreeMap<String, Observation>>,
}

impl EpochIndex {
    /// Builds the index. A repeated aircraft id within one epoch keeps
    /// the last observation.
    pub fn new<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut epochs: BTreeMap<Epoch, BTreeMap<String, Observation>> = BTreeMap::new();
        let mut replaced = 0_usize;

        for observation in observations {
            let by_id = epochs.entry(observation.epoch).or_default();
            if by_id
                .insert(observation.aircraft_id.clone(), observation)
                .is_some()
            {
                replaced += 1;
            }
        }

        if replaced > 0 {
            debug!("replaced {replaced} duplicate aircraft ids within an epoch");
        }

        Self { epochs }
    }

    /// Number of distinct epochs.
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Total number of (epoch, aircraft) observations.
    pub fn observation_count(&self) -> usize {
        self.epochs.values().map(BTreeMap::len).sum()
    }

    /// Returns the observations recorded at `epoch`, keyed by aircraft.
    pub fn get(&self, epoch: Epoch) -> Option<&BTreeMap<String, Observation>> {
        self.epochs.get(&epoch)
    }

    /// Epochs in ascending order.
    pub fn epochs(&self) -> impl Iterator<Item = Epoch> + '_ {
        self.epochs.keys().copied()
    }

    /// First and last epoch, if any.
    pub fn span(&self) -> Option<(Epoch, Epoch)> {
        let first = self.epochs.keys().next()?;
        let last = self.epochs.keys().next_back()?;
        Some((*first, *last))
    }

    /// Labels every observation with whether its aircraft is present at
    /// the following epoch.
    ///
    /// The last epoch has no successor, so all of its observations are
    /// labeled not present. Records are ordered by epoch, then by
    /// aircraft id. Each epoch only reads its own and its successor's
    /// membership, so epochs are processed in parallel.
    pub fn presence(&self) -> Vec<PresenceRecord> {
        let epochs: Vec<&BTreeMap<String, Observation>> = self.epochs.values().collect();

        let records: Vec<PresenceRecord> = (0..epochs.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let current = epochs[i];
                let next = epochs.get(i + 1).copied();
                current.values().map(move |observation| PresenceRecord {
                    aircraft_id: observation.aircraft_id.clone(),
                    distance_nmi: observation.distance_nmi,
                    present_next: next.is_some_and(|n| n.contains_key(&observation.aircraft_id)),
                })
            })
            .collect();

        debug!(
            "{} presence records over {} epochs, {} present at next epoch",
            records.len(),
            epochs.len(),
            records.iter().filter(|r| r.present_next).count()
        );

        records
    }
}
