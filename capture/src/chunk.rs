//! tar1090 history chunks.
//!
//! A chunk is a gzip'd JSON document holding a list of snapshots, each
//! the full aircraft table at one instant:
//!
//! ```text
//! {"files": [
//!     {"now": 1700000000.1, "aircraft": [["a1b2c3", .., .., .., 44.1, -71.2, ..], ..]},
//!     ..
//! ]}
//! ```
//!
//! Aircraft entries are positional arrays. Index 0 is the transponder
//! id, 4 the latitude and 5 the longitude.

use crate::CaptureError;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use rayon::prelude::*;
use reliability::{Epoch, RawCapture, RawEntry};
use serde::Deserialize;
use serde_json::Value;
use std::{
    ffi::OsStr,
    fs::{self, File},
    io::{BufReader, Read},
    ops::AddAssign,
    path::{Path, PathBuf},
};

const ID_INDEX: usize = 0;
const LATITUDE_INDEX: usize = 4;
const LONGITUDE_INDEX: usize = 5;

/// Snapshots are checked one at a time by [`parse_snapshot`].
#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    files: Vec<Value>,
}

/// Entry counts for one or more chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub snapshots: usize,

    /// Aircraft entries kept, with or without a position.
    pub entries: usize,

    /// Entries dropped because of their shape.
    pub malformed_entries: usize,

    /// Snapshots dropped for lacking a usable timestamp or aircraft
    /// list.
    pub malformed_snapshots: usize,
}

impl AddAssign for ChunkStats {
    fn add_assign(&mut self, rhs: Self) {
        self.snapshots += rhs.snapshots;
        self.entries += rhs.entries;
        self.malformed_entries += rhs.malformed_entries;
        self.malformed_snapshots += rhs.malformed_snapshots;
    }
}

/// Returns the `chunk_*.gz` files in `dir`, sorted by name.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let mut paths = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let path = dir_entry?.path();
        let is_chunk = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.starts_with("chunk_") && name.ends_with(".gz"));
        if is_chunk && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    debug!("found {} chunks in {}", paths.len(), dir.display());
    Ok(paths)
}

/// Decompresses and decodes one chunk file.
pub fn load_chunk(path: &Path) -> Result<(Vec<RawCapture>, ChunkStats), CaptureError> {
    let file = File::open(path)?;
    parse_chunk(GzDecoder::new(BufReader::new(file)))
}

/// Decodes an uncompressed chunk document.
pub fn parse_chunk<R: Read>(rdr: R) -> Result<(Vec<RawCapture>, ChunkStats), CaptureError> {
    let chunk: Chunk = serde_json::from_reader(rdr)?;
    let mut stats = ChunkStats::default();
    let mut captures = Vec::with_capacity(chunk.files.len());

    for snapshot in &chunk.files {
        let Some((epoch, aircraft)) = parse_snapshot(snapshot) else {
            stats.malformed_snapshots += 1;
            continue;
        };
        stats.snapshots += 1;
        let mut entries = Vec::with_capacity(aircraft.len());
        for value in aircraft {
            match parse_entry(value) {
                Some(entry) => entries.push(entry),
                None => stats.malformed_entries += 1,
            }
        }
        stats.entries += entries.len();
        captures.push(RawCapture { epoch, entries });
    }

    Ok((captures, stats))
}

/// A snapshot needs a numeric `now`. A missing `aircraft` list means
/// nothing was in view.
fn parse_snapshot(snapshot: &Value) -> Option<(Epoch, &[Value])> {
    let epoch = snapshot.get("now")?.as_f64().and_then(Epoch::from_secs_f64)?;
    let aircraft: &[Value] = match snapshot.get("aircraft") {
        None | Some(Value::Null) => &[],
        Some(value) => value.as_array()?.as_slice(),
    };
    Some((epoch, aircraft))
}

fn parse_entry(value: &Value) -> Option<RawEntry> {
    let fields = value.as_array()?;
    let aircraft_id = fields.get(ID_INDEX)?.as_str()?.to_string();
    let latitude = coordinate(fields.get(LATITUDE_INDEX))?;
    let longitude = coordinate(fields.get(LONGITUDE_INDEX))?;
    Some(RawEntry {
        aircraft_id,
        latitude,
        longitude,
    })
}

/// `Some(None)` for an absent position, `None` for a malformed one.
fn coordinate(field: Option<&Value>) -> Option<Option<f64>> {
    match field {
        None | Some(Value::Null) => Some(None),
        Some(Value::Number(n)) => n.as_f64().map(Some),
        Some(_) => None,
    }
}

/// Loads every chunk in `paths` in parallel, calling `on_chunk` once
/// per file whether or not it loaded.
///
/// Chunks that cannot be opened or decoded are skipped with a warning.
/// Captures are returned in `paths` order.
pub fn load_chunks<F>(paths: &[PathBuf], on_chunk: F) -> (Vec<RawCapture>, ChunkStats)
where
    F: Fn() + Sync,
{
    let loaded: Vec<Option<(Vec<RawCapture>, ChunkStats)>> = paths
        .par_iter()
        .map(|path| {
            let result = load_chunk(path);
            on_chunk();
            match result {
                Ok(loaded) => Some(loaded),
                Err(e) => {
                    warn!("skipping chunk {}: {e}", path.display());
                    None
                }
            }
        })
        .collect();

    let skipped = loaded.iter().filter(|l| l.is_none()).count();
    let mut captures = Vec::new();
    let mut stats = ChunkStats::default();
    for (chunk_captures, chunk_stats) in loaded.into_iter().flatten() {
        captures.extend(chunk_captures);
        stats += chunk_stats;
    }

    if stats.malformed_entries > 0 || stats.malformed_snapshots > 0 {
        warn!(
            "dropped {} malformed aircraft entries and {} snapshots without a timestamp",
            stats.malformed_entries, stats.malformed_snapshots
        );
    }
    info!(
        "loaded {} snapshots with {} aircraft entries from {} chunks, {skipped} skipped",
        stats.snapshots,
        stats.entries,
        paths.len() - skipped
    );

    (captures, stats)
}
