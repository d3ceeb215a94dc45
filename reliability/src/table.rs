//! Delimited text persistence of presence records.
//!
//! One record per row, no header:
//!
//! ```text
//! <aircraft_id>,<distance_nmi>,<present_next as 0|1>
//! ```
//!
//! Saving the presence table lets aggregation and fitting be re-run
//! without the raw captures.

use crate::{presence::PresenceRecord, ReliabilityError};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::io::{Read, Write};

/// Writes `records` to `wtr`, one line each. Ids holding a comma,
/// quote or line break are quoted.
pub fn write_presence<W: Write>(
    records: &[PresenceRecord],
    wtr: W,
) -> Result<(), ReliabilityError> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(wtr);
    for PresenceRecord {
        aircraft_id,
        distance_nmi,
        present_next,
    } in records
    {
        let distance = distance_nmi.to_string();
        let present = if *present_next { "1" } else { "0" };
        wtr.write_record([aircraft_id.as_str(), distance.as_str(), present])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads records written by [`write_presence`], or by hand as
/// `id, distance, 0|1`. Blank lines are skipped; anything else that
/// does not parse is an error naming the line.
///
/// Only the distance and presence fields are trimmed. The id is kept
/// as written.
pub fn read_presence<R: Read>(rdr: R) -> Result<Vec<PresenceRecord>, ReliabilityError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(rdr);
    let mut records = Vec::new();
    let mut row = StringRecord::new();
    while rdr.read_record(&mut row)? {
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let line = row.position().map_or(0, |pos| pos.line());
        let record = parse_row(&row).map_err(|reason| ReliabilityError::Table {
            line: usize::try_from(line).unwrap_or(usize::MAX),
            reason,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn parse_row(row: &StringRecord) -> Result<PresenceRecord, String> {
    let (Some(aircraft_id), Some(distance), Some(present), None) =
        (row.get(0), row.get(1), row.get(2), row.get(3))
    else {
        return Err(format!("expected 3 fields, got {}", row.len()));
    };

    let present_next = match present.trim() {
        "1" => true,
        "0" => false,
        other => return Err(format!("presence {other:?} is not 0 or 1")),
    };
    let distance_nmi: f64 = distance
        .trim()
        .parse()
        .map_err(|e| format!("distance {:?}: {e}", distance.trim()))?;
    if !(distance_nmi.is_finite() && distance_nmi >= 0.0) {
        return Err(format!("distance {distance_nmi} is not a non-negative number"));
    }

    Ok(PresenceRecord {
        aircraft_id: aircraft_id.to_string(),
        distance_nmi,
        present_next,
    })
}
