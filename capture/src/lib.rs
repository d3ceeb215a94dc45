//! # Capture
//!
//! `capture` reads what a readsb/tar1090 receiver leaves on disk: the
//! rolling history chunks of aircraft positions, the receiver location
//! and a few informational station settings.

pub mod chunk;
mod error;
pub mod readsb;
mod retry;
pub mod station;

pub use crate::{
    chunk::{discover, load_chunk, load_chunks, ChunkStats},
    error::CaptureError,
    readsb::{home_position, read_gain, HomePosition},
    retry::RetryPolicy,
    station::station_id,
};
