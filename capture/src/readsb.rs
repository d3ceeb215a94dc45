//! Receiver settings published by readsb.

use crate::{CaptureError, RetryPolicy};
use log::debug;
use regex::Regex;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

pub const DEFAULT_CONFIG_FILE: &str = "/etc/default/readsb";
pub const DEFAULT_STATS_FILE: &str = "/run/readsb/stats.json";

/// Receiver location in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomePosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Reads the receiver location from a readsb defaults file.
///
/// A missing or unreadable file is reported the same way as a file
/// without a location, since the remedy is the same.
pub fn home_position(path: &Path) -> Result<HomePosition, CaptureError> {
    let text = fs::read_to_string(path).map_err(|e| {
        debug!("reading {}: {e}", path.display());
        CaptureError::NoHome(path.to_path_buf())
    })?;
    parse_home_position(&text).ok_or_else(|| CaptureError::NoHome(path.to_path_buf()))
}

/// Matches `--lat <deg> --lon <deg>` with the two options adjacent.
/// Values stop at whitespace or a quote, since the options usually sit
/// inside a quoted shell variable.
fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"--lat\s+([^\s"']+)\s+--lon\s+([^\s"']+)"#).unwrap())
}

/// Returns the first usable `--lat <deg> --lon <deg>` pair in `text`,
/// as written by `readsb-set-location`:
///
/// ```text
/// DECODER_OPTIONS="--lat 44.2708 --lon -71.3033 --max-range 450"
/// ```
pub fn parse_home_position(text: &str) -> Option<HomePosition> {
    location_pattern().captures_iter(text).find_map(|caps| {
        let latitude: f64 = caps[1].parse().ok()?;
        let longitude: f64 = caps[2].parse().ok()?;
        ((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)).then_some(
            HomePosition {
                latitude,
                longitude,
            },
        )
    })
}

/// Reads the current tuner gain (dB) from readsb's `stats.json`,
/// retrying while the file is missing or half written.
pub fn read_gain(path: &Path, policy: &RetryPolicy) -> Result<f64, CaptureError> {
    policy.run("read gain", || read_gain_once(path))
}

fn read_gain_once(path: &Path) -> Result<f64, CaptureError> {
    let stats: Value = serde_json::from_slice(&fs::read(path)?)?;
    stats
        .get("gain_db")
        .and_then(Value::as_f64)
        .ok_or_else(|| CaptureError::MissingKey("gain_db", PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::{home_position, parse_home_position, read_gain, HomePosition};
    use crate::{CaptureError, RetryPolicy};
    use std::{fs, time::Duration};

    const READSB_DEFAULTS: &str = r#"# readsb configuration
RECEIVER_OPTIONS="--device 0 --device-type rtlsdr --gain -10 --ppm 0"
DECODER_OPTIONS="--lat 44.2708 --lon -71.3033 --max-range 450 --write-json-every 1"
NET_OPTIONS="--net --net-heartbeat 60"
"#;

    fn no_wait() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(Duration::ZERO)
    }

    #[test]
    fn test_parse_home_position() {
        assert_eq!(
            parse_home_position(READSB_DEFAULTS),
            Some(HomePosition {
                latitude: 44.2708,
                longitude: -71.3033,
            })
        );
        assert_eq!(
            parse_home_position("DECODER_OPTIONS=\"--lat 51.47 --lon -0.4543\"\n"),
            Some(HomePosition {
                latitude: 51.47,
                longitude: -0.4543,
            })
        );
        assert_eq!(
            parse_home_position("DECODER_OPTIONS='--max-range 450 --lat 44.1 --lon=-71.2'"),
            None
        );
        assert_eq!(
            parse_home_position(r#"OPTS="--lat -33.9 --lon 151""#),
            Some(HomePosition {
                latitude: -33.9,
                longitude: 151.0,
            })
        );
    }

    #[test]
    fn test_no_home_position() {
        for text in [
            "",
            "DECODER_OPTIONS=\"--max-range 450\"",
            "--lat 44.1",
            "--lat 44.1 --max-range 450 --lon -71.2",
            "--lat north --lon -71.2",
            "--lat 95.0 --lon -71.2",
        ] {
            assert_eq!(parse_home_position(text), None, "{text}");
        }
    }

    #[test]
    fn test_home_position_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readsb");
        assert!(matches!(home_position(&path), Err(CaptureError::NoHome(_))));

        fs::write(&path, "NET_OPTIONS=\"--net\"\n").unwrap();
        let err = home_position(&path).unwrap_err();
        assert!(err.to_string().contains("readsb-set-location"));

        fs::write(&path, READSB_DEFAULTS).unwrap();
        assert_eq!(home_position(&path).unwrap().latitude, 44.2708);
    }

    #[test]
    fn test_read_gain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, r#"{"now": 1700000000.0, "gain_db": 49.6, "last1min": {}}"#).unwrap();
        assert_eq!(read_gain(&path, &no_wait()).unwrap(), 49.6);

        fs::write(&path, r#"{"now": 1700000000.0}"#).unwrap();
        assert!(matches!(
            read_gain(&path, &no_wait()),
            Err(CaptureError::MissingKey("gain_db", _))
        ));

        fs::write(&path, r#"{"gain_db": 4"#).unwrap();
        assert!(matches!(read_gain(&path, &no_wait()), Err(CaptureError::Json(_))));

        assert!(matches!(
            read_gain(&dir.path().join("missing.json"), &no_wait()),
            Err(CaptureError::Io(_))
        ));
    }
}
