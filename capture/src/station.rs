use log::debug;
use std::{fs, path::Path};

pub const DEFAULT_DEVICE_FILE: &str = "/etc/wingbits/device";

/// Station identifier stored in `path`, trimmed. `None` if the file is
/// missing, unreadable or blank.
pub fn station_id(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let id = contents.trim();
            (!id.is_empty()).then(|| id.to_string())
        }
        Err(e) => {
            debug!("no station id in {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::station_id;
    use std::fs;

    #[test]
    fn test_station_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device");
        assert_eq!(station_id(&path), None);
        fs::write(&path, "  \n").unwrap();
        assert_eq!(station_id(&path), None);
        fs::write(&path, "quick-brown-fox\n").unwrap();
        assert_eq!(station_id(&path).as_deref(), Some("quick-brown-fox"));
    }
}
