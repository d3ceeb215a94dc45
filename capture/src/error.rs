use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "latitude and longitude not found in {}, set your location using \
         \"sudo readsb-set-location <lat> <lon>\" and try again",
        .0.display()
    )]
    NoHome(PathBuf),

    #[error("key '{0}' not found in {}", .1.display())]
    MissingKey(&'static str, PathBuf),
}
