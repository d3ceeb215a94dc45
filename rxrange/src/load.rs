use crate::{options::Source, progress};
use anyhow::Result;
use log::warn;
use reliability::RawCapture;

impl Source {
    /// Reads every capture chunk in the data directory.
    pub fn load(&self) -> Result<Vec<RawCapture>> {
        let paths = capture::discover(&self.data_dir)?;
        if paths.is_empty() {
            warn!("no chunk_*.gz files in {}", self.data_dir.display());
        }
        let pb = progress::bar(
            format!("Loading {}", self.data_dir.display()),
            paths.len() as u64,
        );
        let (captures, _) = capture::load_chunks(&paths, || pb.inc(1));
        pb.finish_and_clear();
        Ok(captures)
    }
}
