use crate::{
    options::{Analyze, StationArgs},
    report::{Report, Station},
};
use anyhow::Result;
use log::{info, warn};
use reliability::write_presence;
use std::{fs::File, io::BufWriter};

impl Analyze {
    pub fn run(&self) -> Result<()> {
        // Resolve the location before touching any capture data.
        let home = self.source.home()?;
        let pipeline = self.analysis.pipeline(home)?;
        info!("receiver at {}, {}", home.latitude, home.longitude);

        let captures = self.source.load()?;
        let (summary, records) = pipeline.presence(&captures);
        if let Some(path) = &self.presence_out {
            write_presence(&records, BufWriter::new(File::create(path)?))?;
            info!("wrote {} presence records to {}", records.len(), path.display());
        }
        let analysis = pipeline.analyzer().analyze(&records)?;
        let station = self.station.read()?;

        let report = Report::new(Some(&station), Some(&summary), &analysis);
        let stdout = std::io::stdout().lock();
        if self.json {
            report.write_json(stdout)
        } else {
            report.write_text(stdout)
        }
    }
}

impl StationArgs {
    /// Station metadata is informational; failures only warn.
    fn read(&self) -> Result<Station> {
        let policy = self.retry_policy()?;
        let gain_db = match capture::read_gain(&self.stats_file, &policy) {
            Ok(gain) => Some(gain),
            Err(e) => {
                warn!("unable to read current gain from {}: {e}", self.stats_file.display());
                None
            }
        };
        Ok(Station {
            id: capture::station_id(&self.station_file),
            gain_db,
        })
    }
}
