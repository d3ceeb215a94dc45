use crate::options::Presence;
use anyhow::Result;
use log::info;
use reliability::{write_presence, Pipeline};
use std::{fs::File, io::BufWriter};

impl Presence {
    pub fn run(&self) -> Result<()> {
        let home = self.source.home()?;
        let pipeline = Pipeline::builder()
            .home(home.latitude, home.longitude)
            .build()?;
        let captures = self.source.load()?;
        let (_, records) = pipeline.presence(&captures);
        write_presence(&records, BufWriter::new(File::create(&self.out)?))?;
        info!("wrote {} presence records to {}", records.len(), self.out.display());
        Ok(())
    }
}
