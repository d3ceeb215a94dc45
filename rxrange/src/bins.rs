use crate::{options::Bins, report::Report};
use anyhow::{Context, Result};
use reliability::read_presence;
use std::fs::File;

impl Bins {
    pub fn run(&self) -> Result<()> {
        let analyzer = self.analysis.analyzer()?;
        let file = File::open(&self.input)
            .with_context(|| format!("opening {}", self.input.display()))?;
        let records = read_presence(file)
            .with_context(|| format!("reading {}", self.input.display()))?;
        let analysis = analyzer.analyze(&records)?;

        let report = Report::new(None, None, &analysis);
        let stdout = std::io::stdout().lock();
        if self.json {
            report.write_json(stdout)
        } else {
            report.write_text(stdout)
        }
    }
}
