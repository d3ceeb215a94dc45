use anyhow::Result;
use chrono::DateTime;
use reliability::{Analysis, Bin, CaptureSummary, Epoch, RangeEstimate};
use serde::Serialize;
use std::io::Write;

/// Informational station metadata shown above the results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Station {
    pub id: Option<String>,
    pub gain_db: Option<f64>,
}

/// Everything one run prints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<&'a Station>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a CaptureSummary>,

    pub analysis: &'a Analysis,

    pub advice: Option<&'static str>,
}

impl<'a> Report<'a> {
    pub fn new(
        station: Option<&'a Station>,
        summary: Option<&'a CaptureSummary>,
        analysis: &'a Analysis,
    ) -> Self {
        Self {
            station,
            summary,
            analysis,
            advice: analysis.estimate.advice(),
        }
    }

    pub fn write_json<W: Write>(&self, mut out: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut out, self)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_text<W: Write>(&self, mut out: W) -> Result<()> {
        let table = &self.analysis.table;
        writeln!(
            out,
            "{:>16} {:>10} {:>8} {:>8} {:>8}",
            "distance (nmi)", "proportion", "total", "ci low", "ci high"
        )?;
        for bin in table.bins.iter().filter(|bin| !bin.is_empty()) {
            write_bin(&mut out, bin)?;
        }
        if table.filtered > 1 {
            writeln!(
                out,
                "\n{} range bins had too few records for valid statistics",
                table.filtered
            )?;
        }
        writeln!(out)?;

        if let Some(station) = self.station {
            writeln!(out, "Wingbits ID: {}", station.id.as_deref().unwrap_or("unknown"))?;
            match station.gain_db {
                Some(gain) => writeln!(out, "Gain:        {gain}")?,
                None => writeln!(out, "Gain:        unknown")?,
            }
        }
        if let Some(summary) = self.summary {
            let range = summary
                .first_epoch
                .zip(summary.last_epoch)
                .and_then(|(first, last)| date_range(first, last));
            writeln!(
                out,
                "Data Range:  {}",
                range.as_deref().unwrap_or("No data available")
            )?;
        }
        writeln!(out)?;

        match &self.analysis.estimate {
            RangeEstimate::Fitted(model) => {
                writeln!(out, "Estimated ...")?;
                if let Some(y0) = model.near_range_reliability {
                    writeln!(out, "   Near range reliability:          {:.1}%", 100.0 * y0)?;
                }
                writeln!(
                    out,
                    "   Maximum reliable range:          {:.1} nautical miles",
                    model.max_reliable_range
                )?;
                if let Some(loss) = model.loss_over(10.0) {
                    writeln!(
                        out,
                        "   Far range reliability loss:      {:.2}% each 10 nautical miles",
                        100.0 * loss
                    )?;
                }
            }
            estimate => {
                writeln!(out, "No range estimate: {}.", estimate.describe())?;
                if let Some(advice) = self.advice {
                    writeln!(out, "{advice}")?;
                }
            }
        }
        Ok(())
    }
}

fn write_bin<W: Write>(out: &mut W, bin: &Bin) -> std::io::Result<()> {
    let label = format!("[{}, {})", edge(bin.lo), edge(bin.hi));
    let proportion = bin.proportion.unwrap_or(f64::NAN);
    match (bin.valid, bin.ci_low, bin.ci_high) {
        (true, Some(low), Some(high)) => writeln!(
            out,
            "{label:>16} {proportion:>10.3} {:>8} {low:>8.3} {high:>8.3}",
            bin.total_count
        ),
        _ => writeln!(out, "{label:>16} {proportion:>10.3} {:>8}", bin.total_count),
    }
}

/// Bin edges are multiples of the width, so strip float noise such as
/// `0.30000000000000004`.
fn edge(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// "2023-11-14 22:13 to 2023-11-15 01:21 (3 hours, 7 minutes)", in UTC.
pub fn date_range(first: Epoch, last: Epoch) -> Option<String> {
    let start = DateTime::from_timestamp_millis(first.as_millis())?;
    let end = DateTime::from_timestamp_millis(last.as_millis())?;
    let elapsed = (end - start).num_minutes();
    Some(format!(
        "{} to {} ({} hours, {} minutes)",
        start.format("%Y-%m-%d %H:%M"),
        end.format("%Y-%m-%d %H:%M"),
        elapsed / 60,
        elapsed % 60
    ))
}
