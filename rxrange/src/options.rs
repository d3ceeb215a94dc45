use anyhow::{anyhow, Error as AnyError, Result};
use capture::{HomePosition, RetryPolicy};
use clap::{Args, Parser, ValueEnum};
use reliability::{
    constants::{DEFAULT_BIN_WIDTH, DEFAULT_CONFIDENCE, DEFAULT_MIN_SAMPLES},
    Analyzer, BinConfig, Knee, PiecewiseLinear, Pipeline, RangeFitter,
};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Estimate how reliably an ADS-B receiver tracks aircraft, and out to
/// what distance.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Analyze captured chunks and print a reliability report.
    Analyze(Analyze),

    /// Write the presence table of captured chunks.
    Presence(Presence),

    /// Bin and fit a previously written presence table.
    Bins(Bins),
}

#[derive(Debug, Clone, Args)]
pub struct Analyze {
    #[command(flatten)]
    pub source: Source,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(flatten)]
    pub station: StationArgs,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Also write the presence table to this file.
    #[arg(long)]
    pub presence_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct Presence {
    #[command(flatten)]
    pub source: Source,

    /// Output file.
    #[arg(short, long, default_value = "output.csv")]
    pub out: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct Bins {
    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Presence table written by `presence` or `analyze --presence-out`.
    pub input: PathBuf,
}

/// Where captures and the receiver location come from.
#[derive(Debug, Clone, Args)]
pub struct Source {
    /// Directory holding tar1090 `chunk_*.gz` files.
    #[arg(short, long, default_value = "/run/tar1090")]
    pub data_dir: PathBuf,

    /// Receiver location "lat,lon". Read from the readsb defaults file
    /// when absent.
    #[arg(long)]
    pub home: Option<LatLon>,

    /// readsb defaults file holding `--lat` and `--lon`.
    #[arg(long, default_value = capture::readsb::DEFAULT_CONFIG_FILE)]
    pub readsb_config: PathBuf,
}

impl Source {
    pub fn home(&self) -> Result<HomePosition> {
        match self.home {
            Some(LatLon(home)) => Ok(home),
            None => Ok(capture::home_position(&self.readsb_config)?),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct AnalysisArgs {
    /// Distance bin width, in nautical miles.
    #[arg(short, long, default_value_t = DEFAULT_BIN_WIDTH)]
    pub bin_width: f64,

    /// Records a bin needs for valid statistics.
    #[arg(short, long, default_value_t = DEFAULT_MIN_SAMPLES)]
    pub min_samples: u64,

    /// Calculate statistics on range bins even if there is
    /// insufficient data for valid statistics.
    #[arg(short = 'a', long)]
    pub use_all: bool,

    /// Range model.
    #[arg(short, long, value_enum, default_value_t = FitMethod::Piecewise)]
    pub fit: FitMethod,

    /// Confidence level of per-bin intervals.
    #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f64,
}

impl AnalysisArgs {
    pub fn pipeline(&self, home: HomePosition) -> Result<Pipeline> {
        let builder = Pipeline::builder()
            .home(home.latitude, home.longitude)
            .bin_width(self.bin_width)
            .min_samples(self.min_samples)
            .use_all(self.use_all)
            .confidence(self.confidence);
        let builder = match self.fit {
            FitMethod::Piecewise => builder.fitter(PiecewiseLinear::default()),
            FitMethod::Knee => builder.fitter(Knee::default()),
        };
        Ok(builder.build()?)
    }

    pub fn analyzer(&self) -> Result<Analyzer> {
        let config = BinConfig {
            width: self.bin_width,
            min_samples: self.min_samples,
            use_all: self.use_all,
            confidence: self.confidence,
        };
        let fitter: Box<dyn RangeFitter> = match self.fit {
            FitMethod::Piecewise => Box::new(PiecewiseLinear::default()),
            FitMethod::Knee => Box::new(Knee::default()),
        };
        Ok(Analyzer::new(config, fitter)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FitMethod {
    /// Flat then linearly declining least-squares fit.
    Piecewise,

    /// Kneedle knee detection; reports the range only.
    Knee,
}

/// Informational station metadata.
#[derive(Debug, Clone, Args)]
pub struct StationArgs {
    /// File holding the station id.
    #[arg(long, default_value = capture::station::DEFAULT_DEVICE_FILE)]
    pub station_file: PathBuf,

    /// readsb statistics file holding the current gain.
    #[arg(long, default_value = capture::readsb::DEFAULT_STATS_FILE)]
    pub stats_file: PathBuf,

    /// Attempts at reading the statistics file.
    #[arg(long, default_value_t = 3)]
    pub stats_attempts: u32,

    /// Seconds between attempts at reading the statistics file.
    #[arg(long, default_value_t = 2.0)]
    pub stats_delay: f64,
}

impl StationArgs {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let delay = Duration::try_from_secs_f64(self.stats_delay)
            .map_err(|e| anyhow!("invalid stats delay {}: {e}", self.stats_delay))?;
        Ok(RetryPolicy::default()
            .with_attempts(self.stats_attempts)
            .with_initial_delay(delay))
    }
}

/// A "lat,lon" pair in degrees.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct LatLon(pub HomePosition);

impl FromStr for LatLon {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_str, lon_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lon"))?;
        let latitude = f64::from_str(lat_str.trim())?;
        let longitude = f64::from_str(lon_str.trim())?;
        Ok(Self(HomePosition {
            latitude,
            longitude,
        }))
    }
}
