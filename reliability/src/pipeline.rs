//! End to end reliability analysis: captures in, bin table and range
//! estimate out.

use crate::{
    bins::{aggregate, BinConfig, BinTable},
    fit::{FitFailure, FittedRangeModel, PiecewiseLinear, RangeFitter},
    observation::{normalize, valid_position, Epoch, RawCapture},
    presence::{EpochIndex, PresenceRecord},
    ReliabilityError,
};
use geo::Coord;
use log::{info, warn};
use serde::Serialize;

/// A configured analysis run anchored at one receiver position.
pub struct Pipeline {
    home: Coord<f64>,
    analyzer: Analyzer,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder {
            home: None,
            config: BinConfig::default(),
            fitter: None,
        }
    }

    /// Receiver position (`x` is longitude, `y` is latitude).
    pub fn home(&self) -> Coord<f64> {
        self.home
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Normalizes `captures` and labels every observation with whether
    /// its aircraft is seen again at the next epoch.
    pub fn presence(&self, captures: &[RawCapture]) -> (CaptureSummary, Vec<PresenceRecord>) {
        let observations = normalize(captures, self.home);
        let index = EpochIndex::new(observations);
        let summary = CaptureSummary::new(captures.len(), &index);
        info!(
            "{} observations over {} epochs from {} captures",
            summary.observations, summary.epochs, summary.captures
        );
        (summary, index.presence())
    }

    /// Runs every stage over `captures`.
    pub fn run(&self, captures: &[RawCapture]) -> Result<Report, ReliabilityError> {
        let (summary, records) = self.presence(captures);
        let analysis = self.analyzer.analyze(&records)?;
        Ok(Report { summary, analysis })
    }
}

pub struct PipelineBuilder {
    /// Receiver position (required).
    home: Option<Coord<f64>>,

    config: BinConfig,

    /// Range model strategy (defaults to [`PiecewiseLinear`]).
    fitter: Option<Box<dyn RangeFitter>>,
}

impl PipelineBuilder {
    /// Receiver position in degrees (required).
    #[must_use]
    pub fn home(mut self, latitude: f64, longitude: f64) -> Self {
        self.home = Some(Coord {
            x: longitude,
            y: latitude,
        });
        self
    }

    /// Bin width (nautical miles, defaults to 10).
    #[must_use]
    pub fn bin_width(mut self, nmi: f64) -> Self {
        self.config.width = nmi;
        self
    }

    /// Minimum records per bin for valid statistics (defaults to 30).
    #[must_use]
    pub fn min_samples(mut self, min_samples: u64) -> Self {
        self.config.min_samples = min_samples;
        self
    }

    /// Disable the validity filter (defaults to false).
    #[must_use]
    pub fn use_all(mut self, use_all: bool) -> Self {
        self.config.use_all = use_all;
        self
    }

    /// Confidence level of per-bin intervals (defaults to 0.95).
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.config.confidence = confidence;
        self
    }

    #[must_use]
    pub fn fitter<F: RangeFitter + 'static>(mut self, fitter: F) -> Self {
        self.fitter = Some(Box::new(fitter));
        self
    }

    pub fn build(self) -> Result<Pipeline, ReliabilityError> {
        let home = self.home.ok_or(ReliabilityError::Builder("home"))?;
        if !valid_position(home.y, home.x) {
            return Err(ReliabilityError::Parameter(
                "home position",
                format!("{}, {} is not a latitude, longitude pair", home.y, home.x),
            ));
        }
        let fitter: Box<dyn RangeFitter> = match self.fitter {
            Some(fitter) => fitter,
            None => Box::new(PiecewiseLinear::default()),
        };
        let analyzer = Analyzer::new(self.config, fitter)?;
        Ok(Pipeline { home, analyzer })
    }
}

/// Aggregation and fitting, the stages that only need presence
/// records. Usable on its own to re-analyze a saved presence table.
pub struct Analyzer {
    config: BinConfig,
    fitter: Box<dyn RangeFitter>,
}

impl Analyzer {
    pub fn new(config: BinConfig, fitter: Box<dyn RangeFitter>) -> Result<Self, ReliabilityError> {
        config.validate()?;
        Ok(Self { config, fitter })
    }

    pub fn config(&self) -> &BinConfig {
        &self.config
    }

    pub fn analyze(&self, records: &[PresenceRecord]) -> Result<Analysis, ReliabilityError> {
        let table = aggregate(records, &self.config)?;
        let estimate = if table.total_records() == 0 {
            RangeEstimate::NoData
        } else {
            RangeEstimate::from(self.fitter.fit(&table.bins))
        };
        match &estimate {
            RangeEstimate::Fitted(model) => info!(
                "{} fit: maximum reliable range {:.1} nmi",
                self.fitter.name(),
                model.max_reliable_range
            ),
            other => warn!("{} fit: {}", self.fitter.name(), other.describe()),
        }
        Ok(Analysis {
            fitter: self.fitter.name(),
            table,
            estimate,
        })
    }
}

/// Outcome of model fitting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RangeEstimate {
    /// No presence records at all.
    NoData,

    /// Too few bins passed the validity filter.
    Insufficient { valid_bins: usize, required: usize },

    /// The fitter ran but produced no model.
    FitFailed { reason: String },

    Fitted(FittedRangeModel),
}

impl From<Result<FittedRangeModel, FitFailure>> for RangeEstimate {
    fn from(result: Result<FittedRangeModel, FitFailure>) -> Self {
        match result {
            Ok(model) => Self::Fitted(model),
            Err(FitFailure::Insufficient {
                valid_bins,
                required,
            }) => Self::Insufficient {
                valid_bins,
                required,
            },
            Err(FitFailure::NoConvergence(reason)) => Self::FitFailed { reason },
        }
    }
}

impl RangeEstimate {
    pub fn model(&self) -> Option<&FittedRangeModel> {
        match self {
            Self::Fitted(model) => Some(model),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::NoData => "no data".to_string(),
            Self::Insufficient {
                valid_bins,
                required,
            } => format!(
                "insufficient data, {valid_bins} valid range bins of the {required} needed"
            ),
            Self::FitFailed { reason } => format!("fit failed, {reason}"),
            Self::Fitted(model) => format!("fitted, {:.1} nmi", model.max_reliable_range),
        }
    }

    /// What the operator can do about a missing model.
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            Self::NoData => Some(
                "No aircraft positions were captured. Check that the receiver \
                 is running and collect more data.",
            ),
            Self::Insufficient { .. } => Some(
                "Not enough data for reliable range assessment. Collect more \
                 data, or disable the bin validity filter.",
            ),
            Self::FitFailed { .. } => Some(
                "The reliability curve could not be modeled. Inspect the bin \
                 table for gaps or erratic proportions.",
            ),
            Self::Fitted(_) => None,
        }
    }
}

/// Size of the captured data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub captures: usize,

    /// Distinct (epoch, aircraft) observations with a position.
    pub observations: usize,

    pub epochs: usize,

    pub first_epoch: Option<Epoch>,

    pub last_epoch: Option<Epoch>,
}

impl CaptureSummary {
    fn new(captures: usize, index: &EpochIndex) -> Self {
        let span = index.span();
        Self {
            captures,
            observations: index.observation_count(),
            epochs: index.len(),
            first_epoch: span.map(|(first, _)| first),
            last_epoch: span.map(|(_, last)| last),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// Name of the fitting strategy.
    pub fitter: &'static str,
    pub table: BinTable,
    pub estimate: RangeEstimate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: CaptureSummary,
    pub analysis: Analysis,
}
