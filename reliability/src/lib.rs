//! # Receiver Reliability
//!
//! `reliability` turns a time series of aircraft position reports into
//! a detection reliability curve: the probability that an aircraft seen
//! at one sampling instant is seen again at the next one, as a function
//! of its distance from the receiver.
//!
//! The stages are
//!
//! 1. [`normalize`] raw captures into [`Observation`]s with a
//!    great-circle distance from the receiver,
//! 2. index them by [`Epoch`] and label continuity with
//!    [`EpochIndex::presence`],
//! 3. [`aggregate`] the labels into fixed-width distance bins with
//!    exact binomial confidence intervals,
//! 4. fit a range model to the valid bins with a [`RangeFitter`].
//!
//! [`Pipeline`] runs all of them.

pub mod bins;
pub mod constants;
mod error;
pub mod fit;
pub mod math;
mod observation;
mod pipeline;
mod presence;
pub mod table;

pub use {
    crate::{
        bins::{aggregate, Bin, BinConfig, BinTable},
        error::ReliabilityError,
        fit::{FitFailure, FittedRangeModel, Knee, PiecewiseLinear, RangeFitter},
        math::{clopper_pearson, haversine, haversine_nmi},
        observation::{normalize, Epoch, Observation, RawCapture, RawEntry},
        pipeline::{
            Analysis, Analyzer, CaptureSummary, Pipeline, PipelineBuilder, RangeEstimate, Report,
        },
        presence::{EpochIndex, PresenceRecord},
        table::{read_presence, write_presence},
    },
    geo,
};
