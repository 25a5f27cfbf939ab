#![forbid(unsafe_code)]

//! Statistics sampling and connection quality scoring.
//!
//! [`StatsSampler`] flattens the transport's heterogeneous statistics report
//! into a single [`MetricsSnapshot`]; [`QualityScorer`] reduces a snapshot to
//! a bounded score and an ordinal [`QualityLevel`], smoothed over a short
//! rolling window. Neither ever fails: sampling falls back to the previous
//! snapshot, scoring always produces a value.

mod config;
mod metrics;
mod sampler;
mod scorer;

pub use crate::{
    config::AdaptationConfig,
    metrics::{MetricsSnapshot, Resolution},
    sampler::StatsSampler,
    scorer::{QualityLevel, QualityScore, QualityScorer},
};
