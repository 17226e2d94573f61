//! Configuration layer: the value itself and everything that produces one.
//!
//! This module is intentionally separate from validation and rendering.
//! It owns:
//! - Configuration (the snapshot both consumers read)
//! - Edit (field-edit intents and the reducer applying them)
//! - Templates (partial configurations merged over defaults)

pub mod config;
pub mod edit;
pub mod template;

pub use config::{
    Configuration, IndicatorBody, IndicatorMode, Kind, MetricSource, RatioMetric, ThresholdMetric,
};
pub use edit::Edit;
