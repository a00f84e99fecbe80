//! Metric expression building.
//!
//! This module assembles expression text for the three standard metric
//! shapes (average, yes/no, NPS) from a small structured configuration.
//! The output is always text in the same grammar [`crate::parse`] accepts;
//! the builder re-parses its own output before returning it.

mod builder;
mod filter;

pub use builder::{build_metric_expression, CalculationType, MetricBuildError, MetricRequest};
pub use filter::TrueValueFilter;
