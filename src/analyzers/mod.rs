//! Daily aggregation and congestion banding.
//!
//! This module turns raw hourly checkpoint rows into a gap-free daily series
//! and classifies forecast values against a historical baseline.

pub mod aggregate;
pub mod band;
pub mod types;
pub mod utility;
