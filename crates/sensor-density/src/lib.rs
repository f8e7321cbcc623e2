//! # Sensor Density
//!
//! Estimates how much time a quantized, multi-source signal spends at each
//! value. Samples become span deltas and zero-width spikes, the two are merged
//! into one strictly ascending derivative sequence, and its running sum is the
//! density curve. With noise reduction enabled, values are first snapped to
//! canonical bins shared across sources.

pub mod config;
pub mod cursor;
pub mod engine;
pub mod merge;
pub mod series;

pub use config::{DensityConfig, RunOptions};
pub use cursor::{Cursor, NeighbourCursor};
pub use engine::{compute_density, DensityCurve, DensityEngine, ObservationFilter};
pub use merge::{
    BoundaryEstimator, DeltaMerger, MergedDeltas, Neighbours, PlainBoundaries,
    WhitelistBoundaries, MAX_COMBINED_POINTS,
};
pub use series::{DeltaSeriesBuilder, DEFAULT_RESOLUTION};
