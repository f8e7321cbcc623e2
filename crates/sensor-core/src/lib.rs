//! # Sensor Core
//!
//! Core data structures for turning quantized, multi-source sensor samples into
//! a value-density estimate. It defines the `SensorObservation` trait, which is
//! a generic interface for sampled readings, the concrete `Observation` record,
//! the intermediate point types exchanged between pipeline stages, field
//! metadata and the shared error taxonomy.

use serde::{Deserialize, Serialize};

pub mod error;
pub mod frequency;
pub mod resolution;

pub use error::{DensityError, Result};
pub use frequency::{ordered_frequencies, total_count};
pub use resolution::{min_resolution, round_stable, shortest_decimal};

pub trait SensorObservation {
    fn source_id(&self) -> &str;
    fn value(&self) -> Option<f64>;
    fn time_index(&self) -> f64;
}

/// A concrete implementation of `SensorObservation`.
///
/// `value` is `None` when the upstream record carried a missing-data sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub source_id: String,
    pub value: Option<f64>,
    pub time_index: f64,
}

impl Observation {
    pub fn new(source_id: impl Into<String>, value: Option<f64>, time_index: f64) -> Self {
        Self {
            source_id: source_id.into(),
            value,
            time_index,
        }
    }
}

impl SensorObservation for Observation {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn time_index(&self) -> f64 {
        self.time_index
    }
}

/// One row of a per-source frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPoint {
    pub value: f64,
    pub count: u64,
}

impl FrequencyPoint {
    pub fn new(value: f64, count: u64) -> Self {
        Self { value, count }
    }
}

/// Rising (`delta_weight > 0`) or falling edge of a trapezoidal density span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanDelta {
    pub value: f64,
    pub delta_weight: f64,
}

/// Mass concentrated at a single value over `span` units of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikePoint {
    pub value: f64,
    pub span: f64,
    pub source_id: String,
}

/// Everything the merger consumes for one computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaInfo {
    pub span_deltas: Vec<SpanDelta>,
    pub zero_delta_span: f64,
    pub spike_points: Vec<SpikePoint>,
}

impl DeltaInfo {
    /// Folds per-source bundles into one, keeping both sequences sorted.
    ///
    /// The combined threshold is the smallest positive per-source threshold.
    pub fn combine<I>(infos: I) -> Self
    where
        I: IntoIterator<Item = DeltaInfo>,
    {
        let mut out = DeltaInfo::default();
        let mut zero_delta_span: Option<f64> = None;
        for info in infos {
            out.span_deltas.extend(info.span_deltas);
            out.spike_points.extend(info.spike_points);
            if info.zero_delta_span > 0.0 {
                zero_delta_span = Some(match zero_delta_span {
                    Some(current) => current.min(info.zero_delta_span),
                    None => info.zero_delta_span,
                });
            }
        }
        out.span_deltas
            .sort_by(|a, b| a.value.total_cmp(&b.value));
        out.spike_points
            .sort_by(|a, b| a.value.total_cmp(&b.value));
        out.zero_delta_span = zero_delta_span.unwrap_or(0.0);
        out
    }
}

/// One entry of the merged derivative sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedDelta {
    pub value: f64,
    pub delta_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CumulativeDensityPoint {
    pub value: f64,
    pub cumulative_weight: f64,
}

/// Running sum of the merged derivative, i.e. the density level at each value.
pub fn integrate(combined: &[CombinedDelta]) -> Vec<CumulativeDensityPoint> {
    let mut running = 0.0;
    combined
        .iter()
        .map(|delta| {
            running += delta.delta_weight;
            CumulativeDensityPoint {
                value: delta.value,
                cumulative_weight: running,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// How raw frequencies are compared when hunting for quantization noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyScale {
    Linear,
    Logarithmic,
}

impl FrequencyScale {
    pub fn scale(&self, count: u64) -> f64 {
        match self {
            FrequencyScale::Linear => count as f64,
            FrequencyScale::Logarithmic => (count as f64).ln_1p(),
        }
    }
}

/// Per-field capsule supplied by the record parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub exponential_values: bool,
    pub expects_exponential_frequency: bool,
    #[serde(default)]
    pub bounds: Bounds,
}

impl FieldMetadata {
    pub fn frequency_scale(&self) -> FrequencyScale {
        if self.expects_exponential_frequency {
            FrequencyScale::Logarithmic
        } else {
            FrequencyScale::Linear
        }
    }

    /// Precondition check; the parser is expected to have enforced this already.
    pub fn check(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(DensityError::Validation(format!(
                "non-finite value {value}"
            )));
        }
        if let Some(min) = self.bounds.minimum {
            if value < min {
                return Err(DensityError::Validation(format!(
                    "{value} is below the field minimum {min}"
                )));
            }
        }
        if let Some(max) = self.bounds.maximum {
            if value > max {
                return Err(DensityError::Validation(format!(
                    "{value} is above the field maximum {max}"
                )));
            }
        }
        Ok(())
    }
}
