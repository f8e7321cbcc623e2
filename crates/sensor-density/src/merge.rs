//! # Delta Merger
//!
//! Sweeps span deltas and spikes in ascending value order and folds them into a
//! single derivative sequence. Each spike is smeared over the half-intervals
//! towards its neighbouring boundaries; how those boundaries are found is the
//! job of a [`BoundaryEstimator`].
//!
//! The spike widths are an approximation. When nothing at all is known around
//! a spike, `zero_delta_span` is used as an arbitrary half-width.

use std::collections::BTreeMap;

use sensor_core::{
    integrate, CombinedDelta, CumulativeDensityPoint, DeltaInfo, DensityError, Result, SpanDelta,
    SpikePoint,
};

use crate::cursor::{Cursor, NeighbourCursor};

/// Hard cap on merged output size.
pub const MAX_COMBINED_POINTS: usize = 1_000_000;

/// Boundary knowledge a strategy adds on top of the sweep's own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Neighbours {
    pub below: Option<f64>,
    pub above: Option<f64>,
}

pub trait BoundaryEstimator {
    /// Called once per spike, in ascending spike order.
    fn neighbours(&mut self, spike: &SpikePoint) -> Result<Neighbours>;
}

/// Relies purely on neighbouring span and spike values.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainBoundaries;

impl BoundaryEstimator for PlainBoundaries {
    fn neighbours(&mut self, _spike: &SpikePoint) -> Result<Neighbours> {
        Ok(Neighbours::default())
    }
}

/// Consults each source's canonical bin positions for tighter spike widths.
#[derive(Debug, Clone, Default)]
pub struct WhitelistBoundaries<'a> {
    cursors: BTreeMap<&'a str, NeighbourCursor<'a>>,
}

impl<'a> WhitelistBoundaries<'a> {
    pub fn new(bins: &'a BTreeMap<String, Vec<f64>>) -> Self {
        Self {
            cursors: bins
                .iter()
                .map(|(source, values)| (source.as_str(), NeighbourCursor::new(values)))
                .collect(),
        }
    }
}

impl BoundaryEstimator for WhitelistBoundaries<'_> {
    fn neighbours(&mut self, spike: &SpikePoint) -> Result<Neighbours> {
        let Some(cursor) = self.cursors.get_mut(spike.source_id.as_str()) else {
            return Ok(Neighbours::default());
        };
        cursor.seek(spike.value);
        let above = if cursor.is_exhausted() {
            None
        } else {
            Some(cursor.upper()?)
        };
        Ok(Neighbours {
            below: cursor.lower(),
            above,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedDeltas {
    /// Strictly ascending, unique by value.
    pub combined: Vec<CombinedDelta>,
}

impl MergedDeltas {
    pub fn cumulative(&self) -> Vec<CumulativeDensityPoint> {
        integrate(&self.combined)
    }
}

/// Appends to the combined sequence, summing entries that land on the same value.
struct Emitter {
    out: Vec<CombinedDelta>,
    limit: usize,
}

impl Emitter {
    fn push(&mut self, value: f64, delta_weight: f64) -> Result<()> {
        if let Some(last) = self.out.last_mut() {
            if last.value == value {
                last.delta_weight += delta_weight;
                return Ok(());
            }
            if value < last.value {
                return Err(DensityError::InternalConsistency(format!(
                    "merged delta at {value} emitted after {}",
                    last.value
                )));
            }
        }
        if self.out.len() >= self.limit {
            return Err(DensityError::ResourceLimit {
                limit: self.limit,
                attempted: self.out.len() + 1,
            });
        }
        self.out.push(CombinedDelta { value, delta_weight });
        Ok(())
    }
}

pub struct DeltaMerger<E> {
    estimator: E,
    max_points: usize,
}

impl DeltaMerger<PlainBoundaries> {
    pub fn plain() -> Self {
        Self::new(PlainBoundaries)
    }
}

impl<'a> DeltaMerger<WhitelistBoundaries<'a>> {
    pub fn whitelist_aware(bins: &'a BTreeMap<String, Vec<f64>>) -> Self {
        Self::new(WhitelistBoundaries::new(bins))
    }
}

impl<E: BoundaryEstimator> DeltaMerger<E> {
    pub fn new(estimator: E) -> Self {
        Self {
            estimator,
            max_points: MAX_COMBINED_POINTS,
        }
    }

    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Consumes the merger; estimator state is single-pass.
    pub fn merge(mut self, info: &DeltaInfo) -> Result<MergedDeltas> {
        let spans = coalesce_spans(&info.span_deltas);
        let spikes = coalesce_spikes(&info.spike_points);
        let mut span_cursor = Cursor::new(&spans);
        let mut spike_cursor = Cursor::new(&spikes);
        let mut emitter = Emitter {
            out: Vec::new(),
            limit: self.max_points,
        };
        let mut last_boundary: Option<f64> = None;

        while let Some(spike) = spike_cursor.peek() {
            if let Some(span) = span_cursor.peek() {
                if span.value < spike.value {
                    emitter.push(span.value, span.delta_weight)?;
                    last_boundary = Some(span.value);
                    span_cursor.advance();
                    continue;
                }
            }

            let y = spike.value;
            let coincident = span_cursor.peek().filter(|span| span.value == y);
            let next_span = span_cursor.peek_at(usize::from(coincident.is_some()));
            let next_known = min_option(
                next_span.map(|span| span.value),
                spike_cursor.peek_at(1).map(|next| next.value),
            );

            let hints = self.estimator.neighbours(spike)?;
            let below = max_option(last_boundary, hints.below.filter(|b| *b < y));
            let above = min_option(next_known, hints.above.filter(|a| *a > y));
            let (last_y, next_y) = match (below, above) {
                (Some(b), Some(a)) => (b, a),
                (Some(b), None) => (b, y + (y - b)),
                (None, Some(a)) => (y - (a - y), a),
                (None, None) => (y - info.zero_delta_span, y + info.zero_delta_span),
            };

            let width = next_y - last_y;
            if !(width > 0.0) || !width.is_finite() {
                return Err(DensityError::InternalConsistency(format!(
                    "spike at {y} has no usable width ({last_y}..{next_y})"
                )));
            }
            let height = spike.span / width;

            emitter.push(midpoint(last_y, y), height)?;
            if let Some(span) = coincident {
                emitter.push(span.value, span.delta_weight)?;
                span_cursor.advance();
            }
            emitter.push(midpoint(y, next_y), -height)?;

            last_boundary = Some(y);
            spike_cursor.advance();
        }

        while let Some(span) = span_cursor.advance() {
            emitter.push(span.value, span.delta_weight)?;
        }

        Ok(MergedDeltas {
            combined: emitter.out,
        })
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

fn min_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Sums same-value span deltas. Input must be sorted by value.
fn coalesce_spans(spans: &[SpanDelta]) -> Vec<SpanDelta> {
    let mut out: Vec<SpanDelta> = Vec::with_capacity(spans.len());
    for span in spans {
        match out.last_mut() {
            Some(last) if last.value == span.value => last.delta_weight += span.delta_weight,
            _ => out.push(*span),
        }
    }
    out
}

/// Sums same-value spikes; the source of the widest contributor is kept.
fn coalesce_spikes(spikes: &[SpikePoint]) -> Vec<SpikePoint> {
    let mut out: Vec<SpikePoint> = Vec::with_capacity(spikes.len());
    let mut widest = 0.0;
    for spike in spikes {
        match out.last_mut() {
            Some(last) if last.value == spike.value => {
                last.span += spike.span;
                if spike.span > widest {
                    widest = spike.span;
                    last.source_id = spike.source_id.clone();
                }
            }
            _ => {
                widest = spike.span;
                out.push(spike.clone());
            }
        }
    }
    out
}
