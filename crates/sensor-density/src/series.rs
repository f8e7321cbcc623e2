//! # Delta Series
//!
//! Turns one source's time-ordered samples into the two point sets the merger
//! works on: span deltas (rising/falling edges where the value moved between
//! samples) and spikes (time spent sitting on a single value).

use sensor_core::{
    min_resolution, round_stable, shortest_decimal, DeltaInfo, SensorObservation, SpanDelta,
    SpikePoint,
};

/// Width given to a lone sample when no resolution was configured.
pub const DEFAULT_RESOLUTION: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Sample<'a> {
    time: f64,
    value: f64,
    source_id: &'a str,
}

/// Builds a [`DeltaInfo`] from one source's samples.
///
/// The result is a heuristic: span edges spread the elapsed time evenly over the
/// value range crossed, and flat runs are booked as spikes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeltaSeriesBuilder {
    configured_resolution: Option<f64>,
    min_resolution: Option<f64>,
}

impl DeltaSeriesBuilder {
    pub fn new(configured_resolution: Option<f64>) -> Self {
        Self {
            configured_resolution,
            min_resolution: None,
        }
    }

    /// Supplies the minimum resolution shared by every source of a computation.
    /// Without it the builder estimates one from the samples it is given.
    pub fn with_min_resolution(mut self, min_resolution: Option<f64>) -> Self {
        self.min_resolution = min_resolution;
        self
    }

    fn fallback_resolution(&self) -> f64 {
        self.configured_resolution.unwrap_or(DEFAULT_RESOLUTION)
    }

    /// Half the minimum resolution, stabilised; the fallback resolution when
    /// there is no nonzero gap to measure.
    pub fn zero_delta_span(&self, min_resolution: Option<f64>) -> f64 {
        match min_resolution {
            Some(res) if res > 0.0 => round_stable(res / 2.0),
            _ => self.fallback_resolution(),
        }
    }

    pub fn build<O: SensorObservation>(&self, samples: &[O]) -> DeltaInfo {
        let present: Vec<Sample<'_>> = samples
            .iter()
            .filter_map(|s| {
                s.value().map(|value| Sample {
                    time: s.time_index(),
                    value,
                    source_id: s.source_id(),
                })
            })
            .collect();

        match present.as_slice() {
            [] => DeltaInfo::default(),
            [only] => {
                let resolution = self.fallback_resolution();
                DeltaInfo {
                    span_deltas: Vec::new(),
                    zero_delta_span: resolution,
                    spike_points: vec![spike(only.value, resolution, only.source_id)],
                }
            }
            _ => self.build_series(&present),
        }
    }

    fn build_series(&self, present: &[Sample<'_>]) -> DeltaInfo {
        let min_res = self
            .min_resolution
            .or_else(|| min_resolution(present.iter().map(|s| s.value)));
        let zero_delta_span = self.zero_delta_span(min_res);

        let mut span_deltas = Vec::new();
        let mut spike_points = Vec::new();

        // Backward extrapolation: the first sample is assumed to have been
        // held for as long as the gap to its successor.
        let (first, second) = (present[0], present[1]);
        push_spike(&mut spike_points, first.value, second.time - first.time, first.source_id);

        for pair in present.windows(2) {
            let (last, current) = (pair[0], pair[1]);
            let elapsed = current.time - last.time;
            if elapsed <= 0.0 {
                continue;
            }
            if (current.value - last.value).abs() < zero_delta_span {
                let value = shortest_decimal(last.value, current.value);
                push_spike(&mut spike_points, value, elapsed, current.source_id);
            } else {
                let low = last.value.min(current.value);
                let high = last.value.max(current.value);
                let height = elapsed / (high - low);
                span_deltas.push(SpanDelta { value: low, delta_weight: height });
                span_deltas.push(SpanDelta { value: high, delta_weight: -height });
                // A new run starts at `current`; book its first step the way
                // the seed books the first sample.
                push_spike(&mut spike_points, current.value, elapsed, current.source_id);
            }
        }

        span_deltas.sort_by(|a, b| a.value.total_cmp(&b.value));
        spike_points.sort_by(|a, b| a.value.total_cmp(&b.value));
        spike_points.dedup_by(|next, kept| {
            if next.value == kept.value {
                kept.span += next.span;
                true
            } else {
                false
            }
        });

        DeltaInfo {
            span_deltas,
            zero_delta_span,
            spike_points,
        }
    }
}

fn spike(value: f64, span: f64, source_id: &str) -> SpikePoint {
    SpikePoint {
        value,
        span,
        source_id: source_id.to_string(),
    }
}

fn push_spike(spikes: &mut Vec<SpikePoint>, value: f64, span: f64, source_id: &str) {
    if span > 0.0 {
        spikes.push(spike(value, span, source_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sensor_core::Observation;

    fn series(source: &str, values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(t, v)| Observation::new(source, Some(*v), t as f64))
            .collect()
    }

    fn spike_span(info: &DeltaInfo, value: f64) -> Option<f64> {
        info.spike_points
            .iter()
            .find(|s| s.value == value)
            .map(|s| s.span)
    }

    #[test]
    fn stair_steps_produce_spikes_and_spans() {
        let info =
            DeltaSeriesBuilder::new(None).build(&series("s", &[5.0, 5.0, 5.0, 7.0, 7.0, 6.0]));

        assert_relative_eq!(info.zero_delta_span, 0.5);
        assert_eq!(spike_span(&info, 5.0), Some(3.0));
        assert_eq!(spike_span(&info, 6.0), Some(1.0));
        assert_eq!(spike_span(&info, 7.0), Some(2.0));
        assert_eq!(info.spike_points.len(), 3);

        let spans: Vec<(f64, f64)> = info
            .span_deltas
            .iter()
            .map(|d| (d.value, d.delta_weight))
            .collect();
        assert_eq!(spans, vec![(5.0, 0.5), (6.0, 1.0), (7.0, -0.5), (7.0, -1.0)]);
    }

    #[test]
    fn span_pairs_cancel_exactly() {
        let values = [0.1, 1e9, -3.3, 7.25, 1e-7, 42.0];
        let info = DeltaSeriesBuilder::new(None).build(&series("s", &values));

        let total: f64 = info.span_deltas.iter().map(|d| d.delta_weight).sum();
        assert_eq!(info.span_deltas.len(), 2 * (values.len() - 1));
        assert_relative_eq!(total, 0.0, epsilon = 1e-6);

        let mut rising: Vec<f64> = info
            .span_deltas
            .iter()
            .filter(|d| d.delta_weight > 0.0)
            .map(|d| d.delta_weight)
            .collect();
        let mut falling: Vec<f64> = info
            .span_deltas
            .iter()
            .filter(|d| d.delta_weight < 0.0)
            .map(|d| -d.delta_weight)
            .collect();
        rising.sort_by(f64::total_cmp);
        falling.sort_by(f64::total_cmp);
        assert_eq!(rising, falling);
    }

    #[test]
    fn single_sample_uses_configured_resolution() {
        let info = DeltaSeriesBuilder::new(Some(0.25)).build(&series("s", &[12.0]));

        assert!(info.span_deltas.is_empty());
        assert_eq!(info.spike_points.len(), 1);
        assert_eq!(info.spike_points[0].span, 0.25);
        assert_eq!(info.zero_delta_span, 0.25);
    }

    #[test]
    fn single_sample_defaults_to_unit_resolution() {
        let info = DeltaSeriesBuilder::new(None).build(&series("s", &[12.0]));

        assert_eq!(info.spike_points[0].span, DEFAULT_RESOLUTION);
        assert_eq!(info.zero_delta_span, DEFAULT_RESOLUTION);
    }

    #[test]
    fn single_distinct_value_yields_one_spike() {
        let info = DeltaSeriesBuilder::new(Some(0.5)).build(&series("s", &[3.0, 3.0, 3.0, 3.0]));

        assert!(info.span_deltas.is_empty());
        assert_eq!(info.spike_points.len(), 1);
        assert_eq!(info.zero_delta_span, 0.5);
        // Seed + three flat pairs.
        assert_eq!(info.spike_points[0].span, 4.0);
    }

    #[test]
    fn each_new_run_books_its_first_step() {
        let info = DeltaSeriesBuilder::new(None).build(&series("s", &[1.0, 3.0, 3.0, 3.0, 2.0]));

        assert_eq!(spike_span(&info, 1.0), Some(1.0));
        assert_eq!(spike_span(&info, 3.0), Some(3.0));
        assert_eq!(spike_span(&info, 2.0), Some(1.0));
    }

    #[test]
    fn absent_values_are_skipped() {
        let samples = vec![
            Observation::new("s", Some(1.0), 0.0),
            Observation::new("s", None, 1.0),
            Observation::new("s", Some(2.0), 2.0),
        ];
        let info = DeltaSeriesBuilder::new(None).build(&samples);

        // One span across the gap, elapsed time 2 over a range of 1.
        assert_eq!(info.span_deltas.len(), 2);
        assert_relative_eq!(info.span_deltas[0].delta_weight, 2.0);
    }

    #[test]
    fn near_equal_values_prefer_short_representation() {
        let info = DeltaSeriesBuilder::new(None)
            .with_min_resolution(Some(0.1))
            .build(&series("s", &[0.2, 0.30000000000000004, 0.3]));

        // The flat pair books under the shorter 0.3; the run start keeps the
        // raw value it landed on.
        assert_eq!(spike_span(&info, 0.3), Some(1.0));
        assert_eq!(spike_span(&info, 0.30000000000000004), Some(1.0));
    }

    #[test]
    fn simultaneous_samples_emit_nothing() {
        let samples = vec![
            Observation::new("s", Some(1.0), 0.0),
            Observation::new("s", Some(2.0), 0.0),
            Observation::new("s", Some(2.0), 1.0),
        ];
        let info = DeltaSeriesBuilder::new(None).build(&samples);

        assert!(info.span_deltas.is_empty());
        assert!(info.spike_points.iter().all(|s| s.span > 0.0));
    }

    #[test]
    fn empty_input_is_empty_info() {
        let info = DeltaSeriesBuilder::new(None).build::<Observation>(&[]);
        assert_eq!(info, DeltaInfo::default());
    }
}
