//! Moves the frequency mass of rejected values onto canonical bins.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use sensor_core::{total_count, FrequencyPoint};
use tracing::warn;

/// A source's frequency table after regrouping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegroupedSource {
    /// Ascending, one entry per bin that received mass.
    pub points: Vec<FrequencyPoint>,
    /// Original value -> bin it was merged into.
    pub remap: BTreeMap<OrderedFloat<f64>, f64>,
    /// Trailing points too far past the last canonical bin.
    pub dropped: Vec<FrequencyPoint>,
}

impl RegroupedSource {
    /// Bin that now carries `value`, `None` if its mass was dropped or unknown.
    pub fn bin_for(&self, value: f64) -> Option<f64> {
        self.remap.get(&OrderedFloat(value)).copied()
    }

    pub fn bin_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dropped_mass(&self) -> u64 {
        total_count(&self.dropped)
    }
}

/// Average canonical spacing: `(max - min) / (n - 1)`.
///
/// Infinite for a single canonical value so everything attaches to it.
pub fn proximity_threshold(canonical: &[f64]) -> f64 {
    match (canonical.first(), canonical.last()) {
        (Some(first), Some(last)) if canonical.len() > 1 => {
            (last - first) / (canonical.len() - 1) as f64
        }
        _ => f64::INFINITY,
    }
}

#[derive(Default)]
struct Bins {
    mass: BTreeMap<OrderedFloat<f64>, u64>,
    remap: BTreeMap<OrderedFloat<f64>, f64>,
}

impl Bins {
    fn assign(&mut self, point: &FrequencyPoint, bin: f64) {
        *self.mass.entry(OrderedFloat(bin)).or_insert(0) += point.count;
        self.remap.insert(OrderedFloat(point.value), bin);
    }

    /// Settles the points buffered between `previous` and `next`.
    fn flush(
        &mut self,
        missed: &mut Vec<FrequencyPoint>,
        previous: Option<f64>,
        next: f64,
        threshold: f64,
    ) {
        for point in missed.drain(..) {
            let bin = match previous {
                None if next - point.value <= threshold => next,
                None => point.value,
                Some(prev) => {
                    let mid = (prev + next) / 2.0;
                    if point.value < mid || point.value - prev <= threshold {
                        prev
                    } else if next - point.value <= threshold {
                        next
                    } else {
                        mid
                    }
                }
            };
            self.assign(&point, bin);
        }
    }

    fn finish(self, dropped: Vec<FrequencyPoint>) -> RegroupedSource {
        RegroupedSource {
            points: self
                .mass
                .into_iter()
                .map(|(value, count)| FrequencyPoint::new(value.0, count))
                .collect(),
            remap: self.remap,
            dropped,
        }
    }
}

/// Redistributes one source's ascending frequency table onto `canonical` bins.
///
/// Points lying exactly on a canonical value stay put. Points in between are
/// buffered and, once the sweep passes the next canonical value, merged into
/// the previous bin when below the midpoint or within the threshold of it, else
/// into the next bin when within the threshold of that. What is left of a wide
/// gap gets a new bin at the gap's midpoint. Trailing points farther than
/// the proximity threshold beyond the last bin are dropped and logged.
pub fn regroup(source_id: &str, points: &[FrequencyPoint], canonical: &[f64]) -> RegroupedSource {
    let mut bins = Bins::default();
    if canonical.is_empty() {
        for point in points {
            bins.assign(point, point.value);
        }
        return bins.finish(Vec::new());
    }

    let threshold = proximity_threshold(canonical);
    let mut cursor = 0;
    let mut previous: Option<f64> = None;
    let mut missed: Vec<FrequencyPoint> = Vec::new();

    for point in points {
        while cursor < canonical.len() && canonical[cursor] < point.value {
            bins.flush(&mut missed, previous, canonical[cursor], threshold);
            previous = Some(canonical[cursor]);
            cursor += 1;
        }
        match canonical.get(cursor) {
            Some(&bin) if bin == point.value => {
                bins.flush(&mut missed, previous, bin, threshold);
                bins.assign(point, bin);
            }
            _ => missed.push(*point),
        }
    }

    let mut dropped = Vec::new();
    if let Some(&next) = canonical.get(cursor) {
        bins.flush(&mut missed, previous, next, threshold);
    } else if let Some(&last) = canonical.last() {
        for point in missed.drain(..) {
            if point.value - last <= threshold {
                bins.assign(&point, last);
            } else {
                warn!(
                    source = source_id,
                    value = point.value,
                    count = point.count,
                    last_bin = last,
                    "dropping trailing mass beyond the last canonical bin"
                );
                dropped.push(point);
            }
        }
    }
    bins.finish(dropped)
}
