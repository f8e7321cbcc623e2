//! Merges per-source accepted values into one canonical list of bin centres.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use sensor_core::round_stable;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative slack on the spacing check, absorbs drift in float differences.
const SPACING_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Whitelist {
    /// Ascending canonical bin centres.
    pub values: Vec<f64>,
    /// Median gap of the most reliable source.
    pub distance: f64,
    pub top_source: Option<String>,
}

/// Index at which `value` sits in `sorted`: the first element not below it.
///
/// A value equal to the last element reports the last valid index instead of
/// one-past-the-end; values beyond the last element report `sorted.len()`.
pub fn search_position(sorted: &[f64], value: f64) -> usize {
    match sorted.last() {
        None => return 0,
        Some(&last) if last == value => return sorted.len() - 1,
        _ => {}
    }

    let (mut low, mut high) = (0, sorted.len());
    while low < high {
        let mid = low + (high - low) / 2;
        if sorted[mid] < value {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

/// Median of the consecutive gaps in an ascending list; 0 with fewer than two values.
pub fn canonical_distance(accepted: &[f64]) -> f64 {
    let mut gaps: Vec<f64> = accepted.windows(2).map(|w| w[1] - w[0]).collect();
    if gaps.is_empty() {
        return 0.0;
    }
    gaps.sort_by(f64::total_cmp);
    let n = gaps.len();
    let median = if n % 2 == 0 {
        (gaps[n / 2 - 1] + gaps[n / 2]) / 2.0
    } else {
        gaps[n / 2]
    };
    round_stable(median)
}

/// Builds the global whitelist from every source's accepted values.
pub fn aggregate(accepted: &BTreeMap<String, Vec<f64>>) -> Whitelist {
    let mut popularity: BTreeMap<OrderedFloat<f64>, usize> = BTreeMap::new();
    for values in accepted.values() {
        for &value in values {
            *popularity.entry(OrderedFloat(value)).or_insert(0) += 1;
        }
    }

    let mut top: Option<(&String, usize)> = None;
    for (source, values) in accepted {
        let score: usize = values
            .iter()
            .map(|v| popularity.get(&OrderedFloat(*v)).copied().unwrap_or(0))
            .sum();
        if top.map_or(true, |(_, best)| score > best) {
            top = Some((source, score));
        }
    }
    let Some((top_source, _)) = top else {
        return Whitelist::default();
    };

    let mut top_values = accepted[top_source].clone();
    top_values.sort_by(f64::total_cmp);
    let distance = canonical_distance(&top_values);
    debug!(source = %top_source, distance, "selected canonical distance");

    let mut candidates: Vec<(f64, usize)> =
        popularity.iter().map(|(v, count)| (v.0, *count)).collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.total_cmp(&b.0)));

    let min_gap = distance * (1.0 - SPACING_TOLERANCE);
    let mut values: Vec<f64> = Vec::with_capacity(candidates.len());
    for (candidate, _) in candidates {
        let pos = search_position(&values, candidate);
        let clear_below = pos == 0 || candidate - values[pos - 1] >= min_gap;
        let clear_above = pos == values.len() || values[pos] - candidate >= min_gap;
        if clear_below && clear_above {
            values.insert(pos, candidate);
        }
    }

    Whitelist {
        values,
        distance,
        top_source: Some(top_source.clone()),
    }
}
