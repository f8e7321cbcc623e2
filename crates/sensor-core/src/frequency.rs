//! Per-source frequency tables.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::{FrequencyPoint, SensorObservation};

/// Groups observations per source into ascending `(value, count)` tables.
///
/// Observations without a value are skipped.
pub fn ordered_frequencies<'a, O, I>(observations: I) -> BTreeMap<String, Vec<FrequencyPoint>>
where
    O: SensorObservation + 'a,
    I: IntoIterator<Item = &'a O>,
{
    let mut counts: BTreeMap<String, BTreeMap<OrderedFloat<f64>, u64>> = BTreeMap::new();
    for obs in observations {
        let Some(value) = obs.value() else {
            continue;
        };
        *counts
            .entry(obs.source_id().to_string())
            .or_default()
            .entry(OrderedFloat(value))
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(source, table)| {
            let points = table
                .into_iter()
                .map(|(value, count)| FrequencyPoint::new(value.0, count))
                .collect();
            (source, points)
        })
        .collect()
}

/// Total frequency mass of a table.
pub fn total_count(points: &[FrequencyPoint]) -> u64 {
    points.iter().map(|p| p.count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observation;

    #[test]
    fn groups_per_source_ascending() {
        let obs = vec![
            Observation::new("b", Some(3.0), 0.0),
            Observation::new("a", Some(2.0), 0.0),
            Observation::new("a", Some(1.0), 1.0),
            Observation::new("a", Some(2.0), 2.0),
            Observation::new("b", Some(3.0), 1.0),
        ];
        let table = ordered_frequencies(&obs);

        assert_eq!(table.len(), 2);
        assert_eq!(
            table["a"],
            vec![FrequencyPoint::new(1.0, 1), FrequencyPoint::new(2.0, 2)]
        );
        assert_eq!(table["b"], vec![FrequencyPoint::new(3.0, 2)]);
    }

    #[test]
    fn skips_absent_values() {
        let obs = vec![
            Observation::new("a", None, 0.0),
            Observation::new("a", Some(4.5), 1.0),
            Observation::new("c", None, 2.0),
        ];
        let table = ordered_frequencies(&obs);

        assert_eq!(table.len(), 1);
        assert_eq!(total_count(&table["a"]), 1);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let obs: Vec<Observation> = Vec::new();
        assert!(ordered_frequencies(&obs).is_empty());
    }
}
