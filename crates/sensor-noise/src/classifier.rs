//! Separates statistically significant values from quantization noise.

use std::collections::BTreeMap;

use sensor_core::{DensityError, FrequencyPoint, FrequencyScale, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tuning for [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A value is noise only if its scaled frequency is below this fraction of
    /// both the previous accepted value and the look-ahead mean.
    pub rejection_ratio: f64,
    /// How many not-yet-classified values feed the look-ahead mean.
    pub lookahead: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rejection_ratio: 0.2,
            lookahead: 10,
        }
    }
}

/// Returns the accepted values of one source, ascending.
///
/// Sources with at most two distinct values pass through untouched. Otherwise
/// the lowest value seeds the accepted set and each following value is rejected
/// iff its scaled frequency is small relative to both the last accepted value
/// and the mean of the values that follow it.
pub fn classify(
    points: &[FrequencyPoint],
    scale: FrequencyScale,
    config: &ClassifierConfig,
) -> Result<Vec<f64>> {
    if points.len() <= 2 {
        return Ok(points.iter().map(|p| p.value).collect());
    }

    let scaled: Vec<f64> = points.iter().map(|p| scale.scale(p.count)).collect();
    let mut accepted = vec![points[0].value];
    let mut previous = scaled[0];

    for i in 1..points.len() {
        let ahead = &scaled[i + 1..(i + 1 + config.lookahead).min(scaled.len())];
        let is_noise = if ahead.is_empty() {
            false
        } else {
            let mean = ahead.iter().sum::<f64>() / ahead.len() as f64;
            scaled[i] < config.rejection_ratio * previous
                && scaled[i] < config.rejection_ratio * mean
        };

        if is_noise {
            debug!(value = points[i].value, count = points[i].count, "rejected as noise");
        } else {
            accepted.push(points[i].value);
            previous = scaled[i];
        }
    }

    if accepted.len() < 2 {
        return Err(DensityError::InternalConsistency(format!(
            "noise classification kept {} of {} values",
            accepted.len(),
            points.len()
        )));
    }
    Ok(accepted)
}

/// Runs [`classify`] for every source.
pub fn classify_sources(
    tables: &BTreeMap<String, Vec<FrequencyPoint>>,
    scale: FrequencyScale,
    config: &ClassifierConfig,
) -> Result<BTreeMap<String, Vec<f64>>> {
    tables
        .iter()
        .map(|(source, points)| Ok((source.clone(), classify(points, scale, config)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(f64, u64)]) -> Vec<FrequencyPoint> {
        rows.iter().map(|&(v, c)| FrequencyPoint::new(v, c)).collect()
    }

    #[test]
    fn small_sources_pass_through() {
        let config = ClassifierConfig::default();
        let one = table(&[(4.0, 1)]);
        let two = table(&[(4.0, 100), (4.1, 1)]);

        assert_eq!(classify(&one, FrequencyScale::Linear, &config).unwrap(), vec![4.0]);
        assert_eq!(
            classify(&two, FrequencyScale::Linear, &config).unwrap(),
            vec![4.0, 4.1]
        );
    }

    #[test]
    fn rejects_rare_values_between_common_ones() {
        let points = table(&[
            (10.0, 50),
            (12.0, 2),
            (20.0, 48),
            (21.0, 1),
            (30.0, 52),
            (40.0, 47),
        ]);
        let accepted =
            classify(&points, FrequencyScale::Linear, &ClassifierConfig::default()).unwrap();

        assert_eq!(accepted, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn rare_value_is_kept_when_followed_by_rare_values() {
        // The tail is uniformly sparse, so the look-ahead mean is small too.
        let points = table(&[(1.0, 100), (2.0, 3), (3.0, 2), (4.0, 3)]);
        let accepted =
            classify(&points, FrequencyScale::Linear, &ClassifierConfig::default()).unwrap();

        assert_eq!(accepted, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn last_value_is_always_accepted() {
        let points = table(&[(1.0, 100), (2.0, 100), (3.0, 1)]);
        let accepted =
            classify(&points, FrequencyScale::Linear, &ClassifierConfig::default()).unwrap();

        assert_eq!(accepted.last(), Some(&3.0));
    }

    #[test]
    fn logarithmic_scale_is_more_tolerant() {
        let points = table(&[(1.0, 1000), (2.0, 100), (3.0, 1000), (4.0, 1000)]);
        let config = ClassifierConfig::default();

        let linear = classify(&points, FrequencyScale::Linear, &config).unwrap();
        let log = classify(&points, FrequencyScale::Logarithmic, &config).unwrap();

        assert_eq!(linear, vec![1.0, 3.0, 4.0]);
        assert_eq!(log, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn classify_sources_keeps_source_keys() {
        let mut tables = BTreeMap::new();
        tables.insert("a".to_string(), table(&[(1.0, 5)]));
        tables.insert("b".to_string(), table(&[(1.0, 5), (2.0, 5), (3.0, 5)]));

        let out = classify_sources(&tables, FrequencyScale::Linear, &ClassifierConfig::default())
            .unwrap();

        assert_eq!(out["a"], vec![1.0]);
        assert_eq!(out["b"], vec![1.0, 2.0, 3.0]);
    }
}
