//! Run configuration.

use anyhow::{bail, Context, Result};
use sensor_noise::ClassifierConfig;
use serde::{Deserialize, Serialize};

use crate::merge::MAX_COMBINED_POINTS;

/// Settings that stay fixed across recomputations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Sensor resolution used where the data has no nonzero gap to measure:
    /// the width of a lone sample and the flat-run threshold. Defaults to 1.
    pub resolution: Option<f64>,
    pub max_points: usize,
    pub classifier: ClassifierConfig,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            max_points: MAX_COMBINED_POINTS,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl DensityConfig {
    /// Parses and validates a JSON config; missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("failed to parse density config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(resolution) = self.resolution {
            if !(resolution.is_finite() && resolution > 0.0) {
                bail!("resolution must be a positive number, got {resolution}");
            }
        }
        if self.max_points == 0 {
            bail!("max_points must be at least 1");
        }
        let ratio = self.classifier.rejection_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            bail!("classifier.rejection_ratio must lie in [0, 1], got {ratio}");
        }
        if self.classifier.lookahead == 0 {
            bail!("classifier.lookahead must be at least 1");
        }
        Ok(())
    }
}

/// The per-request knobs; changing either invalidates a memoized curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub noise_reduction: bool,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = DensityConfig::from_json("{}").unwrap();
        assert_eq!(config, DensityConfig::default());
        assert_eq!(config.max_points, MAX_COMBINED_POINTS);
        assert_eq!(config.classifier.lookahead, 10);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config = DensityConfig::from_json(
            r#"{ "resolution": 0.1, "classifier": { "rejection_ratio": 0.1 } }"#,
        )
        .unwrap();

        assert_eq!(config.resolution, Some(0.1));
        assert_eq!(config.classifier.rejection_ratio, 0.1);
        assert_eq!(config.classifier.lookahead, 10);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(DensityConfig::from_json(r#"{ "resolution": -1.0 }"#).is_err());
        assert!(DensityConfig::from_json(r#"{ "max_points": 0 }"#).is_err());
        assert!(
            DensityConfig::from_json(r#"{ "classifier": { "rejection_ratio": 2.0 } }"#).is_err()
        );
        assert!(DensityConfig::from_json(r#"{ "classifier": { "lookahead": 0 } }"#).is_err());
        assert!(DensityConfig::from_json("not json").is_err());
    }
}
