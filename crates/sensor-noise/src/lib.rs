//! # Sensor Noise
//!
//! Quantization-noise reduction across sources. Each source's frequency table
//! is classified into significant values and noise, the per-source accepted
//! sets are reconciled into one canonical list of bin centres, and the mass of
//! rejected values is regrouped onto those bins.

use std::collections::BTreeMap;

use sensor_core::{FrequencyPoint, FrequencyScale, Result};

pub mod classifier;
pub mod regroup;
pub mod whitelist;

pub use classifier::{classify, classify_sources, ClassifierConfig};
pub use regroup::{proximity_threshold, regroup, RegroupedSource};
pub use whitelist::{aggregate, canonical_distance, search_position, Whitelist};

/// Outcome of the full classify -> aggregate -> regroup chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseReduction {
    pub whitelist: Whitelist,
    pub sources: BTreeMap<String, RegroupedSource>,
}

impl NoiseReduction {
    pub fn dropped_mass(&self) -> u64 {
        self.sources.values().map(RegroupedSource::dropped_mass).sum()
    }
}

/// Runs every noise-reduction stage over per-source frequency tables.
pub fn reduce_noise(
    tables: &BTreeMap<String, Vec<FrequencyPoint>>,
    scale: FrequencyScale,
    config: &ClassifierConfig,
) -> Result<NoiseReduction> {
    let accepted = classify_sources(tables, scale, config)?;
    let whitelist = aggregate(&accepted);
    let sources = tables
        .iter()
        .map(|(source, points)| (source.clone(), regroup(source, points, &whitelist.values)))
        .collect();
    Ok(NoiseReduction { whitelist, sources })
}
