//! # Density Engine
//!
//! Runs the full pipeline for the selected field and memoizes exactly one
//! result. Selecting another field, changing the filter, the sample limit or
//! the noise-reduction flag marks the slot dirty; the next [`DensityEngine::curve`]
//! call recomputes synchronously.

use std::collections::BTreeMap;

use sensor_core::{
    min_resolution, ordered_frequencies, CombinedDelta, CumulativeDensityPoint, DeltaInfo,
    DensityError, FieldMetadata, Observation, Result,
};
use sensor_noise::reduce_noise;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DensityConfig, RunOptions};
use crate::merge::DeltaMerger;
use crate::series::DeltaSeriesBuilder;

pub type ObservationFilter = Box<dyn Fn(&Observation) -> bool>;

/// Finished curve handed to the rendering side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCurve {
    pub field: String,
    pub metadata: FieldMetadata,
    pub combined: Vec<CombinedDelta>,
    pub cumulative: Vec<CumulativeDensityPoint>,
    pub zero_delta_span: f64,
    /// Frequency mass discarded past the last canonical bin.
    pub dropped_mass: u64,
    pub noise_reduced: bool,
}

/// Computes a density curve for one field's observations.
///
/// `observations` are expected to be the already-filtered, already-limited
/// selection. Per source, samples are ordered by time before deltas are built.
pub fn compute_density(
    field: &str,
    metadata: &FieldMetadata,
    observations: &[Observation],
    noise_reduction: bool,
    config: &DensityConfig,
) -> Result<DensityCurve> {
    for obs in observations {
        if let Some(value) = obs.value {
            metadata.check(value)?;
        }
    }

    let mut by_source: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        by_source
            .entry(obs.source_id.clone())
            .or_default()
            .push(obs.clone());
    }
    for samples in by_source.values_mut() {
        samples.sort_by(|a, b| a.time_index.total_cmp(&b.time_index));
    }

    let mut dropped_mass = 0;
    let mut bins: Option<BTreeMap<String, Vec<f64>>> = None;
    if noise_reduction {
        let tables = ordered_frequencies(observations);
        let reduction = reduce_noise(&tables, metadata.frequency_scale(), &config.classifier)?;
        dropped_mass = reduction.dropped_mass();
        for (source, samples) in by_source.iter_mut() {
            let Some(regrouped) = reduction.sources.get(source) else {
                continue;
            };
            for sample in samples.iter_mut() {
                sample.value = sample.value.and_then(|v| regrouped.bin_for(v));
            }
        }
        bins = Some(
            reduction
                .sources
                .iter()
                .map(|(source, regrouped)| (source.clone(), regrouped.bin_values()))
                .collect(),
        );
    }

    let min_res = min_resolution(
        by_source
            .values()
            .flatten()
            .filter_map(|sample| sample.value),
    );
    let builder = DeltaSeriesBuilder::new(config.resolution).with_min_resolution(min_res);
    let info = DeltaInfo::combine(by_source.values().map(|samples| builder.build(samples)));

    let merged = match &bins {
        Some(bins) => DeltaMerger::whitelist_aware(bins)
            .with_max_points(config.max_points)
            .merge(&info)?,
        None => DeltaMerger::plain()
            .with_max_points(config.max_points)
            .merge(&info)?,
    };

    debug!(
        field,
        sources = by_source.len(),
        spans = info.span_deltas.len(),
        spikes = info.spike_points.len(),
        points = merged.combined.len(),
        dropped_mass,
        "computed density curve"
    );

    Ok(DensityCurve {
        field: field.to_string(),
        metadata: *metadata,
        cumulative: merged.cumulative(),
        combined: merged.combined,
        zero_delta_span: info.zero_delta_span,
        dropped_mass,
        noise_reduced: noise_reduction,
    })
}

struct FieldSeries {
    metadata: FieldMetadata,
    observations: Vec<Observation>,
}

/// Owns the observations of every field and a single memoized curve.
pub struct DensityEngine {
    config: DensityConfig,
    fields: BTreeMap<String, FieldSeries>,
    selected: Option<String>,
    options: RunOptions,
    filter: Option<ObservationFilter>,
    cached: Option<DensityCurve>,
    dirty: bool,
}

impl DensityEngine {
    pub fn new(config: DensityConfig) -> Self {
        Self {
            config,
            fields: BTreeMap::new(),
            selected: None,
            options: RunOptions::default(),
            filter: None,
            cached: None,
            dirty: true,
        }
    }

    /// Registers (or replaces) a field's observations.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        metadata: FieldMetadata,
        observations: Vec<Observation>,
    ) {
        let name = name.into();
        if self.selected.as_deref() == Some(name.as_str()) {
            self.dirty = true;
        }
        self.fields.insert(
            name,
            FieldSeries {
                metadata,
                observations,
            },
        );
    }

    pub fn select_field(&mut self, name: &str) -> Result<()> {
        if !self.fields.contains_key(name) {
            return Err(DensityError::UnknownField(name.to_string()));
        }
        if self.selected.as_deref() != Some(name) {
            self.selected = Some(name.to_string());
            self.dirty = true;
        }
        Ok(())
    }

    pub fn selected_field(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn set_filter<F>(&mut self, filter: F)
    where
        F: Fn(&Observation) -> bool + 'static,
    {
        self.filter = Some(Box::new(filter));
        self.dirty = true;
    }

    pub fn clear_filter(&mut self) {
        if self.filter.take().is_some() {
            self.dirty = true;
        }
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        if self.options.limit != limit {
            self.options.limit = limit;
            self.dirty = true;
        }
    }

    pub fn set_noise_reduction(&mut self, enabled: bool) {
        if self.options.noise_reduction != enabled {
            self.options.noise_reduction = enabled;
            self.dirty = true;
        }
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the memoized curve, recomputing it first if any input changed.
    ///
    /// A failed recomputation clears the slot and leaves the engine dirty.
    pub fn curve(&mut self) -> Result<&DensityCurve> {
        if self.dirty || self.cached.is_none() {
            self.cached = None;
            let curve = self.recompute()?;
            self.cached = Some(curve);
            self.dirty = false;
        } else {
            debug!(field = ?self.selected, "density curve served from cache");
        }
        self.cached
            .as_ref()
            .ok_or_else(|| DensityError::InternalConsistency("memoized curve missing".into()))
    }

    fn recompute(&self) -> Result<DensityCurve> {
        let name = self
            .selected
            .as_deref()
            .ok_or_else(|| DensityError::UnknownField("no field selected".into()))?;
        let series = self
            .fields
            .get(name)
            .ok_or_else(|| DensityError::UnknownField(name.to_string()))?;

        let selection: Vec<Observation> = series
            .observations
            .iter()
            .filter(|obs| self.filter.as_ref().map_or(true, |keep| keep(*obs)))
            .take(self.options.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        debug!(
            field = name,
            selected = selection.len(),
            total = series.observations.len(),
            noise_reduction = self.options.noise_reduction,
            "recomputing density curve"
        );

        compute_density(
            name,
            &series.metadata,
            &selection,
            self.options.noise_reduction,
            &self.config,
        )
    }
}
