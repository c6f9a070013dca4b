use crate::sanitize::sanitize;
use crate::{PluginDescriptor, PluginInstance};
use chrono::{DateTime, Utc};
use oxcarbon_common::config::Configuration;
use oxcarbon_common::types::{MetricBatch, Sample};
use std::time::Duration;

/// Collects one tick's worth of samples from every enabled plugin and folds
/// them into a [`MetricBatch`].
///
/// Each plugin is waited on for its descriptor timeout plus
/// [`COLLECT_GRACE`], so a plugin that enforces its own deadline reports
/// first and stays available.
#[derive(Debug, Default, Clone)]
pub struct MetricPipeline;

/// Slack added on top of a descriptor's timeout before a call is abandoned.
pub const COLLECT_GRACE: Duration = Duration::from_secs(1);

/// Per-fold counters, for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FoldStats {
    pub accepted: usize,
    pub filtered: usize,
    pub dropped: usize,
}

impl MetricPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Visits enabled plugins in registry order. A plugin that fails or
    /// times out contributes nothing to this tick; the rest proceed.
    pub async fn run(
        &self,
        plugins: &mut [PluginInstance],
        config: &Configuration,
        timestamp: DateTime<Utc>,
    ) -> MetricBatch {
        let mut batch = MetricBatch::new(timestamp);

        for instance in plugins.iter_mut().filter(|p| p.descriptor.enabled) {
            let samples = match instance
                .collect(instance.descriptor.timeout + COLLECT_GRACE)
                .await {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(plugin = %instance.name(), error = %e, "Collection failed");
                    continue;
                }
            };
            let stats = fold_samples(&mut batch, &instance.descriptor, samples, config);
            tracing::debug!(
                plugin = %instance.name(),
                accepted = stats.accepted,
                filtered = stats.filtered,
                dropped = stats.dropped,
                "Plugin samples folded"
            );
        }

        batch
    }
}

/// Filters, sanitizes and inserts `samples` into `batch`.
///
/// A sample whose raw path matches `config.filters` never enters the batch.
/// Accepted samples land at `metric_path + "." + sanitize(path)`, replacing
/// any earlier value at the same path.
pub fn fold_samples(
    batch: &mut MetricBatch,
    descriptor: &PluginDescriptor,
    samples: Vec<Sample>,
    config: &Configuration,
) -> FoldStats {
    let mut stats = FoldStats::default();

    for sample in samples {
        if config
            .filters
            .as_ref()
            .is_some_and(|filter| filter.is_match(&sample.path))
        {
            stats.filtered += 1;
            continue;
        }
        if !sample.value.is_finite() {
            tracing::debug!(plugin = %descriptor.plugin_name, path = %sample.path, "Dropping non-finite sample");
            stats.dropped += 1;
            continue;
        }

        let clean = sanitize(
            &sample.path,
            &descriptor.node_host_name,
            &config.metric_replace,
        );
        if clean.is_empty() {
            tracing::debug!(plugin = %descriptor.plugin_name, path = %sample.path, "Dropping sample with empty path");
            stats.dropped += 1;
            continue;
        }

        let final_path = if descriptor.metric_path.is_empty() {
            clean
        } else {
            format!("{}.{}", descriptor.metric_path, clean)
        };
        batch.insert(final_path, sample.value);
        stats.accepted += 1;
    }

    stats
}
