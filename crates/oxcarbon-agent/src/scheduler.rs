use crate::transmitter::{Endpoint, MetricSink};
use chrono::{DateTime, Utc};
use oxcarbon_collector::pipeline::MetricPipeline;
use oxcarbon_collector::registry::PluginRegistry;
use oxcarbon_collector::PluginInstance;
use oxcarbon_common::config::{ConfigStore, Configuration};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Builds the plugin registry for a configuration epoch. Called once at
/// startup and again after every successful reload.
pub type RegistryBuilder = Box<dyn Fn(&Configuration) -> PluginRegistry + Send>;

/// Configuration plus the plugin instances built from it. Replaced as a
/// whole on reload; never mutated mid-tick.
pub struct Epoch {
    pub config: Arc<Configuration>,
    pub plugins: Vec<PluginInstance>,
}

impl Epoch {
    fn build(config: Configuration, registry: &PluginRegistry) -> Self {
        let mut plugins = registry.instantiate_all();
        for plugin in &mut plugins {
            plugin.configure(&config);
        }
        let enabled = plugins.iter().filter(|p| p.descriptor.enabled).count();
        tracing::info!(
            plugins = plugins.len(),
            enabled,
            interval_secs = config.metric_send_interval_secs,
            "Configuration epoch ready"
        );
        Self {
            config: Arc::new(config),
            plugins,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Aligned timestamp carried by the batch.
    pub timestamp: DateTime<Utc>,
    pub metrics: usize,
    pub transmitted: bool,
    pub reloaded: bool,
    /// Wall-clock time spent collecting, transmitting and reload-checking.
    pub elapsed: Duration,
}

/// Truncates `now` down to a multiple of `interval_secs`, with sub-second
/// parts zeroed.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use oxcarbon_agent::scheduler::align_timestamp;
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 59).unwrap();
/// assert_eq!(align_timestamp(now, 60), Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
/// ```
pub fn align_timestamp(now: DateTime<Utc>, interval_secs: u64) -> DateTime<Utc> {
    let secs = now.timestamp();
    let interval = interval_secs.max(1) as i64;
    DateTime::from_timestamp(secs - secs.rem_euclid(interval), 0).unwrap_or(now)
}

/// Time left in the interval after `elapsed` of processing. Zero when
/// processing overran; the next tick then starts immediately and drift
/// accumulates instead of ticks being skipped.
pub fn sleep_duration(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Drives the collect, transmit, reload-check, sleep cycle.
pub struct Scheduler {
    store: ConfigStore,
    registry_builder: RegistryBuilder,
    sink: Box<dyn MetricSink>,
    epoch: Epoch,
}

impl Scheduler {
    /// `config` must be the result of `store.load()`.
    pub fn new(
        store: ConfigStore,
        config: Configuration,
        registry_builder: RegistryBuilder,
        sink: Box<dyn MetricSink>,
    ) -> Self {
        let registry = registry_builder(&config);
        let epoch = Epoch::build(config, &registry);
        Self {
            store,
            registry_builder,
            sink,
            epoch,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.epoch.config
    }

    pub fn plugins(&self) -> &[PluginInstance] {
        &self.epoch.plugins
    }

    /// Runs one full tick. Failures inside are logged, never returned.
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        let config = Arc::clone(&self.epoch.config);
        let timestamp = align_timestamp(Utc::now(), config.metric_send_interval_secs);

        let pipeline = MetricPipeline::new();
        let batch = pipeline
            .run(&mut self.epoch.plugins, &config, timestamp)
            .await;
        let metrics = batch.len();

        let endpoint = Endpoint::from_config(&config);
        let transmitted = match self.sink.send(&batch, &endpoint).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, count = metrics, error = %e, "Transmission failed, dropping batch");
                false
            }
        };
        drop(batch);

        let reloaded = self.reload_if_modified();

        let report = TickReport {
            timestamp,
            metrics,
            transmitted,
            reloaded,
            elapsed: started.elapsed(),
        };
        if config.show_output {
            tracing::info!(
                timestamp = %report.timestamp,
                metrics = report.metrics,
                transmitted = report.transmitted,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Tick complete"
            );
        } else {
            tracing::debug!(
                timestamp = %report.timestamp,
                metrics = report.metrics,
                transmitted = report.transmitted,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Tick complete"
            );
        }
        report
    }

    /// Swaps in a fresh epoch when the configuration file changed. A file
    /// that fails to load leaves the current epoch active.
    fn reload_if_modified(&mut self) -> bool {
        if !self.store.is_modified() {
            return false;
        }

        match self.store.load() {
            Ok(config) => {
                tracing::info!(path = %self.store.path().display(), "Configuration changed, reloading");
                let registry = (self.registry_builder)(&config);
                self.epoch = Epoch::build(config, &registry);
                true
            }
            Err(e) => {
                tracing::error!(path = %self.store.path().display(), error = %e, "Configuration reload failed, keeping previous configuration");
                false
            }
        }
    }

    /// Loops until `shutdown` is cancelled. Cancellation is observed at the
    /// top of each tick and during the sleep; a running tick always finishes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.epoch.config.metric_send_interval_secs,
            server = %Endpoint::from_config(&self.epoch.config),
            "Starting collection loop"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let report = self.tick().await;
            let interval = self.epoch.config.metric_send_interval();
            let sleep = sleep_duration(interval, report.elapsed);
            if sleep.is_zero() {
                tracing::warn!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    interval_secs = interval.as_secs(),
                    "Tick overran the interval, starting next tick immediately"
                );
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(sleep) => {}
            }
        }

        tracing::info!("Collection loop stopped");
    }
}
