//! Plugin framework and metric pipeline for the oxcarbon agent.
//!
//! A [`PluginFactory`] produces a [`PluginInstance`] (its Init capability).
//! Each instance pairs a [`PluginDescriptor`], recomputed from the active
//! configuration by [`configurer::apply`], with the boxed [`Plugin`] that
//! actually reads samples. The [`pipeline::MetricPipeline`] turns the samples
//! of all enabled instances into one [`MetricBatch`](oxcarbon_common::types::MetricBatch).

pub mod configurer;
pub mod error;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod sanitize;


use crate::error::{PluginError, Result};
use oxcarbon_common::config::{Configuration, ModuleConfig};
use oxcarbon_common::types::Sample;
use std::time::Duration;

/// Identity and effective settings of one plugin for the current
/// configuration epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    /// Unique within a run.
    pub plugin_name: String,
    /// Key into `ModulesConfigs`.
    pub config_section_name: String,
    pub enabled: bool,
    /// Effective prefix for this plugin's metric paths.
    pub metric_path: String,
    /// Effective host label.
    pub node_host_name: String,
    /// The matched `ModulesConfigs` section, set when enabled.
    pub config: Option<ModuleConfig>,
    /// Longest a single collection may run. Plugins that start external
    /// work must stop it once this elapses.
    pub timeout: Duration,
}

/// Collection bound of a descriptor no configuration has touched yet.
pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(60);

impl PluginDescriptor {
    /// A freshly initialised, disabled descriptor.
    pub fn new(plugin_name: impl Into<String>, config_section_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            config_section_name: config_section_name.into(),
            enabled: false,
            metric_path: String::new(),
            node_host_name: String::new(),
            config: None,
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }
}

/// A metric source.
///
/// Calls are synchronous and may block; the pipeline runs them on the
/// blocking pool under a timeout.
pub trait Plugin: Send {
    /// Reads plugin-specific settings from `descriptor.config`. Called after
    /// every (re)configuration that leaves the plugin enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the section holds invalid settings; the plugin is
    /// then disabled for the epoch.
    fn configure(&mut self, _descriptor: &PluginDescriptor) -> Result<()> {
        Ok(())
    }

    /// Collects the current samples. An empty vector is a valid result.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying data source cannot be read.
    fn get_metrics(&mut self, descriptor: &PluginDescriptor) -> anyhow::Result<Vec<Sample>>;
}

/// Creates plugin instances. Each call to [`init`](Self::init) yields a new,
/// independent instance with a disabled descriptor.
pub trait PluginFactory: Send + Sync {
    /// Plugin name, also used for logging.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`PluginError::Init`] if the plugin cannot be set up; the
    /// registry skips it.
    fn init(&self) -> Result<PluginInstance>;
}

/// A live plugin plus its descriptor.
pub struct PluginInstance {
    pub descriptor: PluginDescriptor,
    /// `None` once a call timed out or panicked; the instance stays
    /// unavailable until the next reload builds a fresh one.
    plugin: Option<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("descriptor", &self.descriptor)
            .field("available", &self.plugin.is_some())
            .finish()
    }
}

impl PluginInstance {
    pub fn new(descriptor: PluginDescriptor, plugin: Box<dyn Plugin>) -> Self {
        Self {
            descriptor,
            plugin: Some(plugin),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.plugin_name
    }

    pub fn is_available(&self) -> bool {
        self.plugin.is_some()
    }

    /// Applies `config` to the descriptor, then lets the plugin read its
    /// own settings.
    pub fn configure(&mut self, config: &Configuration) {
        self.descriptor = configurer::apply(config, &self.descriptor);
        if !self.descriptor.enabled {
            return;
        }
        let Some(plugin) = self.plugin.as_mut() else {
            return;
        };
        if let Err(e) = plugin.configure(&self.descriptor) {
            tracing::warn!(plugin = %self.descriptor.plugin_name, error = %e, "Plugin configuration rejected, disabling");
            self.descriptor.enabled = false;
        }
    }

    /// Runs [`Plugin::get_metrics`] on the blocking pool, bounded by `timeout`.
    pub async fn collect(&mut self, timeout: Duration) -> Result<Vec<Sample>> {
        let name = self.descriptor.plugin_name.clone();
        let Some(mut plugin) = self.plugin.take() else {
            return Err(PluginError::Unavailable { plugin: name });
        };
        let descriptor = self.descriptor.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let result = plugin.get_metrics(&descriptor);
            (plugin, result)
        });

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok((plugin, result))) => {
                self.plugin = Some(plugin);
                result.map_err(|source| PluginError::Sample {
                    plugin: name,
                    source,
                })
            }
            Ok(Err(join_error)) => Err(PluginError::Sample {
                plugin: name,
                source: anyhow::anyhow!("plugin task failed: {join_error}"),
            }),
            Err(_) => Err(PluginError::Timeout {
                plugin: name,
                timeout,
            }),
        }
    }
}
