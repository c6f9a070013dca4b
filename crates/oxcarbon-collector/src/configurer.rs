use crate::PluginDescriptor;
use oxcarbon_common::config::Configuration;
use std::time::Duration;

/// Per-section override of `PluginTimeoutSeconds`, in whole seconds.
pub const TIMEOUT_KEY: &str = "TimeoutSeconds";

/// Derives a plugin's effective descriptor from `config`.
///
/// A plugin is enabled only when its `ModulesConfigs` section exists and
/// carries `Enabled = true`. A missing section or a missing/false `Enabled`
/// leaves the plugin disabled with its other fields untouched. When enabled,
/// the global `MetricPath`/`NodeHostName` apply unless the section overrides
/// them with `CustomPrefix`/`CustomNodeHostName`, and the global plugin
/// timeout applies unless the section sets a positive `TimeoutSeconds`.
///
/// Pure: the result depends only on `config` and the descriptor's identity,
/// so applying it again after a reload is idempotent.
pub fn apply(config: &Configuration, descriptor: &PluginDescriptor) -> PluginDescriptor {
    let mut next = descriptor.clone();
    next.enabled = false;

    let Some(section) = config.module_configs.get(&descriptor.config_section_name) else {
        return next;
    };
    if section.enabled != Some(true) {
        return next;
    }

    next.enabled = true;
    next.metric_path = section
        .custom_prefix
        .clone()
        .unwrap_or_else(|| config.metric_path.clone());
    next.node_host_name = section
        .custom_node_host_name
        .clone()
        .unwrap_or_else(|| config.node_host_name.clone());
    next.timeout = section
        .setting(TIMEOUT_KEY)
        .and_then(|value| value.as_integer())
        .and_then(|secs| u64::try_from(secs).ok())
        .filter(|secs| *secs > 0)
        .map_or_else(|| config.plugin_timeout(), Duration::from_secs);
    next.config = Some(section.clone());
    next
}
