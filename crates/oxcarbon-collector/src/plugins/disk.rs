use crate::error::{self, PluginError};
use crate::{Plugin, PluginDescriptor};
use anyhow::Result;
use oxcarbon_common::types::Sample;
use sysinfo::Disks;

/// Per-mount disk usage. The optional `Mounts` setting restricts output to
/// the listed mount points.
pub struct DiskPlugin {
    disks: Disks,
    mounts: Option<Vec<String>>,
}

impl DiskPlugin {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
            mounts: None,
        }
    }
}

impl Default for DiskPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a mount point into a single path segment: `/` is `root`,
/// `/var/log` is `var_log`, `C:\` is `C:`.
pub(crate) fn mount_label(mount: &str) -> String {
    let trimmed = mount.trim_matches(|c| c == '/' || c == '\\');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.replace(['/', '\\', '.'], "_")
    }
}

impl Plugin for DiskPlugin {
    fn configure(&mut self, descriptor: &PluginDescriptor) -> error::Result<()> {
        self.mounts = match &descriptor.config {
            Some(section) => section
                .string_list("Mounts")
                .map_err(|e| PluginError::Config {
                    plugin: descriptor.plugin_name.clone(),
                    reason: e.to_string(),
                })?,
            None => None,
        };
        Ok(())
    }

    fn get_metrics(&mut self, _descriptor: &PluginDescriptor) -> Result<Vec<Sample>> {
        self.disks.refresh();
        let mut samples = Vec::new();

        for disk in self.disks.iter() {
            let mount = disk.mount_point().to_string_lossy().to_string();
            if let Some(wanted) = &self.mounts {
                if !wanted.iter().any(|m| *m == mount) {
                    continue;
                }
            }

            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);
            let usage_pct = if total > 0 {
                (used as f64 / total as f64) * 100.0
            } else {
                0.0
            };

            let prefix = format!("{{host}}.disk.{}", mount_label(&mount));
            samples.push(Sample::new(format!("{prefix}.total"), total as f64));
            samples.push(Sample::new(format!("{prefix}.used"), used as f64));
            samples.push(Sample::new(format!("{prefix}.available"), available as f64));
            samples.push(Sample::new(format!("{prefix}.used_percent"), usage_pct));
        }

        Ok(samples)
    }
}
