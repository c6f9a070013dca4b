use crate::error::{self, PluginError};
use crate::{Plugin, PluginDescriptor};
use anyhow::Result;
use oxcarbon_common::types::Sample;
use std::collections::HashMap;
use sysinfo::Networks;

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    received: u64,
    transmitted: u64,
    packets_received: u64,
    packets_transmitted: u64,
}

/// Per-interface traffic since the previous tick. The first tick reports
/// zero deltas. The optional `Interfaces` setting restricts output.
pub struct NetworkPlugin {
    networks: Networks,
    previous: HashMap<String, Counters>,
    interfaces: Option<Vec<String>>,
}

impl NetworkPlugin {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            previous: HashMap::new(),
            interfaces: None,
        }
    }
}

impl Default for NetworkPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for NetworkPlugin {
    fn configure(&mut self, descriptor: &PluginDescriptor) -> error::Result<()> {
        self.interfaces = match &descriptor.config {
            Some(section) => section
                .string_list("Interfaces")
                .map_err(|e| PluginError::Config {
                    plugin: descriptor.plugin_name.clone(),
                    reason: e.to_string(),
                })?,
            None => None,
        };
        Ok(())
    }

    fn get_metrics(&mut self, _descriptor: &PluginDescriptor) -> Result<Vec<Sample>> {
        self.networks.refresh();
        let mut samples = Vec::new();

        for (name, data) in self.networks.iter() {
            if let Some(wanted) = &self.interfaces {
                if !wanted.iter().any(|i| i == name) {
                    continue;
                }
            }

            let current = Counters {
                received: data.total_received(),
                transmitted: data.total_transmitted(),
                packets_received: data.total_packets_received(),
                packets_transmitted: data.total_packets_transmitted(),
            };
            let prev = self.previous.insert(name.clone(), current).unwrap_or(current);

            let prefix = format!("{{host}}.network.{name}");
            samples.push(Sample::new(
                format!("{prefix}.bytes_recv"),
                current.received.saturating_sub(prev.received) as f64,
            ));
            samples.push(Sample::new(
                format!("{prefix}.bytes_sent"),
                current.transmitted.saturating_sub(prev.transmitted) as f64,
            ));
            samples.push(Sample::new(
                format!("{prefix}.packets_recv"),
                current.packets_received.saturating_sub(prev.packets_received) as f64,
            ));
            samples.push(Sample::new(
                format!("{prefix}.packets_sent"),
                current
                    .packets_transmitted
                    .saturating_sub(prev.packets_transmitted) as f64,
            ));
        }

        Ok(samples)
    }
}
