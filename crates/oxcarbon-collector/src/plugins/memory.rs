use crate::{Plugin, PluginDescriptor};
use anyhow::Result;
use oxcarbon_common::types::Sample;
use sysinfo::System;

pub struct MemoryPlugin {
    system: System,
}

impl MemoryPlugin {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

impl Plugin for MemoryPlugin {
    fn get_metrics(&mut self, _descriptor: &PluginDescriptor) -> Result<Vec<Sample>> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let available = self.system.available_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        Ok(vec![
            Sample::new("{host}.memory.total", total as f64),
            Sample::new("{host}.memory.used", used as f64),
            Sample::new("{host}.memory.available", available as f64),
            Sample::new("{host}.memory.used_percent", percent(used, total)),
            Sample::new("{host}.memory.swap_total", swap_total as f64),
            Sample::new("{host}.memory.swap_used", swap_used as f64),
            Sample::new("{host}.memory.swap_percent", percent(swap_used, swap_total)),
        ])
    }
}
