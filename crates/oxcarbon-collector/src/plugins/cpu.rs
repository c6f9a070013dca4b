use crate::{Plugin, PluginDescriptor};
use anyhow::Result;
use oxcarbon_common::types::Sample;
use sysinfo::System;

pub struct CpuPlugin {
    system: System,
}

impl CpuPlugin {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CpuPlugin {
    fn get_metrics(&mut self, _descriptor: &PluginDescriptor) -> Result<Vec<Sample>> {
        self.system.refresh_cpu_all();
        let mut samples = Vec::with_capacity(self.system.cpus().len() + 1);

        samples.push(Sample::new(
            "{host}.cpu.usage",
            self.system.global_cpu_usage() as f64,
        ));
        for (i, cpu) in self.system.cpus().iter().enumerate() {
            samples.push(Sample::new(
                format!("{{host}}.cpu.core{i}.usage"),
                cpu.cpu_usage() as f64,
            ));
        }

        Ok(samples)
    }
}
