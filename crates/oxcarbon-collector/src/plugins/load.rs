use crate::{Plugin, PluginDescriptor};
use anyhow::Result;
use oxcarbon_common::types::Sample;
use sysinfo::System;

pub struct LoadPlugin;

impl LoadPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoadPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for LoadPlugin {
    fn get_metrics(&mut self, _descriptor: &PluginDescriptor) -> Result<Vec<Sample>> {
        let load_avg = System::load_average();
        let uptime = System::uptime();

        Ok(vec![
            Sample::new("{host}.system.load_1", load_avg.one),
            Sample::new("{host}.system.load_5", load_avg.five),
            Sample::new("{host}.system.load_15", load_avg.fifteen),
            Sample::new("{host}.system.uptime", uptime as f64),
        ])
    }
}
