//! Built-in host metric plugins and the external `exec` plugin.
//!
//! Built-in plugins prefix their paths with `{host}` so the sanitizer can
//! substitute the effective host label.

pub mod cpu;
pub mod disk;
pub mod exec;
pub mod load;
pub mod memory;
pub mod network;

use crate::error::{PluginError, Result};
use crate::{Plugin, PluginDescriptor, PluginFactory, PluginInstance};

/// Factory for a plugin compiled into the agent.
pub struct BuiltinFactory {
    name: &'static str,
    section: &'static str,
    build: fn() -> Box<dyn Plugin>,
}

impl BuiltinFactory {
    pub fn new(name: &'static str, section: &'static str, build: fn() -> Box<dyn Plugin>) -> Self {
        Self {
            name,
            section,
            build,
        }
    }
}

impl PluginFactory for BuiltinFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn init(&self) -> Result<PluginInstance> {
        Ok(PluginInstance::new(
            PluginDescriptor::new(self.name, self.section),
            (self.build)(),
        ))
    }
}

/// The built-in plugins, in collection order.
pub fn builtin_factories() -> Vec<Box<dyn PluginFactory>> {
    vec![
        Box::new(BuiltinFactory::new("cpu", "Cpu", || -> Box<dyn Plugin> {
            Box::new(cpu::CpuPlugin::new())
        })),
        Box::new(BuiltinFactory::new("memory", "Memory", || -> Box<dyn Plugin> {
            Box::new(memory::MemoryPlugin::new())
        })),
        Box::new(BuiltinFactory::new("disk", "Disk", || -> Box<dyn Plugin> {
            Box::new(disk::DiskPlugin::new())
        })),
        Box::new(BuiltinFactory::new("network", "Network", || -> Box<dyn Plugin> {
            Box::new(network::NetworkPlugin::new())
        })),
        Box::new(BuiltinFactory::new("load", "Load", || -> Box<dyn Plugin> {
            Box::new(load::LoadPlugin::new())
        })),
    ]
}
