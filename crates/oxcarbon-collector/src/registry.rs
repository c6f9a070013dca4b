use crate::plugins::builtin_factories;
use crate::plugins::exec::ExecFactory;
use crate::{PluginFactory, PluginInstance};
use std::collections::HashSet;
use std::path::Path;

/// Ordered set of [`PluginFactory`]s. Registration order is the order in
/// which plugins are collected, and therefore decides which sample wins when
/// two of them produce the same metric path.
///
/// # Examples
///
/// ```
/// use oxcarbon_collector::registry::PluginRegistry;
///
/// let registry = PluginRegistry::default();
/// assert_eq!(registry.factory_names(), vec!["cpu", "memory", "disk", "network", "load"]);
/// ```
pub struct PluginRegistry {
    factories: Vec<Box<dyn PluginFactory>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Builds the registry for one configuration epoch: built-in plugins
    /// unless excluded, followed by external plugins found in `plugin_dir`.
    pub fn with_sources(include_builtin: bool, plugin_dir: Option<&Path>) -> Self {
        let mut registry = Self::new();
        if include_builtin {
            for factory in builtin_factories() {
                registry.register(factory);
            }
        }
        if let Some(dir) = plugin_dir {
            for factory in discover(dir) {
                registry.register(factory);
            }
        }
        registry
    }

    pub fn register(&mut self, factory: Box<dyn PluginFactory>) {
        self.factories.push(factory);
    }

    pub fn factory_names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Invokes every factory's `init` exactly once.
    ///
    /// Failed factories and duplicate plugin names are logged and skipped;
    /// one broken plugin never empties the whole set.
    pub fn instantiate_all(&self) -> Vec<PluginInstance> {
        let mut seen = HashSet::new();
        let mut instances = Vec::with_capacity(self.factories.len());

        for factory in &self.factories {
            match factory.init() {
                Ok(instance) => {
                    if !seen.insert(instance.name().to_string()) {
                        tracing::warn!(plugin = %instance.name(), "Duplicate plugin name, skipping");
                        continue;
                    }
                    instances.push(instance);
                }
                Err(e) => {
                    tracing::warn!(factory = factory.name(), error = %e, "Plugin init failed, skipping");
                }
            }
        }

        tracing::debug!(count = instances.len(), "Plugins instantiated");
        instances
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_sources(true, None)
    }
}

/// Enumerates external plugins in `dir`: every regular, non-hidden file,
/// sorted by file name. An unreadable directory yields no plugins.
pub fn discover(dir: &Path) -> Vec<Box<dyn PluginFactory>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot read plugin directory");
            return Vec::new();
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(ExecFactory::new)
        .map(|factory| Box::new(factory) as Box<dyn PluginFactory>)
        .collect()
}
