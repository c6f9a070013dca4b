use std::time::Duration;

/// Errors raised by plugins and the plugin registry.
///
/// None of these are fatal: the registry skips a plugin that fails to
/// initialise, and the pipeline treats a failed collection as zero samples.
///
/// # Examples
///
/// ```rust
/// use oxcarbon_collector::error::PluginError;
///
/// let err = PluginError::Init {
///     plugin: "exec:sql".to_string(),
///     reason: "not executable".to_string(),
/// };
/// assert!(err.to_string().contains("exec:sql"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The factory could not create an instance.
    #[error("Plugin '{plugin}' failed to initialise: {reason}")]
    Init { plugin: String, reason: String },

    /// The plugin rejected its configuration section.
    #[error("Plugin '{plugin}' has invalid settings: {reason}")]
    Config { plugin: String, reason: String },

    /// `get_metrics` returned an error or panicked.
    #[error("Plugin '{plugin}' failed to collect samples: {source}")]
    Sample {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// `get_metrics` did not return within the configured timeout.
    #[error("Plugin '{plugin}' timed out after {timeout:?}")]
    Timeout { plugin: String, timeout: Duration },

    /// A previous call hung or panicked; the instance is gone until the next reload.
    #[error("Plugin '{plugin}' is unavailable until the next configuration reload")]
    Unavailable { plugin: String },
}

/// Convenience `Result` alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
