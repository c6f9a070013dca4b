use std::path::PathBuf;

/// Errors raised while loading or validating the agent configuration.
///
/// Fatal at startup. During a hot reload the scheduler logs it and keeps the
/// previous configuration.
///
/// # Examples
///
/// ```rust
/// use oxcarbon_common::error::ConfigError;
///
/// let err = ConfigError::Invalid("MetricSendIntervalSeconds must be > 0".to_string());
/// assert!(err.to_string().contains("MetricSendIntervalSeconds"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read or stat'ed.
    #[error("Config: cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or is missing a required key.
    #[error("Config: parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A regular expression in `Filters` or `MetricReplace` does not compile.
    #[error("Config: invalid regex in {field}: {source}")]
    InvalidRegex {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// A value is present but out of range.
    #[error("Config: {0}")]
    Invalid(String),
}

/// Convenience `Result` alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
