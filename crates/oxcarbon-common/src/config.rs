use crate::error::{ConfigError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Validated, process-wide agent configuration.
///
/// Built once per load from the TOML document; regexes are compiled and
/// every module section is decoded up front, so nothing is looked up
/// reflectively at tick time. A reload produces a new value, never mutates
/// an existing one.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub metric_send_interval_secs: u64,
    pub carbon_server: String,
    pub carbon_server_port: u16,
    pub send_using_udp: bool,
    pub show_output: bool,
    /// Default metric path prefix for enabled plugins.
    pub metric_path: String,
    /// Default host label substituted into sample paths.
    pub node_host_name: String,
    /// Samples whose raw path matches are dropped.
    pub filters: Option<Regex>,
    /// Applied in order during sanitization.
    pub metric_replace: Vec<ReplaceRule>,
    pub module_configs: HashMap<String, ModuleConfig>,
    pub plugin_directory: Option<PathBuf>,
    pub plugin_timeout_secs: u64,
    pub transmit_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ReplaceRule {
    pub find: Regex,
    pub replace_with: String,
}

/// One `ModulesConfigs.<section>` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleConfig {
    /// `None` when the section carries no `Enabled` key.
    pub enabled: Option<bool>,
    pub custom_prefix: Option<String>,
    pub custom_node_host_name: Option<String>,
    /// Plugin-specific keys, handed to the plugin untouched.
    pub settings: toml::Table,
}

impl ModuleConfig {
    pub fn setting(&self, key: &str) -> Option<&toml::Value> {
        self.settings.get(key)
    }

    /// Reads an optional array-of-strings setting.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.settings.get(key) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| ConfigError::Invalid(format!("{key} must be an array of strings")))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::Invalid(format!("{key} must be an array of strings")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    metric_send_interval_seconds: u64,
    carbon_server: String,
    carbon_server_port: u16,
    metric_path: String,
    #[serde(default)]
    node_host_name: Option<String>,
    #[serde(default, rename = "SendUsingUDP")]
    send_using_udp: bool,
    #[serde(default)]
    show_output: bool,
    #[serde(default)]
    filters: Option<String>,
    #[serde(default)]
    metric_replace: Vec<RawReplaceRule>,
    #[serde(default)]
    modules_configs: HashMap<String, RawModuleConfig>,
    #[serde(default)]
    plugin_directory: Option<PathBuf>,
    #[serde(default)]
    plugin_timeout_seconds: Option<u64>,
    #[serde(default = "default_transmit_timeout")]
    transmit_timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawReplaceRule {
    find: String,
    #[serde(default)]
    replace_with: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawModuleConfig {
    #[serde(default)]
    enabled: Option<EnabledFlag>,
    #[serde(default)]
    custom_prefix: Option<String>,
    #[serde(default)]
    custom_node_host_name: Option<String>,
    #[serde(flatten)]
    settings: toml::Table,
}

/// `Enabled` may be written as a TOML bool or as a `"true"`/`"false"` string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnabledFlag {
    Bool(bool),
    Text(String),
}

impl EnabledFlag {
    fn is_true(&self) -> bool {
        match self {
            EnabledFlag::Bool(b) => *b,
            EnabledFlag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

fn default_transmit_timeout() -> u64 {
    10
}

fn default_node_host_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}

impl Configuration {
    /// Reads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, is not valid TOML,
    /// lacks a required key, or carries an invalid value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    pub fn metric_send_interval(&self) -> Duration {
        Duration::from_secs(self.metric_send_interval_secs)
    }

    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_timeout_secs)
    }

    pub fn transmit_timeout(&self) -> Duration {
        Duration::from_secs(self.transmit_timeout_secs)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if raw.metric_send_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "MetricSendIntervalSeconds must be greater than 0".to_string(),
            ));
        }
        if raw.carbon_server.trim().is_empty() {
            return Err(ConfigError::Invalid("CarbonServer must not be empty".to_string()));
        }
        if raw.carbon_server_port == 0 {
            return Err(ConfigError::Invalid("CarbonServerPort must not be 0".to_string()));
        }
        if raw.plugin_timeout_seconds == Some(0) || raw.transmit_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than 0".to_string()));
        }

        let filters = match raw.filters.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(pattern) => Some(Regex::new(pattern).map_err(|source| {
                ConfigError::InvalidRegex {
                    field: "Filters".to_string(),
                    source,
                }
            })?),
        };

        let metric_replace = raw
            .metric_replace
            .into_iter()
            .enumerate()
            .map(|(i, rule)| {
                let find = Regex::new(&rule.find).map_err(|source| ConfigError::InvalidRegex {
                    field: format!("MetricReplace[{i}].Find"),
                    source,
                })?;
                Ok(ReplaceRule {
                    find,
                    replace_with: rule.replace_with,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let module_configs = raw
            .modules_configs
            .into_iter()
            .map(|(name, section)| {
                let module = ModuleConfig {
                    enabled: section.enabled.as_ref().map(EnabledFlag::is_true),
                    custom_prefix: section.custom_prefix,
                    custom_node_host_name: section.custom_node_host_name,
                    settings: section.settings,
                };
                (name, module)
            })
            .collect();

        let node_host_name = raw
            .node_host_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(default_node_host_name);

        Ok(Self {
            plugin_timeout_secs: raw
                .plugin_timeout_seconds
                .unwrap_or(raw.metric_send_interval_seconds),
            metric_send_interval_secs: raw.metric_send_interval_seconds,
            carbon_server: raw.carbon_server.trim().to_string(),
            carbon_server_port: raw.carbon_server_port,
            send_using_udp: raw.send_using_udp,
            show_output: raw.show_output,
            metric_path: raw.metric_path,
            node_host_name,
            filters,
            metric_replace,
            module_configs,
            plugin_directory: raw.plugin_directory,
            transmit_timeout_secs: raw.transmit_timeout_seconds,
        })
    }
}

impl std::str::FromStr for Configuration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s)?;
        Self::from_raw(raw)
    }
}

/// Returns the modification time of `path`.
pub fn modified_time(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Tracks the configuration file and detects out-of-band edits by
/// modification time.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file and records its modification time.
    ///
    /// The timestamp is recorded before parsing, so a broken edit is only
    /// reported once; the next save triggers a fresh attempt.
    pub fn load(&mut self) -> Result<Configuration> {
        self.last_modified = Some(modified_time(&self.path)?);
        Configuration::load(&self.path)
    }

    /// Cheap stat check: has the file changed since the last [`load`](Self::load)?
    ///
    /// A file that cannot be stat'ed (e.g. mid-rename by an editor) counts as
    /// unchanged.
    pub fn is_modified(&self) -> bool {
        match modified_time(&self.path) {
            Ok(current) => Some(current) != self.last_modified,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Config stat failed");
                false
            }
        }
    }
}
