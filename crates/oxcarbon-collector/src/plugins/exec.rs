use crate::error::{self, PluginError};
use crate::{Plugin, PluginDescriptor, PluginFactory, PluginInstance};
use anyhow::{bail, Context, Result};
use oxcarbon_common::types::Sample;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Environment variable carrying the effective host label to the script.
pub const NODE_HOST_NAME_ENV: &str = "OXCARBON_NODE_HOST_NAME";

/// Maximum stderr characters quoted in a failure message.
const MAX_STDERR_CHARS: usize = 200;

/// An external executable in the plugin directory.
///
/// The plugin is named `exec:<stem>` and configured by the
/// `ModulesConfigs.<stem>` section, so `sql.sh` reads `[ModulesConfigs.sql]`.
pub struct ExecFactory {
    path: PathBuf,
    name: String,
    section: String,
}

impl ExecFactory {
    /// Returns `None` when the file name has no usable UTF-8 stem.
    pub fn new(path: PathBuf) -> Option<Self> {
        let section = path.file_stem()?.to_str()?.to_string();
        if section.is_empty() {
            return None;
        }
        Some(Self {
            name: format!("exec:{section}"),
            section,
            path,
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path)?;
    Ok(meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> std::io::Result<bool> {
    Ok(std::fs::metadata(path)?.is_file())
}

impl PluginFactory for ExecFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> error::Result<PluginInstance> {
        let executable = is_executable(&self.path).map_err(|e| PluginError::Init {
            plugin: self.name.clone(),
            reason: e.to_string(),
        })?;
        if !executable {
            return Err(PluginError::Init {
                plugin: self.name.clone(),
                reason: format!("{} is not executable", self.path.display()),
            });
        }
        Ok(PluginInstance::new(
            PluginDescriptor::new(&self.name, &self.section),
            Box::new(ExecPlugin {
                path: self.path.clone(),
                args: Vec::new(),
            }),
        ))
    }
}

/// Runs the executable and reads `path value [timestamp]` lines from stdout.
pub struct ExecPlugin {
    path: PathBuf,
    args: Vec<String>,
}

impl Plugin for ExecPlugin {
    fn configure(&mut self, descriptor: &PluginDescriptor) -> error::Result<()> {
        self.args = match &descriptor.config {
            Some(section) => section
                .string_list("Args")
                .map_err(|e| PluginError::Config {
                    plugin: descriptor.plugin_name.clone(),
                    reason: e.to_string(),
                })?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(())
    }

    /// Blocks the calling (blocking-pool) thread on the runtime until the
    /// child exits or `descriptor.timeout` passes. The child is killed when
    /// the wait is abandoned, whether by that deadline or by the runtime
    /// shutting down underneath it.
    fn get_metrics(&mut self, descriptor: &PluginDescriptor) -> Result<Vec<Sample>> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("exec plugins must run inside a tokio runtime")?;
        let mut command = Command::new(&self.path);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .env(NODE_HOST_NAME_ENV, &descriptor.node_host_name)
            .kill_on_drop(true);

        let timeout = descriptor.timeout;
        let output = match runtime.block_on(tokio::time::timeout(timeout, command.output())) {
            Ok(output) => output.with_context(|| format!("failed to run {}", self.path.display()))?,
            Err(_) => bail!("{} killed after {timeout:?}", self.path.display()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let snippet: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            bail!("{} exited with {}: {snippet}", self.path.display(), output.status);
        }

        Ok(parse_output(
            &descriptor.plugin_name,
            &String::from_utf8_lossy(&output.stdout),
        ))
    }
}

/// Parses plugin stdout. Blank lines and `#` comments are ignored; a
/// trailing timestamp column is accepted and discarded since the batch
/// carries its own. Malformed lines are logged and skipped.
pub fn parse_output(plugin: &str, text: &str) -> Vec<Sample> {
    let mut samples = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let parsed = match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(path), Some(value), _, None) => value.parse::<f64>().ok().map(|v| (path, v)),
            _ => None,
        };

        match parsed {
            Some((path, value)) => samples.push(Sample::new(path, value)),
            None => {
                tracing::warn!(plugin, line = lineno + 1, content = %line, "Malformed plugin output line");
            }
        }
    }

    samples
}
