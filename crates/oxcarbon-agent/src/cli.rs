use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";

/// Process-level controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentArgs {
    pub config_path: PathBuf,
    /// Print batches instead of sending them.
    pub test_mode: bool,
    /// Skip the built-in host metric plugins.
    pub exclude_builtin: bool,
    pub verbose: bool,
    /// Overrides `PluginDirectory` from the configuration file.
    pub plugin_dir: Option<PathBuf>,
}

impl Default for AgentArgs {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            test_mode: false,
            exclude_builtin: false,
            verbose: false,
            plugin_dir: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(AgentArgs),
    Help,
}

#[allow(clippy::print_stderr)]
pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  oxcarbon-agent [options] [config.toml]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --test-mode          Print batches to stdout instead of sending them");
    eprintln!("  --exclude-builtin    Do not run the built-in host metric plugins");
    eprintln!("  --plugin-dir <DIR>   Directory of executable plugins (overrides PluginDirectory)");
    eprintln!("  -v, --verbose        Debug-level diagnostics");
    eprintln!("  -h, --help           Show this help");
}

/// Parses arguments, excluding the program name.
pub fn parse_args<I, S>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parsed = AgentArgs::default();
    let mut config_path: Option<PathBuf> = None;
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "--test-mode" => parsed.test_mode = true,
            "--exclude-builtin" => parsed.exclude_builtin = true,
            "-v" | "--verbose" => parsed.verbose = true,
            "--plugin-dir" => {
                let Some(dir) = args.next() else {
                    bail!("--plugin-dir requires a directory argument");
                };
                parsed.plugin_dir = Some(PathBuf::from(dir));
            }
            flag if flag.starts_with('-') => bail!("unknown option: {flag}"),
            path => {
                if config_path.is_some() {
                    bail!("unexpected extra argument: {path}");
                }
                config_path = Some(PathBuf::from(path));
            }
        }
    }

    if let Some(path) = config_path {
        parsed.config_path = path;
    }
    Ok(Invocation::Run(parsed))
}
