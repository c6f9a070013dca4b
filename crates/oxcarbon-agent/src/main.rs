use anyhow::Result;
use oxcarbon_agent::cli::{self, Invocation};
use oxcarbon_agent::scheduler::Scheduler;
use oxcarbon_agent::transmitter::CarbonTransmitter;
use oxcarbon_collector::registry::PluginRegistry;
use oxcarbon_common::config::{ConfigStore, Configuration};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// How long blocking-pool work may linger once the scheduler has stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run() -> Result<()> {
    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help) => {
            cli::print_usage();
            return Ok(());
        }
        Err(e) => {
            cli::print_usage();
            return Err(e);
        }
    };

    let level = if args.verbose { "oxcarbon=debug" } else { "oxcarbon=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let mut store = ConfigStore::new(&args.config_path);
    let config = store.load()?;
    tracing::info!(
        config = %args.config_path.display(),
        test_mode = args.test_mode,
        exclude_builtin = args.exclude_builtin,
        "oxcarbon-agent starting"
    );

    let include_builtin = !args.exclude_builtin;
    let plugin_dir_override = args.plugin_dir.clone();
    let registry_builder = Box::new(move |config: &Configuration| {
        let dir = plugin_dir_override
            .as_deref()
            .or(config.plugin_directory.as_deref());
        PluginRegistry::with_sources(include_builtin, dir)
    });

    let scheduler = Scheduler::new(
        store,
        config,
        registry_builder,
        Box::new(CarbonTransmitter::new(args.test_mode)),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down gracefully");
                signal_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Cannot listen for shutdown signal"),
        }
    });

    scheduler.run(shutdown).await;
    Ok(())
}
