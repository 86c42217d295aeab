use std::path::PathBuf;
use std::sync::Arc;

use agent_bus::InProcessBus;
use agent_executor::{Executor, ExecutorConfig};
use agent_scheduler::{Scheduler, SchedulerConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "agent-runtime", about = "Host-resident task agent")]
struct Cli {
    /// Path to the scheduler/reactor YAML configuration.
    #[arg(long)]
    scheduler_config: PathBuf,

    /// Path to the executor YAML configuration.
    #[arg(long)]
    executor_config: PathBuf,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let scheduler_config = SchedulerConfig::load(&cli.scheduler_config)
        .with_context(|| format!("loading scheduler config from {:?}", cli.scheduler_config))?;
    let executor_config = ExecutorConfig::load(&cli.executor_config)
        .with_context(|| format!("loading executor config from {:?}", cli.executor_config))?;

    let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new());
    let cancel = CancellationToken::new();

    let scheduler = Scheduler::new(&scheduler_config, bus.clone())
        .context("building scheduler registry")?;
    let executor = Arc::new(Executor::new(executor_config, bus.clone()));

    info!("agent-runtime starting");

    let scheduler_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };
    let executor_handle = {
        let cancel = cancel.clone();
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(cancel).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received, draining components");
    cancel.cancel();

    let _ = scheduler_handle.await;
    let _ = executor_handle.await;

    info!("agent-runtime stopped");
    Ok(())
}
