//! Autoheal Daemon - self-healing control loop service
//!
//! Runs the MAPE-K loop against a simulated fleet:
//! - random CPU metrics per target
//! - threshold analysis and rule-based planning
//! - logging executors for every remediation strategy
//! - graceful stop on Ctrl+C or SIGTERM

use std::sync::Arc;

use autoheal_daemon::{reporter, simulation, DaemonConfig, DaemonResult};
use autoheal_loop::MapeKLoop;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Autoheal Daemon CLI
#[derive(Parser)]
#[command(name = "autohealed")]
#[command(about = "Autoheal Daemon - autonomic self-healing control loop", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AUTOHEAL_CONFIG")]
    config: Option<String>,

    /// Seconds between cycles
    #[arg(short = 'i', long, env = "AUTOHEAL_CYCLE_INTERVAL")]
    cycle_interval: Option<u64>,

    /// Knowledge store capacity
    #[arg(long, env = "AUTOHEAL_MAX_KNOWLEDGE_ENTRIES")]
    max_knowledge_entries: Option<usize>,

    /// Default action timeout in seconds
    #[arg(long, env = "AUTOHEAL_ACTION_TIMEOUT")]
    action_timeout: Option<u64>,

    /// Simulation RNG seed
    #[arg(long, env = "AUTOHEAL_SEED")]
    seed: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, env = "AUTOHEAL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "AUTOHEAL_LOG_JSON")]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(secs) = self.cycle_interval {
            config.engine.cycle_interval_secs = secs;
        }
        if let Some(max) = self.max_knowledge_entries {
            config.engine.max_knowledge_entries = max;
        }
        if let Some(secs) = self.action_timeout {
            config.engine.default_action_timeout_secs = secs;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json {
            config.logging.json = true;
        }
    }
}

fn init_tracing(config: &DaemonConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration, then override with CLI args
    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    init_tracing(&config);

    let mapek = Arc::new(MapeKLoop::new(config.engine.clone())?);
    simulation::install(&mapek, &config.simulation);
    let reporter = tokio::spawn(reporter::report(mapek.subscribe()));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs = config.engine.cycle_interval_secs,
        targets = ?config.simulation.targets,
        "Autoheal daemon starting"
    );

    if cli.once {
        let record = mapek.run_cycle().await;
        info!(cycle = %record, "Single cycle finished");
    } else {
        let handle = mapek.start()?;
        shutdown_signal().await?;
        handle.stop().await;
    }

    let stats = mapek.stats();
    info!(
        cycles = stats.cycles,
        anomalies = stats.anomalies,
        jobs_completed = stats.jobs_completed,
        jobs_failed = stats.jobs_failed,
        awaiting_approval = stats.plans_skipped,
        "Autoheal daemon stopped"
    );

    drop(mapek);
    let _ = reporter.await;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> DaemonResult<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate.recv() => {
                info!("Received terminate signal, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}
