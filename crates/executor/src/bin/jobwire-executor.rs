//! jobwire-executor: serves the scheduler center's control endpoints.
//!
//! Registers with the scheduler immediately and then on every heartbeat tick.
//! On SIGINT, SIGTERM or SIGQUIT the executor de-registers once and exits
//! without waiting for running tasks.

use std::future::IntoFuture;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use jobwire_core::config::{self, Config};
use jobwire_executor::demo::register_demo_jobs;
use jobwire_executor::{build_router, Executor};

// ── CLI ─────────────────────────────────────────────────────────────

/// Job executor agent for a distributed scheduler.
#[derive(Parser, Debug)]
#[command(name = "jobwire-executor", version, about)]
struct Cli {
    /// Config profile; `PROD` reads `PROD_SERVER_ADDR` before `SERVER_ADDR`.
    /// Falls back to `JOBWIRE_PROFILE` when omitted.
    #[arg(long)]
    profile: Option<String>,

    /// Listen and advertised port, overriding EXECUTOR_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Skip registering the bundled sample jobs.
    #[arg(long)]
    no_demo: bool,
}

async fn shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                Ok("SIGINT")
            }
            _ = term.recv() => Ok("SIGTERM"),
            _ = quit.recv() => Ok("SIGQUIT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();

    let mut config = match cli.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(port) = cli.port {
        config.executor.port = port;
    }
    config.validate()?;
    config.log_summary();

    let executor = Executor::from_config(&config)?.build();
    if !cli.no_demo {
        register_demo_jobs(&executor);
    }
    info!(handlers = ?executor.handler_names(), "Handlers ready");

    let shutdown = CancellationToken::new();
    let heartbeat = executor.heartbeat();
    let heartbeat_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { heartbeat.run(shutdown).await })
    };

    let listener = TcpListener::bind(("0.0.0.0", config.executor.port)).await?;
    info!(address = %config.executor.base_url(), "Starting server");
    let server = axum::serve(listener, build_router(Arc::clone(&executor))).into_future();

    tokio::select! {
        res = server => res?,
        sig = shutdown_signal() => {
            info!(signal = sig?, "Shutdown signal received");
        }
    }

    shutdown.cancel();
    if let Err(e) = heartbeat_task.await {
        warn!(error = %e, "Heartbeat task ended abnormally");
    }
    executor.stop().await;
    info!("jobwire-executor exited");

    Ok(())
}
