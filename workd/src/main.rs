//! Work-platform job daemon.
//!
//! Runs the background job worker and the jobs admin API in one process.

use std::{net::SocketAddr, sync::Arc};

use clap::Parser as _;
use common::BoxError;
use job_runtime::{StoreExecutor, WorkerConfig, WorkerSupervisor, handlers};
use job_store::{JobStore, WorkerId};
use tracing::info;

#[derive(Debug, clap::Parser)]
struct Args {
    /// Postgres connection string for the job store
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Address to bind the admin API to
    #[arg(long, env = "WORKD_ADMIN_ADDR", default_value = "0.0.0.0:1620")]
    admin_addr: SocketAddr,

    /// Stable identity for this worker process. A random `worker-<hex>`
    /// identity is generated when omitted.
    #[arg(long, env = "WORKD_WORKER_ID")]
    worker_id: Option<WorkerId>,

    /// Connection pool size for the job store
    #[arg(long, env = "WORKD_POOL_SIZE", default_value_t = job_store::DEFAULT_POOL_SIZE)]
    pool_size: u32,
}

#[tokio::main]
async fn main() {
    match main_inner().await {
        Ok(()) => {}
        Err(e) => {
            // Manually print the error so we can control the format.
            eprintln!("Exiting with error: {e}");
            std::process::exit(1);
        }
    }
}

async fn main_inner() -> Result<(), BoxError> {
    common::tracing::register_logger();
    let args = Args::parse();

    let store = JobStore::connect_with_retry(&args.database_url, args.pool_size).await?;
    let config = WorkerConfig::from_env().map_err(|e| format!("failed to load config: {e}"))?;

    let registry = Arc::new(handlers::default_registry(store.clone()));
    let executor = Arc::new(StoreExecutor::new(store.clone(), args.worker_id, &config));

    let supervisor = WorkerSupervisor::new();
    supervisor.start(executor, registry, config).await;

    let ctx = admin_api::Ctx {
        store,
        supervisor: supervisor.clone(),
    };
    let (addr, serve_fut) = admin_api::serve(args.admin_addr, ctx).await?;
    info!(%addr, "admin api listening");

    tokio::select! {
        result = serve_fut => {
            supervisor.stop().await;
            result?;
            return Err("admin api shut down unexpectedly, it should run forever".into());
        }
        () = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    supervisor.stop().await;
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                // fall back to ctrl-c only
                if let Err(error) = tokio::signal::ctrl_c().await {
                    tracing::error!(%error, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
