use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;

use transfer_ledger::config::AppConfig;
use transfer_ledger::db::Database;
use transfer_ledger::gateway::{self, AppState};
use transfer_ledger::transfer::{LedgerStore, MonitorSpawner, TransferService};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

/// `--issue-token <sub>`: print a bearer token and exit
fn get_token_subject() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--issue-token" && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.postgres_url {
        Some(ref url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let store = db
                .ledger_store()
                .await
                .context("Failed to initialize ledger schema")?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "simulation")]
        None => {
            tracing::warn!("No postgres_url configured, using in-memory ledger (simulation)");
            Ok(Arc::new(transfer_ledger::MemoryLedgerStore::new()))
        }
        #[cfg(not(feature = "simulation"))]
        None => anyhow::bail!("postgres_url (or DATABASE_URL) is required"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }

    if let Some(sub) = get_token_subject() {
        let token = gateway::auth::issue_token(
            &app_config.jwt_secret,
            sub,
            chrono::Duration::hours(24),
        )?;
        println!("{}", token);
        return Ok(());
    }

    let _log_guard = transfer_ledger::logging::init_logging(&app_config)?;
    tracing::info!("Starting transfer ledger in {} mode", env);

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    transfer_ledger::metrics::init_metrics();

    // Drain histogram buffers between scrapes
    let upkeep_handle = metrics_handle.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            tick.tick().await;
            upkeep_handle.run_upkeep();
        }
    });

    // Only reachable in dev, `AppConfig::load` refuses it elsewhere
    if app_config.jwt_secret == transfer_ledger::config::DEFAULT_JWT_SECRET {
        tracing::warn!("Using the built-in JWT secret");
    }

    let store = open_store(&app_config).await?;
    tracing::info!(store = store.name(), "Ledger store ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitors = MonitorSpawner::new(
        app_config.monitor_policy(),
        app_config.monitor.max_concurrent,
    )
    .with_shutdown(shutdown_rx.clone());
    let service = TransferService::new(store, monitors.clone());

    let state = Arc::new(
        AppState::new(service, app_config.jwt_secret.clone()).with_metrics(metrics_handle),
    );

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    gateway::run_server(&app_config.gateway, state, async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .context("Gateway server error")?;

    tracing::info!(
        launched = monitors.launched(),
        live = monitors.live(),
        "Gateway stopped"
    );
    Ok(())
}
