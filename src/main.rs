use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};

use surety_oracle::{
    api::{create_relay_router, RelayApiState},
    config::RelayConfig,
    ledger::{HttpLedgerClient, LedgerRpc, ListenerConfig, RequestListener},
    oracle::{build_pool, OracleCoordinator},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RelayConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check SURETY_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting Surety oracle relay");
    info!(
        "Pool size: {}, stake: {}, status code: {}",
        config.oracle.pool_size, config.oracle.stake, config.oracle.status_code
    );

    let seed = config.decode_seed()?;
    let pool = build_pool(&seed, config.oracle.pool_size);

    let ledger = Arc::new(HttpLedgerClient::new(
        config.ledger.rpc_url.clone(),
        Duration::from_secs(config.ledger.timeout_secs),
    )?);

    // The only fatal submission-path condition: a ledger we cannot reach
    // at all on startup.
    if !ledger.health_check().await {
        anyhow::bail!("Ledger endpoint {} is unreachable", config.ledger.rpc_url);
    }

    let ledger_rpc: Arc<dyn LedgerRpc> = ledger;
    let coordinator = Arc::new(OracleCoordinator::new(
        ledger_rpc,
        pool,
        config.oracle.stake,
        config.oracle.status_code,
    ));

    // Registration completes (every slot processed, successfully or not)
    // before the event subscription is opened.
    coordinator.register_all().await;

    let listener = Arc::new(RequestListener::new(ListenerConfig {
        ws_url: config.ledger.ws_url.clone(),
        from_block: config.stream.from_block,
        reconnect_delay_secs: config.stream.reconnect_delay_secs,
        max_reconnect_delay_secs: config.stream.max_reconnect_delay_secs,
    }));
    let requests = listener.subscribe();

    {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move {
            if let Err(e) = listener.start().await {
                error!("Request listener terminated: {}", e);
            }
        });
    }
    tokio::spawn(Arc::clone(&coordinator).run(requests));

    let app = create_relay_router(RelayApiState {
        coordinator: Arc::clone(&coordinator),
        listener: Arc::clone(&listener),
    })
    .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let tcp_listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;

    info!("Relay status server listening on {}", bind_addr);

    let shutdown = {
        let listener = Arc::clone(&listener);
        let coordinator = Arc::clone(&coordinator);
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            listener.stop().await;
            coordinator.stop().await;
        }
    };

    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Status server error")?;

    Ok(())
}

fn init_logging(config: &RelayConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
