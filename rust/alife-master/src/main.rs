// alife-master: Entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use alife_master::metrics::MasterMetrics;
use alife_master::pool::CisClientPool;
use alife_master::websocket::ViewerHub;
use alife_master::{http, rpc, MasterConfig, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = MasterConfig::parse();
    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return Err(err.into());
    }

    let metrics = Arc::new(MasterMetrics::new()?);
    let pool = Arc::new(CisClientPool::new(config.conn_buffer_size));
    let hub = ViewerHub::new(Arc::clone(&metrics));

    info!(
        grpc_port = config.grpc_port,
        http_port = config.http_port,
        bucket_width = config.bucket_width,
        conn_buffer_size = config.conn_buffer_size,
        "starting alife master"
    );

    // Bind both listeners up front; a port that cannot be bound is fatal.
    let grpc_listener = rpc::bind(config.grpc_port).await.map_err(|err| {
        error!(port = config.grpc_port, error = %err, "failed to bind gRPC listener");
        err
    })?;
    let http_listener = http::bind(config.http_port).await.map_err(|err| {
        error!(port = config.http_port, error = %err, "failed to bind HTTP listener");
        err
    })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let grpc_task = tokio::spawn(rpc::serve(
        grpc_listener,
        Arc::clone(&pool),
        Arc::clone(&metrics),
        shutdown_signal(shutdown_rx.clone()),
    ));
    let http_task = tokio::spawn(http::serve(
        http_listener,
        Arc::clone(&hub),
        Arc::clone(&metrics),
        shutdown_signal(shutdown_rx.clone()),
    ));

    let mut server = Server::new(config, pool, Arc::clone(&hub), metrics);
    server.init_universe().await.map_err(|err| {
        error!(error = %err, "failed to initialize universe");
        err
    })?;

    let mut interrupt = std::pin::pin!(interrupt());
    loop {
        tokio::select! {
            _ = interrupt.as_mut() => {
                info!("shutdown signal received");
                break;
            }
            stepped = server.run_step() => stepped?,
        }
    }

    // Stop the listeners, give HTTP a short grace period, close viewers,
    // then make a best-effort snapshot.
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(1), http_task)
        .await
        .is_err()
    {
        warn!("HTTP server did not drain within the shutdown grace period");
    }
    let _ = tokio::time::timeout(Duration::from_secs(1), grpc_task).await;

    hub.shutdown().await;

    match server.save_state() {
        Ok(state_name) => info!(state = %state_name, "simulation state saved"),
        Err(err) => warn!(error = %err, "failed to save simulation state"),
    }

    Ok(())
}

async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            return;
        }
    }
}

#[cfg(unix)]
async fn interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn interrupt() {
    let _ = tokio::signal::ctrl_c().await;
}
