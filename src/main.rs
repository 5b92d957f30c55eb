use std::future::IntoFuture;
use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use routekit::app;
use routekit::config::Config;
use routekit::logger::StdoutSink;
use routekit::logger::buffer::spawn_idle_sweeper;
use routekit::store::InMemoryArticleStore;
use routekit::telemetry;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    telemetry::init_tracing(config.log_format);

    config.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    let application = app::build(
        &config,
        Arc::new(InMemoryArticleStore::new()),
        Arc::new(StdoutSink),
    )
    .map_err(|e| {
        tracing::error!("Failed to bind routes: {}", e);
        e
    })?;

    let shutdown = CancellationToken::new();
    let sweeper = spawn_idle_sweeper(
        application.buffer.clone(),
        config.sweep_interval,
        config.trace_idle_timeout,
        shutdown.clone(),
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        e
    })?;
    tracing::info!("routekit listening on {}", addr);

    let mut server = tokio::spawn(
        axum::serve(listener, application.router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => {
            shutdown.cancel();
            let _ = sweeper.await;
            joined?.map_err(|e| {
                tracing::error!("Server error: {}", e);
                e
            })?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    shutdown.cancel();
    match tokio::time::timeout(config.shutdown_grace, &mut server).await {
        Ok(joined) => joined?.map_err(|e| {
            tracing::error!("Server error: {}", e);
            e
        })?,
        Err(_) => {
            tracing::warn!(
                "In-flight requests still running after {}; aborting",
                humantime::format_duration(config.shutdown_grace)
            );
            server.abort();
        }
    }
    let _ = sweeper.await;

    tracing::info!(traces = application.buffer.len(), "routekit stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
