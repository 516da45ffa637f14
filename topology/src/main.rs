mod api;
mod config;
mod graph;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::timeout;

use config::Config;
use graph::TopologyGraph;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = Config::load();
    let graph = Arc::new(TopologyGraph::new());

    let router = api::routes(graph.clone());
    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    log::info!("topology listening on {}", cfg.bind_addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            log::error!("topology server error: {e}");
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("ctrl-c received, shutting down");
        }
        _ = sigterm.recv() => {
            log::info!("sigterm received, shutting down");
        }
    }

    if timeout(Duration::from_secs(5), server).await.is_err() {
        log::warn!("topology server did not stop within the grace window");
    }

    Ok(())
}
