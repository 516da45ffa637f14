mod api;
mod config;
mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::timeout;

use config::Config;
use store::Registry;

const REAP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = Config::load();
    let registry = Arc::new(Registry::new(
        Duration::from_secs(cfg.ttl_sec),
        cfg.topology_url.clone(),
    ));

    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REAP_INTERVAL);
            loop {
                ticker.tick().await;
                registry.reap().await;
            }
        });
    }

    let router = api::routes(registry.clone());
    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    log::info!("registry listening on {} (ttl={}s)", cfg.bind_addr, cfg.ttl_sec);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            log::error!("registry server error: {e}");
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
        log::warn!("registry server did not stop within the grace window");
    }

    Ok(())
}
