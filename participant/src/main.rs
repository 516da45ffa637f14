mod api;
mod config;
mod heartbeat;
mod pipeline;
mod probe;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::timeout;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = Config::load();
    let (kick_tx, kick_rx) = mpsc::channel(1);
    let state = Arc::new(AppState::new(&cfg, kick_tx));

    {
        let state = Arc::clone(&state);
        let interval = cfg.heartbeat_interval_sec;
        tokio::spawn(async move { heartbeat::run(state, interval, kick_rx).await });
    }
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move { probe::run(state).await });
    }

    let router = api::routes(state.clone());
    let bind_addr = cfg.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("participant {} listening on {bind_addr}", cfg.name);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            log::error!("participant server error: {e}");
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
        log::warn!("participant server did not stop within the grace window");
    }

    Ok(())
}
