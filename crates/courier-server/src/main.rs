use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_server::{serve, AppState, ServerConfig};
use courier_store::Mem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_server=debug")),
        )
        .init();

    info!("starting courier exchange server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(addr = %config.http_addr, base_url = %config.base_url, "loaded configuration");

    let store = Arc::new(Mem::new());
    let state = AppState::new(store, config.base_url.clone(), config.internal_auth.clone());

    // Nonce cache cleanup every minute; entries expire after 2x max skew.
    let nonces = state.nonces.clone();
    let purge_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            nonces.purge_expired(purge_state.now()).await;
        }
    });

    tokio::select! {
        result = serve(state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
