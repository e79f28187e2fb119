//! `repairs serve`: run the HTTP API until Ctrl-C.

use anyhow::Context;
use clap::Args;
use repairs_core::config::ServiceConfig;
use repairs_core::store::open_store;
use repairs_server::http;
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on; overrides config and environment.
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

pub fn run_serve(args: &ServeArgs, config: &ServiceConfig) -> anyhow::Result<()> {
    let bind = args.bind.unwrap_or(config.server.bind);
    let store = open_store(&config.storage).context("open repair store")?;
    let app = http::router(config, store.clone())?;

    let runtime = tokio::runtime::Runtime::new().context("start tokio runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("bind {bind}"))?;
        info!(
            bind_addr = %listener.local_addr().unwrap_or(bind),
            backend = store.backend(),
            relay = config.relay.endpoint.is_some(),
            "repairs listening"
        );

        http::serve(listener, app, shutdown_signal())
            .await
            .context("serve http")
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
