use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{info, warn};

use url_store::{
    KeyValueStore, ProxyStore, Store,
    cli::Cli,
    http::{self, AppState},
    server::RpcServer,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// The store selected at startup, kept concrete so it can be shut down.
enum Backend {
    Standalone(Arc<KeyValueStore>),
    Proxy(Arc<ProxyStore>),
}

impl Backend {
    async fn open(cli: &Cli) -> Result<Self> {
        match &cli.master {
            Some(master) => {
                let proxy = ProxyStore::connect(master)
                    .await
                    .with_context(|| format!("failed to construct proxy of {master}"))?;
                Ok(Backend::Proxy(Arc::new(proxy)))
            }
            None => {
                let store = KeyValueStore::open(&cli.file)
                    .await
                    .with_context(|| format!("failed to load store from '{}'", cli.file))?;
                Ok(Backend::Standalone(Arc::new(store)))
            }
        }
    }

    fn store(&self) -> Arc<dyn Store> {
        match self {
            Backend::Standalone(store) => store.clone(),
            Backend::Proxy(proxy) => proxy.clone(),
        }
    }

    async fn shutdown(&self) {
        match self {
            Backend::Standalone(store) => store.shutdown().await,
            Backend::Proxy(proxy) => proxy.shutdown().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let backend = Backend::open(&cli).await?;
    let store = backend.store();

    let rpc = if cli.rpc {
        let listener = TcpListener::bind(cli.rpc_listen)
            .await
            .with_context(|| format!("failed to bind rpc listener on {}", cli.rpc_listen))?;
        let server = RpcServer::new(listener, Arc::clone(&store));
        info!("rpc listening on {}", server.local_addr()?);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stop_rx.await;
        }));
        Some((stop_tx, task))
    } else {
        None
    };

    let listener = TcpListener::bind(cli.http_listen)
        .await
        .with_context(|| format!("failed to bind http listener on {}", cli.http_listen))?;
    info!("http listening on {}", listener.local_addr()?);

    let app = http::router(AppState {
        store,
        hostname: cli.host.clone(),
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    if let Some((stop_tx, task)) = rpc {
        let _ = stop_tx.send(());
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("rpc server exited with error: {err:?}"),
            Err(err) => warn!("rpc server task failed: {err:?}"),
        }
    }

    backend.shutdown().await;
    info!("store shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }
}
