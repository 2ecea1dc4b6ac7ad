//! Serves the `Store` procedures to remote proxies.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, info, warn};

use crate::{
    message::{Request, Response, read_message, write_message},
    store::Store,
};

pub struct RpcServer {
    listener: TcpListener,
    store: Arc<dyn Store>,
}

impl RpcServer {
    pub fn new(listener: TcpListener, store: Arc<dyn Store>) -> Self {
        Self { listener, store }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let RpcServer { listener, store } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("rpc server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &store);
                }
            }
        }

        Ok(())
    }
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>, store: &Arc<dyn Store>) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, store),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, store: &Arc<dyn Store>) {
    let store = Arc::clone(store);
    tokio::spawn(async move {
        debug!(%peer, "proxy connected");
        match handle_connection(stream, store).await {
            Ok(()) => debug!(%peer, "proxy disconnected"),
            Err(err) => warn!(%peer, error = ?err, "rpc connection closed with error"),
        }
    });
}

/// Answers requests on one connection in the order they arrive.
async fn handle_connection(stream: TcpStream, store: Arc<dyn Store>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(request) = read_message::<_, Request>(&mut reader).await? {
        let response = dispatch(store.as_ref(), request).await;
        write_message(&mut writer, &response).await?;
    }

    Ok(())
}

async fn dispatch(store: &dyn Store, request: Request) -> Response {
    let result = match request {
        Request::Get { key } => store.get(&key).await,
        Request::Put { value } => store.put(value).await,
    };
    Response::from_result(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{message::ErrorKind, store::KeyValueStore};

    #[tokio::test]
    async fn dispatch_routes_each_procedure() {
        let store = KeyValueStore::in_memory();

        let put = dispatch(&store, Request::Put { value: "http://a".into() }).await;
        assert_eq!(put, Response::Ok { result: "0".into() });

        let get = dispatch(&store, Request::Get { key: "0".into() }).await;
        assert_eq!(get, Response::Ok { result: "http://a".into() });

        let missing = dispatch(&store, Request::Get { key: "zz".into() }).await;
        assert!(matches!(
            missing,
            Response::Error { kind: ErrorKind::NotFound, .. }
        ));
    }
}
