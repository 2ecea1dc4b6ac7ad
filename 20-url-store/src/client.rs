//! Client side of the `Store` procedures, used by proxies to reach the master.
//!
//! A single connection task owns the socket and runs every round-trip to
//! completion. Callers hand it a request plus a oneshot for the reply, so a
//! caller that gives up mid-call only drops its reply; the response still
//! gets read off the wire and the next call never sees it.

use async_trait::async_trait;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{mpsc, oneshot},
};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, StoreError},
    message::{Request, Response, read_message, write_message},
    store::Store,
};

/// Calls waiting for the connection task before callers block.
const CALL_QUEUE_LENGTH: usize = 64;

/// One persistent connection to a master.
///
/// Calls are synchronous from the caller's view and go over the connection
/// one at a time. There is no timeout: a master that never answers blocks
/// the caller.
pub struct RpcClient {
    addr: String,
    calls: mpsc::Sender<Command>,
}

enum Command {
    Call {
        request: Request,
        respond_to: oneshot::Sender<Result<Response>>,
    },
    Shutdown,
}

impl RpcClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| StoreError::Remote(format!("failed to connect to {addr}: {err}")))?;

        info!(addr, "connected to master");

        let (reader, writer) = stream.into_split();
        let (calls, rx) = mpsc::channel(CALL_QUEUE_LENGTH);
        tokio::spawn(run_connection(
            addr.to_string(),
            BufReader::new(reader),
            writer,
            rx,
        ));

        Ok(Self {
            addr: addr.to_string(),
            calls,
        })
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let (respond_to, response) = oneshot::channel();
        self.calls
            .send(Command::Call {
                request,
                respond_to,
            })
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())?
    }

    fn closed(&self) -> StoreError {
        StoreError::Remote(format!("connection to master {} is closed", self.addr))
    }

    /// Closes the write half so the master sees a clean disconnect.
    pub async fn shutdown(&self) {
        if self.calls.send(Command::Shutdown).await.is_err() {
            debug!(addr = %self.addr, "rpc connection already closed");
        }
    }
}

/// Owns the socket. A transport failure leaves the stream at an unknown
/// position, so every later call fails instead of reading a stray reply.
async fn run_connection(
    addr: String,
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    mut calls: mpsc::Receiver<Command>,
) {
    let mut broken: Option<String> = None;

    while let Some(command) = calls.recv().await {
        let (request, respond_to) = match command {
            Command::Call {
                request,
                respond_to,
            } => (request, respond_to),
            Command::Shutdown => break,
        };

        let result = match &broken {
            Some(reason) => Err(StoreError::Remote(reason.clone())),
            None => {
                let result = round_trip(&addr, &mut reader, &mut writer, &request).await;
                if let Err(err) = &result {
                    broken = Some(err.to_string());
                }
                result
            }
        };

        if respond_to.send(result).is_err() {
            debug!(%addr, "caller went away before the reply arrived");
        }
    }

    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown rpc client writer cleanly");
    }
    debug!(%addr, "rpc connection closed");
}

async fn round_trip(
    addr: &str,
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    request: &Request,
) -> Result<Response> {
    let transport_error =
        |err: std::io::Error| StoreError::Remote(format!("call to master {addr} failed: {err}"));

    write_message(writer, request).await.map_err(transport_error)?;
    match read_message::<_, Response>(reader).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(StoreError::Remote(format!(
            "master {addr} closed the connection"
        ))),
        Err(err) => Err(transport_error(err)),
    }
}

#[async_trait]
impl Store for RpcClient {
    async fn get(&self, key: &str) -> Result<String> {
        let request = Request::Get {
            key: key.to_string(),
        };
        self.call(request).await?.into_result(key)
    }

    async fn put(&self, value: String) -> Result<String> {
        let request = Request::Put {
            value: value.clone(),
        };
        self.call(request).await?.into_result(&value)
    }
}
