//! Wire format for the `Store` procedures.
//!
//! Requests and responses are JSON objects, one per line, so a master can be
//! poked with netcat-style tools. Errors carry a kind so the caller can tell
//! a missing key from a failure at the master.

use std::io;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::StoreError;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Procedures a master exposes under the `Store` service name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    #[serde(rename = "Store.Get")]
    Get { key: String },
    #[serde(rename = "Store.Put")]
    Put { value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { result: String },
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Internal,
}

impl Response {
    pub fn from_result(result: Result<String, StoreError>) -> Self {
        match result {
            Ok(result) => Response::Ok { result },
            Err(err) => {
                let kind = match &err {
                    StoreError::NotFound(_) => ErrorKind::NotFound,
                    StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
                    _ => ErrorKind::Internal,
                };
                Response::Error {
                    kind,
                    message: err.to_string(),
                }
            }
        }
    }

    /// Turns a response back into the error the master produced.
    ///
    /// `subject` is the key or value the request carried, so a remote
    /// `NotFound` reads the same as a local one.
    pub fn into_result(self, subject: &str) -> Result<String, StoreError> {
        match self {
            Response::Ok { result } => Ok(result),
            Response::Error {
                kind: ErrorKind::NotFound,
                ..
            } => Err(StoreError::NotFound(subject.to_string())),
            Response::Error {
                kind: ErrorKind::AlreadyExists,
                ..
            } => Err(StoreError::AlreadyExists(subject.to_string())),
            Response::Error {
                kind: ErrorKind::Internal,
                message,
            } => Err(StoreError::Remote(message)),
        }
    }
}

/// Reads the next message, skipping blank lines. `Ok(None)` means the peer closed.
pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    // Simple line-oriented framing keeps interoperability with netcat-style tools.
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if trimmed.is_empty() {
            continue;
        }

        let parsed = serde_json::from_str(trimmed).map_err(to_io_error)?;
        return Ok(Some(parsed));
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    // Encode to JSON once, append a newline delimiter, and flush so the peer sees it promptly.
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
