//! Durable append-only persistence for [`KeyValueStore`].
//!
//! A persisted store replays its data file once at construction, then hands
//! every new record to a single background writer through a bounded queue.
//! File I/O never happens while the map lock is held; producers only block
//! when the queue is full.

use std::{
    io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, StoreError},
    record::{Record, RecordReader},
    store::KeyValueStore,
};

/// Capacity of the queue between `put` and the background writer.
pub const SAVE_QUEUE_LENGTH: usize = 1024;

/// Replays `path` into `store`, returning how many records were applied.
///
/// A missing file is an empty store. A record whose key is already present
/// is discarded with a warning and the first value wins.
pub(crate) async fn load(path: &Path, store: &KeyValueStore) -> Result<usize> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no data file yet, starting empty");
            return Ok(0);
        }
        Err(source) => {
            return Err(StoreError::FileOpen {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut reader = RecordReader::new(BufReader::new(file));
    let mut loaded = 0;
    while let Some(Record { key, value }) = reader.next_record().await? {
        match store.set(key, value) {
            Ok(()) => loaded += 1,
            Err(err) => warn!(path = %path.display(), error = %err, "discarding duplicate record"),
        }
    }

    info!(path = %path.display(), records = loaded, "replayed data file");
    Ok(loaded)
}

/// Producer side of the persistence pipeline, owned by the store.
pub(crate) struct SaveQueue {
    path: PathBuf,
    inner: Mutex<Option<(mpsc::Sender<Record>, JoinHandle<()>)>>,
}

impl SaveQueue {
    /// Opens `path` for appending and starts the writer task.
    ///
    /// Failing to open the file is fatal to the store: a store configured
    /// for persistence must not run without it.
    pub(crate) async fn start(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| StoreError::FileOpen {
                path: path.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(SAVE_QUEUE_LENGTH);
        let writer = tokio::spawn(write_file(path.clone(), file, rx));

        Ok(Self {
            path,
            inner: Mutex::new(Some((tx, writer))),
        })
    }

    /// Queues a record for the writer, waiting while the queue is full.
    pub(crate) async fn enqueue(&self, record: Record) {
        let tx = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(tx, _)| tx.clone());

        let Some(tx) = tx else {
            warn!(path = %self.path.display(), key = %record.key, "save queue closed, record not persisted");
            return;
        };

        if let Err(mpsc::error::SendError(record)) = tx.send(record).await {
            warn!(path = %self.path.display(), key = %record.key, "writer gone, record not persisted");
        }
    }

    /// Closes the queue and waits until the writer has drained it.
    pub(crate) async fn close(&self) {
        let taken = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some((tx, writer)) = taken {
            drop(tx);
            if let Err(err) = writer.await {
                error!(path = %self.path.display(), error = ?err, "writer task failed");
            }
        }
    }
}

async fn write_file(path: PathBuf, mut file: File, rx: mpsc::Receiver<Record>) {
    save_loop(&path, &mut file, rx).await;

    if let Err(err) = file.sync_all().await {
        warn!(path = %path.display(), error = %err, "failed to sync data file");
    }
    debug!(path = %path.display(), "writer stopped");
}

/// Appends queued records in order until the queue closes.
async fn save_loop<W>(path: &Path, writer: &mut W, mut rx: mpsc::Receiver<Record>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(record) = rx.recv().await {
        // A failed append loses this record only; the writer keeps going.
        if let Err(err) = append(writer, &record).await {
            error!(path = %path.display(), key = %record.key, error = %err, "failed to save record");
        }
    }
}

async fn append<W>(writer: &mut W, record: &Record) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let encoded = record.encode()?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
