//! Adapter from asynchronous record handlers to ordinary sinks

use crate::core::{Disposal, LogRecord, LoggerError, Result, Sink};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::watch;

/// A record handler that completes asynchronously.
///
/// # Example
///
/// ```no_run
/// use logtape::sinks::{from_async_sink, AsyncSink};
/// use logtape::{LogRecord, Result};
/// use async_trait::async_trait;
///
/// struct Uploader;
///
/// #[async_trait]
/// impl AsyncSink for Uploader {
///     async fn emit(&self, record: LogRecord) -> Result<()> {
///         // send the record somewhere
///         Ok(())
///     }
/// }
///
/// let sink = from_async_sink(Uploader).unwrap();
/// ```
#[async_trait]
pub trait AsyncSink: Send + Sync {
    async fn emit(&self, record: LogRecord) -> Result<()>;

    fn name(&self) -> &str {
        "async"
    }
}

/// Sink that hands records to an [`AsyncSink`] one at a time, in arrival
/// order, on a dedicated worker thread.
///
/// Handler errors and panics are swallowed so one bad record never stops
/// the ones after it. Disposal waits for every queued record and may be
/// called any number of times.
pub struct AsyncSinkAdapter {
    name: String,
    sender: Mutex<Option<Sender<LogRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    drained: watch::Receiver<bool>,
}

/// Wrap `sink` into a synchronous [`Sink`].
pub fn from_async_sink<S: AsyncSink + 'static>(sink: S) -> Result<AsyncSinkAdapter> {
    let name = sink.name().to_string();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (sender, receiver) = unbounded::<LogRecord>();
    let (drained_tx, drained_rx) = watch::channel(false);
    let sink = Arc::new(sink);

    let worker = thread::Builder::new()
        .name(format!("logtape-{}", name))
        .spawn(move || {
            for record in receiver.iter() {
                let sink = Arc::clone(&sink);
                // A panicking handler only fails its own task.
                let task = runtime.spawn(async move { sink.emit(record).await });
                let _ = runtime.block_on(task);
            }
            let _ = drained_tx.send(true);
        })?;

    Ok(AsyncSinkAdapter {
        name,
        sender: Mutex::new(Some(sender)),
        worker: Mutex::new(Some(worker)),
        drained: drained_rx,
    })
}

impl AsyncSinkAdapter {
    fn close(&self) {
        self.sender.lock().take();
    }

    fn join_worker(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        match worker {
            Some(handle) => handle
                .join()
                .map_err(|_| LoggerError::disposal(&self.name, "worker thread panicked")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Sink for AsyncSinkAdapter {
    fn emit(&self, record: &LogRecord) -> Result<()> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(record.clone())
                .map_err(|_| LoggerError::sink(&self.name, "worker stopped")),
            None => Err(LoggerError::sink(&self.name, "sink already disposed")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn disposal(&self) -> Disposal {
        Disposal::Sync
    }

    fn dispose(&self) -> Result<()> {
        self.close();
        self.join_worker()
    }

    async fn dispose_async(&self) -> Result<()> {
        self.close();
        let mut drained = self.drained.clone();
        // The worker signals before exiting; a closed channel means it is gone too.
        let _ = drained.wait_for(|done| *done).await;
        self.join_worker()
    }
}

impl Drop for AsyncSinkAdapter {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            eprintln!("[LOGGER ERROR] {}", e);
        }
    }
}
