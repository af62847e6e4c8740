//! Demand-driven record stream.
//!
//! The producer task opens the native cursor only after the first request and
//! pulls exactly one document per request, so at most one record is ever
//! buffered. A stream ends with exactly one terminal event, `End` or `Error`.
//! Dropping or cancelling the consumer stops the producer at its next step.

use bson::Document as BsonDocument;
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::errors::AdapterError;
use crate::store::{DocumentStream, StoreError};
use crate::types::Record;

#[derive(Debug)]
pub enum StreamEvent {
    Record(Record),
    End,
    Error(AdapterError),
}

impl StreamEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Record(_))
    }
}

/// Opens the native cursor once demand arrives.
pub(crate) type CursorOpener = BoxFuture<'static, Result<DocumentStream, StoreError>>;

pub struct RecordStream {
    demand: Option<mpsc::Sender<()>>,
    events: mpsc::Receiver<StreamEvent>,
    finished: bool,
}

impl RecordStream {
    /// Spawns the producer on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub(crate) fn spawn<F>(open: CursorOpener, mut normalize: F) -> Self
    where
        F: FnMut(BsonDocument) -> Record + Send + 'static,
    {
        let (demand_tx, mut demand_rx) = mpsc::channel::<()>(1);
        let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(1);
        tokio::spawn(async move {
            // paused until the first request
            if demand_rx.recv().await.is_none() {
                return;
            }
            let mut source = match open.await {
                Ok(s) => s,
                Err(e) => {
                    let _ = event_tx.send(StreamEvent::Error(AdapterError::store("cursor")(e))).await;
                    return;
                }
            };
            loop {
                let event = match source.next().await {
                    Some(Ok(doc)) => StreamEvent::Record(normalize(doc)),
                    Some(Err(e)) => StreamEvent::Error(AdapterError::store("cursor")(e)),
                    None => StreamEvent::End,
                };
                let terminal = event.is_terminal();
                if event_tx.send(event).await.is_err() || terminal {
                    return;
                }
                if demand_rx.recv().await.is_none() {
                    log::debug!("record stream cancelled by consumer");
                    return;
                }
            }
        });
        Self { demand: Some(demand_tx), events: event_rx, finished: false }
    }

    /// Requests one more event. Returns `None` once a terminal event was
    /// delivered or the stream was cancelled.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        let demand = self.demand.as_ref()?;
        if demand.send(()).await.is_err() {
            self.finished = true;
            return None;
        }
        let event = self.events.recv().await;
        if event.as_ref().is_none_or(StreamEvent::is_terminal) {
            self.finished = true;
        }
        event
    }

    /// Stops the producer; later calls to [`next`](Self::next) return `None`.
    pub fn cancel(&mut self) {
        self.demand = None;
        self.events.close();
        self.finished = true;
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drains the stream into memory.
    ///
    /// # Errors
    /// Returns the stream's terminal error, if any.
    pub async fn try_collect(mut self) -> Result<Vec<Record>, AdapterError> {
        let mut out = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Record(r) => out.push(r),
                StreamEvent::End => break,
                StreamEvent::Error(e) => return Err(e),
            }
        }
        Ok(out)
    }
}
