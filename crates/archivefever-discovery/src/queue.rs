//! Delayed passage readings.
//!
//! Readings are enqueued with a delay and handed to a single `ReadingWorker`,
//! which keeps them ordered by due time and dispatches each one to the
//! `PassageReader` once it falls due. Dispatch is fire-and-forget: a slow or
//! failing reading never holds up the ones behind it.

use async_trait::async_trait;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One passage of a discovered text, waiting to be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassageReading {
    pub text_id: String,
    pub title: String,
    pub author: String,
    pub passage: String,
    pub index: usize,
}

/// Turns a passage into a thought. Implemented by the thought engine.
#[async_trait]
pub trait PassageReader: Send + Sync {
    async fn read_passage(&self, reading: PassageReading);
}

struct Scheduled {
    due: Instant,
    seq: u64,
    reading: PassageReading,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Sending half: cheap to clone, shared by everything that schedules readings.
#[derive(Clone)]
pub struct ReadingQueue {
    tx: mpsc::UnboundedSender<(Instant, PassageReading)>,
}

impl ReadingQueue {
    /// Create a queue and the worker that drains it.
    pub fn channel() -> (ReadingQueue, ReadingWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReadingQueue { tx }, ReadingWorker { rx })
    }

    /// Schedule `reading` to be dispatched after `delay`. Returns false if the
    /// worker has already stopped.
    pub fn enqueue_after(&self, delay: Duration, reading: PassageReading) -> bool {
        let due = Instant::now() + delay;
        debug!(
            "Scheduling passage {} of {:?} in {:?}",
            reading.index, reading.title, delay
        );
        if self.tx.send((due, reading)).is_err() {
            warn!("Reading worker has stopped; passage dropped");
            return false;
        }
        true
    }
}

/// Receiving half: owns the due-time ordering and dispatches readings.
pub struct ReadingWorker {
    rx: mpsc::UnboundedReceiver<(Instant, PassageReading)>,
}

impl ReadingWorker {
    /// Run until cancelled, or until every queue handle is dropped and
    /// nothing is left waiting.
    pub async fn run(mut self, reader: Arc<dyn PassageReader>, cancel: CancellationToken) {
        let mut heap: BinaryHeap<Reverse<Scheduled>> = BinaryHeap::new();
        let mut seq: u64 = 0;
        let mut closed = false;

        info!("Reading worker started");
        loop {
            if closed && heap.is_empty() {
                break;
            }
            let next_due = heap.peek().map(|Reverse(s)| s.due);

            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = self.rx.recv(), if !closed => match msg {
                    Some((due, reading)) => {
                        heap.push(Reverse(Scheduled { due, seq, reading }));
                        seq += 1;
                    }
                    None => closed = true,
                },
                _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                    let now = Instant::now();
                    while heap.peek().is_some_and(|Reverse(s)| s.due <= now) {
                        if let Some(Reverse(scheduled)) = heap.pop() {
                            let reader = reader.clone();
                            tokio::spawn(async move {
                                reader.read_passage(scheduled.reading).await;
                            });
                        }
                    }
                }
            }
        }
        info!("Reading worker stopped ({} readings abandoned)", heap.len());
    }
}
