//! Single-writer persistence worker fed by the ingestion queue.
//!
//! Exactly one worker task drains the channel and serializes all store
//! writes behind an exclusive lock, so the query surface can share the
//! store without interleaving with half-finished inserts.

use crate::schema::SwingRecord;
use crate::store::{InsertOutcome, ShotStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Message carried on the ingestion queue
#[derive(Debug)]
pub enum WorkItem {
    /// A normalized record awaiting persistence
    Shot(SwingRecord),
    /// Sentinel: no more work, terminate the consumer loop
    Shutdown,
}

/// Consumer side of the ingestion queue
pub struct PersistenceWorker {
    rx: mpsc::Receiver<WorkItem>,
    store: Arc<dyn ShotStore>,
    write_lock: Arc<Mutex<()>>,
}

impl PersistenceWorker {
    pub fn new(
        rx: mpsc::Receiver<WorkItem>,
        store: Arc<dyn ShotStore>,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            rx,
            store,
            write_lock,
        }
    }

    /// Drain the queue until the shutdown sentinel arrives.
    ///
    /// A failed insert never terminates the loop; the record is logged and
    /// lost for this attempt. Commit order matches dequeue (FIFO) order.
    pub async fn run(mut self) {
        info!("Persistence worker started");

        while let Some(item) = self.rx.recv().await {
            let record = match item {
                WorkItem::Shot(record) => record,
                WorkItem::Shutdown => {
                    info!("Persistence worker received shutdown sentinel");
                    break;
                }
            };

            let _guard = self.write_lock.lock().await;

            match self.store.insert(&record).await {
                Ok(InsertOutcome::Inserted) => {
                    debug!(identity_key = %record.identity_key, "Persisted swing record");
                    metrics::counter!("swinglog.records.persisted").increment(1);
                }
                Ok(InsertOutcome::Duplicate) => {
                    // Lost the race against an earlier re-read; store-level
                    // uniqueness already holds, nothing to do.
                    debug!(identity_key = %record.identity_key, "Duplicate identity key at insert");
                    metrics::counter!("swinglog.records.duplicate_at_insert").increment(1);
                }
                Err(e) => {
                    error!(
                        error = %e,
                        identity_key = %record.identity_key,
                        "Failed to persist swing record"
                    );
                    metrics::counter!("swinglog.records.insert_failed").increment(1);
                }
            }
        }

        info!("Persistence worker stopped");
    }
}
