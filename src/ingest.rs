//! Ingestion orchestration: parse, dedup-check, enqueue.
//!
//! The watcher re-reads the whole monitored file on every detected change,
//! so the handler sees already-processed lines again and again. The
//! pre-enqueue existence check keeps those re-reads cheap; the store's
//! unique constraint is what actually prevents double persistence.

use crate::parser::EntryParser;
use crate::store::ShotStore;
use crate::watcher::ChangeHandler;
use crate::worker::WorkItem;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Turns raw file content into queued work items
pub struct IngestionHandler {
    parser: EntryParser,
    store: Arc<dyn ShotStore>,
    tx: mpsc::Sender<WorkItem>,
}

impl IngestionHandler {
    pub fn new(parser: EntryParser, store: Arc<dyn ShotStore>, tx: mpsc::Sender<WorkItem>) -> Self {
        Self { parser, store, tx }
    }

    /// Process every line of one full file read, in order.
    ///
    /// A malformed line is logged and skipped; it never aborts the batch.
    pub async fn process_content(&self, content: &str) {
        for line in content.lines() {
            self.process_line(line).await;
        }
    }

    async fn process_line(&self, line: &str) {
        let record = match self.parser.parse_line(line) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, line = %line, "Failed to parse log entry");
                metrics::counter!("swinglog.lines.malformed").increment(1);
                return;
            }
        };

        match self.store.exists(&record.identity_key).await {
            Ok(true) => {
                debug!(identity_key = %record.identity_key, "Duplicate entry, skipping");
                metrics::counter!("swinglog.records.deduplicated").increment(1);
                return;
            }
            Ok(false) => {}
            Err(e) => {
                // Enqueue anyway; the insert path handles the conflict.
                warn!(
                    error = %e,
                    identity_key = %record.identity_key,
                    "Existence check failed, enqueuing regardless"
                );
            }
        }

        let identity_key = record.identity_key.clone();
        if self.tx.send(WorkItem::Shot(record)).await.is_err() {
            warn!(identity_key = %identity_key, "Persistence queue closed, dropping record");
            return;
        }

        debug!(identity_key = %identity_key, "Queued swing record");
        metrics::counter!("swinglog.records.queued").increment(1);
    }
}

#[async_trait]
impl ChangeHandler for IngestionHandler {
    async fn on_modified(&self, content: &str) {
        self.process_content(content).await;
    }
}
