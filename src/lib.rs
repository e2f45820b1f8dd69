//! Swinglog - launch-monitor swing telemetry ingestion and query service
//!
//! This library tails an externally-written, append-only log file for
//! swing/shot telemetry, deduplicates and normalizes entries into a fixed
//! schema, and persists them through a single-writer worker while a small
//! HTTP API serves read-only queries over the same store. It handles:
//!
//! - Launch-monitor connector logs (timestamped marker lines with a JSON
//!   payload)
//! - GSPro-style structured shot streams (one JSON document per line)
//!
//! # Example
//!
//! ```rust,no_run
//! use swinglog::{Config, EntryParser, IngestionHandler};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = swinglog::store::connect(&config.storage).await?;
//!
//!     let (tx, _rx) = mpsc::channel(config.queue.capacity);
//!     let parser = EntryParser::from_config(&config.source);
//!     let _handler = Arc::new(IngestionHandler::new(parser, store, tx));
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod ingest;
pub mod parser;
pub mod schema;
pub mod store;
pub mod watcher;
pub mod worker;

// Re-export main types
pub use config::{ApiConfig, Config, SourceConfig, SourceMode, StorageBackend, StorageConfig};
pub use ingest::IngestionHandler;
pub use parser::{EntryParser, ParseError};
pub use schema::SwingRecord;
pub use store::{InsertOutcome, MySqlStore, ShotStore, SqliteStore, StoreError};
pub use watcher::{ChangeHandler, FileWatcher};
pub use worker::{PersistenceWorker, WorkItem};
