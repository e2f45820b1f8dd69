//! Durable shot storage behind the [`ShotStore`] seam.
//!
//! Both backends persist the same static `shots` schema with a unique
//! constraint on the identity key; that constraint, not the pre-insert
//! existence check, is what makes ingestion idempotent.

use crate::config::{StorageBackend, StorageConfig};
use crate::schema::SwingRecord;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors surfaced by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of an insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Record persisted
    Inserted,
    /// A record with this identity key already exists; benign no-op
    Duplicate,
}

/// Narrow storage interface consumed by the pipeline and the query API
#[async_trait]
pub trait ShotStore: Send + Sync {
    /// Whether a record with this identity key has already been persisted
    async fn exists(&self, identity_key: &str) -> Result<bool, StoreError>;

    /// Insert a record; a unique-key conflict reports `Duplicate`
    async fn insert(&self, record: &SwingRecord) -> Result<InsertOutcome, StoreError>;

    /// Most recently inserted record, if any
    async fn latest(&self) -> Result<Option<SwingRecord>, StoreError>;

    /// All records for a club label, in insertion order
    async fn by_club(&self, club: &str) -> Result<Vec<SwingRecord>, StoreError>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Connect the configured backend and bootstrap its schema
pub async fn connect(config: &StorageConfig) -> anyhow::Result<Arc<dyn ShotStore>> {
    match config.backend {
        StorageBackend::Sqlite => {
            let store = SqliteStore::connect(&config.sqlite_path, config.max_connections)
                .await
                .context("Failed to open SQLite database")?;
            Ok(Arc::new(store))
        }
        StorageBackend::Mysql => {
            let url = config
                .mysql_url
                .as_deref()
                .context("storage.mysql_url is required for the mysql backend")?;
            let store = MySqlStore::connect(url, config)
                .await
                .context("Failed to connect to MySQL")?;
            Ok(Arc::new(store))
        }
    }
}

const COLUMNS: &str = "identity_key, club, club_index, speed, spin_axis, total_spin, \
     back_spin, side_spin, hla, vla, club_speed, path, face_to_target, \
     angle_of_attack, speed_at_impact, carry_distance, total_distance, offline, \
     descent_angle, peak_height, start_x, start_y, start_z, end_x, end_y, end_z, \
     round_key, player_name, shot_number";

const INSERT_SQL: &str = "INSERT INTO shots (identity_key, club, club_index, speed, spin_axis, \
     total_spin, back_spin, side_spin, hla, vla, club_speed, path, face_to_target, \
     angle_of_attack, speed_at_impact, carry_distance, total_distance, offline, \
     descent_angle, peak_height, start_x, start_y, start_z, end_x, end_y, end_z, \
     round_key, player_name, shot_number) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SQLITE_DDL: &str = "CREATE TABLE IF NOT EXISTS shots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_key TEXT NOT NULL UNIQUE,
        club TEXT,
        club_index INTEGER,
        speed REAL,
        spin_axis REAL,
        total_spin REAL,
        back_spin REAL,
        side_spin REAL,
        hla REAL,
        vla REAL,
        club_speed REAL,
        path REAL,
        face_to_target REAL,
        angle_of_attack REAL,
        speed_at_impact REAL,
        carry_distance REAL,
        total_distance REAL,
        offline REAL,
        descent_angle REAL,
        peak_height REAL,
        start_x REAL,
        start_y REAL,
        start_z REAL,
        end_x REAL,
        end_y REAL,
        end_z REAL,
        round_key TEXT,
        player_name TEXT,
        shot_number INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )";

const MYSQL_DDL: &str = "CREATE TABLE IF NOT EXISTS shots (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        identity_key VARCHAR(128) NOT NULL UNIQUE,
        club VARCHAR(64),
        club_index BIGINT,
        speed DOUBLE,
        spin_axis DOUBLE,
        total_spin DOUBLE,
        back_spin DOUBLE,
        side_spin DOUBLE,
        hla DOUBLE,
        vla DOUBLE,
        club_speed DOUBLE,
        path DOUBLE,
        face_to_target DOUBLE,
        angle_of_attack DOUBLE,
        speed_at_impact DOUBLE,
        carry_distance DOUBLE,
        total_distance DOUBLE,
        offline DOUBLE,
        descent_angle DOUBLE,
        peak_height DOUBLE,
        start_x DOUBLE,
        start_y DOUBLE,
        start_z DOUBLE,
        end_x DOUBLE,
        end_y DOUBLE,
        end_z DOUBLE,
        round_key VARCHAR(128),
        player_name VARCHAR(128),
        shot_number BIGINT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )";

fn classify_insert_error(error: sqlx::Error) -> Result<InsertOutcome, StoreError> {
    if let sqlx::Error::Database(ref db) = error {
        if db.is_unique_violation() {
            return Ok(InsertOutcome::Duplicate);
        }
    }
    Err(StoreError::Database(error))
}

/// SQLite-backed shot store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) a SQLite database file and bootstrap the schema
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!(path = %path, "Opened SQLite shot database");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory database; used by tests and dry runs
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A second connection would see a different empty database, so the
        // pool is pinned to one connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SQLITE_DDL).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ShotStore for SqliteStore {
    async fn exists(&self, identity_key: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM shots WHERE identity_key = ? LIMIT 1")
            .bind(identity_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &SwingRecord) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(INSERT_SQL)
            .bind(&record.identity_key)
            .bind(&record.club)
            .bind(record.club_index)
            .bind(record.speed)
            .bind(record.spin_axis)
            .bind(record.total_spin)
            .bind(record.back_spin)
            .bind(record.side_spin)
            .bind(record.hla)
            .bind(record.vla)
            .bind(record.club_speed)
            .bind(record.path)
            .bind(record.face_to_target)
            .bind(record.angle_of_attack)
            .bind(record.speed_at_impact)
            .bind(record.carry_distance)
            .bind(record.total_distance)
            .bind(record.offline)
            .bind(record.descent_angle)
            .bind(record.peak_height)
            .bind(record.start_x)
            .bind(record.start_y)
            .bind(record.start_z)
            .bind(record.end_x)
            .bind(record.end_y)
            .bind(record.end_z)
            .bind(&record.round_key)
            .bind(&record.player_name)
            .bind(record.shot_number)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) => classify_insert_error(e),
        }
    }

    async fn latest(&self) -> Result<Option<SwingRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM shots ORDER BY id DESC LIMIT 1");
        let record = sqlx::query_as::<_, SwingRecord>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn by_club(&self, club: &str) -> Result<Vec<SwingRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM shots WHERE club = ? ORDER BY id ASC");
        let records = sqlx::query_as::<_, SwingRecord>(&sql)
            .bind(club)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// MySQL-backed shot store
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect to MySQL with pool limits from config and bootstrap the schema
    pub async fn connect(url: &str, config: &StorageConfig) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await?;

        info!("Connected to MySQL shot database");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(MYSQL_DDL).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ShotStore for MySqlStore {
    async fn exists(&self, identity_key: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM shots WHERE identity_key = ? LIMIT 1")
            .bind(identity_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &SwingRecord) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(INSERT_SQL)
            .bind(&record.identity_key)
            .bind(&record.club)
            .bind(record.club_index)
            .bind(record.speed)
            .bind(record.spin_axis)
            .bind(record.total_spin)
            .bind(record.back_spin)
            .bind(record.side_spin)
            .bind(record.hla)
            .bind(record.vla)
            .bind(record.club_speed)
            .bind(record.path)
            .bind(record.face_to_target)
            .bind(record.angle_of_attack)
            .bind(record.speed_at_impact)
            .bind(record.carry_distance)
            .bind(record.total_distance)
            .bind(record.offline)
            .bind(record.descent_angle)
            .bind(record.peak_height)
            .bind(record.start_x)
            .bind(record.start_y)
            .bind(record.start_z)
            .bind(record.end_x)
            .bind(record.end_y)
            .bind(record.end_z)
            .bind(&record.round_key)
            .bind(&record.player_name)
            .bind(record.shot_number)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) => classify_insert_error(e),
        }
    }

    async fn latest(&self) -> Result<Option<SwingRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM shots ORDER BY id DESC LIMIT 1");
        let record = sqlx::query_as::<_, SwingRecord>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn by_club(&self, club: &str) -> Result<Vec<SwingRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM shots WHERE club = ? ORDER BY id ASC");
        let records = sqlx::query_as::<_, SwingRecord>(&sql)
            .bind(club)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, club: Option<&str>) -> SwingRecord {
        let mut r = SwingRecord::with_identity(key);
        r.club = club.map(String::from);
        r
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let store = SqliteStore::in_memory().await.unwrap();

        assert!(!store.exists("t1").await.unwrap());

        let outcome = store.insert(&record("t1", None)).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(store.exists("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_benign() {
        let store = SqliteStore::in_memory().await.unwrap();
        let shot = record("t1", Some("driver"));

        assert_eq!(store.insert(&shot).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&shot).await.unwrap(), InsertOutcome::Duplicate);

        // Still exactly one record
        let matches = store.by_club("driver").await.unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn test_latest_on_empty_store_is_none() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_follows_insertion_order() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.insert(&record("t1", None)).await.unwrap();
        store.insert(&record("t2", None)).await.unwrap();
        store.insert(&record("t3", None)).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.identity_key, "t3");
    }

    #[tokio::test]
    async fn test_by_club_filters_and_preserves_order() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.insert(&record("t1", Some("7_iron"))).await.unwrap();
        store.insert(&record("t2", Some("driver"))).await.unwrap();
        store.insert(&record("t3", Some("7_iron"))).await.unwrap();

        let irons = store.by_club("7_iron").await.unwrap();
        assert_eq!(irons.len(), 2);
        assert_eq!(irons[0].identity_key, "t1");
        assert_eq!(irons[1].identity_key, "t3");

        assert!(store.by_club("putter").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_null_fields_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();

        let mut shot = record("t1", Some("driver"));
        shot.speed = Some(150.0);
        store.insert(&shot).await.unwrap();

        let fetched = store.latest().await.unwrap().unwrap();
        assert_eq!(fetched.speed, Some(150.0));
        assert_eq!(fetched.total_spin, None);
        assert_eq!(fetched.player_name, None);
    }
}
