//! Schedule store implementations
//!
//! Both an in-memory and a persistent (RocksDB) implementation of the
//! [`ScheduleStore`] port. Records are keyed `schedule:{worker}:{key}` and
//! stored as JSON.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use async_trait::async_trait;
use rocksdb::{DB, Direction, IteratorMode, Options};
use tokio::sync::RwLock;
use tracing::{Level, event};

use crate::{
    domain::{constant::storage, error::WorkerError},
    port::schedule::{ScheduleRecord, ScheduleStore}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum ScheduleStoreType {
    #[serde(rename = "inmemory")]
    #[value(name = "inmemory")]
    InMemory,
    #[serde(rename = "rocksdb")]
    #[value(name = "rocksdb")]
    RocksDb
}

impl ScheduleStoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStoreType::InMemory => "inmemory",
            ScheduleStoreType::RocksDb => "rocksdb"
        }
    }
}

fn record_key(worker: &str, key: &str) -> String {
    format!("schedule:{}:{}", worker, key)
}

fn worker_prefix(worker: &str) -> String {
    format!("schedule:{}:", worker)
}

/// In-memory schedule store
///
/// Suitable for tests and single-run tools; schedules are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    records: Arc<RwLock<BTreeMap<String, ScheduleRecord>>>
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn save(&self, record: ScheduleRecord) -> Result<(), WorkerError> {
        let mut records = self.records.write().await;
        records.insert(record_key(&record.worker, &record.key), record);
        Ok(())
    }

    async fn load_all(&self, worker: &str) -> Result<Vec<ScheduleRecord>, WorkerError> {
        let prefix = worker_prefix(worker);
        let records = self.records.read().await;
        Ok(records
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn last_run(&self, worker: &str, key: &str) -> Result<Option<i64>, WorkerError> {
        let records = self.records.read().await;
        Ok(records.get(&record_key(worker, key)).and_then(|r| r.last_run))
    }

    async fn delete(&self, worker: &str, key: &str) -> Result<(), WorkerError> {
        let mut records = self.records.write().await;
        records.remove(&record_key(worker, key));
        Ok(())
    }
}

/// RocksDB-backed schedule store, survives process restarts
pub struct RocksDbScheduleStore {
    db: Arc<DB>
}

impl RocksDbScheduleStore {
    pub fn open(path: &Path) -> Result<Self, WorkerError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        let db = DB::open(&opts, path)
            .map_err(|e| WorkerError::Storage(format!("Failed to open RocksDB at {}: {}", path.display(), e)))?;
        Ok(Self::from_db(Arc::new(db)))
    }

    pub fn from_db(db: Arc<DB>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScheduleStore for RocksDbScheduleStore {
    async fn save(&self, record: ScheduleRecord) -> Result<(), WorkerError> {
        let db = self.db.clone();
        let key = record_key(&record.worker, &record.key);
        let data = serde_json::to_vec(&record)?;

        tokio::task::spawn_blocking(move || -> Result<(), WorkerError> {
            db.put(key.as_bytes(), data)
                .map_err(|e| WorkerError::Storage(format!("Failed to write schedule {}: {}", key, e)))?;
            event!(Level::DEBUG, event = storage::SCHEDULE_SAVED, key = %key);
            Ok(())
        })
        .await
        .map_err(|e| WorkerError::Generic(format!("Failed to save schedule: {}", e)))?
    }

    async fn load_all(&self, worker: &str) -> Result<Vec<ScheduleRecord>, WorkerError> {
        let db = self.db.clone();
        let prefix = worker_prefix(worker);

        tokio::task::spawn_blocking(move || -> Result<Vec<ScheduleRecord>, WorkerError> {
            let mut records = Vec::new();
            let iter = db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
            for item in iter {
                let (key, value) =
                    item.map_err(|e| WorkerError::Storage(format!("Failed to iterate RocksDB: {}", e)))?;
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                match serde_json::from_slice::<ScheduleRecord>(&value) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        event!(Level::WARN, event = storage::SCHEDULE_CORRUPT,
                               key = %String::from_utf8_lossy(&key), error = %e);
                    }
                }
            }
            Ok(records)
        })
        .await
        .map_err(|e| WorkerError::Generic(format!("Failed to load schedules: {}", e)))?
    }

    async fn last_run(&self, worker: &str, key: &str) -> Result<Option<i64>, WorkerError> {
        let db = self.db.clone();
        let key = record_key(worker, key);

        tokio::task::spawn_blocking(move || -> Result<Option<i64>, WorkerError> {
            match db.get(key.as_bytes()) {
                Ok(Some(data)) => {
                    let record: ScheduleRecord = serde_json::from_slice(&data)?;
                    Ok(record.last_run)
                }
                Ok(None) => Ok(None),
                Err(e) => Err(WorkerError::Storage(format!("Failed to read from RocksDB: {}", e)))
            }
        })
        .await
        .map_err(|e| WorkerError::Generic(format!("Failed to read schedule: {}", e)))?
    }

    async fn delete(&self, worker: &str, key: &str) -> Result<(), WorkerError> {
        let db = self.db.clone();
        let key = record_key(worker, key);

        tokio::task::spawn_blocking(move || -> Result<(), WorkerError> {
            db.delete(key.as_bytes())
                .map_err(|e| WorkerError::Storage(format!("Failed to delete schedule {}: {}", key, e)))?;
            event!(Level::DEBUG, event = storage::SCHEDULE_DELETED, key = %key);
            Ok(())
        })
        .await
        .map_err(|e| WorkerError::Generic(format!("Failed to delete schedule: {}", e)))?
    }
}

/// Factory for creating schedule stores based on configuration
pub struct ScheduleStoreFactory;

impl ScheduleStoreFactory {
    pub fn create(
        store_type: ScheduleStoreType,
        db_path: Option<&Path>
    ) -> Result<Arc<dyn ScheduleStore>, WorkerError> {
        match store_type {
            ScheduleStoreType::InMemory => Ok(Arc::new(InMemoryScheduleStore::new())),
            ScheduleStoreType::RocksDb => {
                let path = db_path.ok_or_else(|| {
                    WorkerError::Validation("A database path is required for the rocksdb store".into())
                })?;
                Ok(Arc::new(RocksDbScheduleStore::open(path)?))
            }
        }
    }
}
