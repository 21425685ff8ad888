use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::WorkerError;

/// A persisted pending schedule for one worker and key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub worker:   String,
    pub key:      String,
    /// Serialized request the worker resumes from
    pub payload:  serde_json::Value,
    pub last_run: Option<i64>
}

/// Port for durable schedule persistence, used to rehydrate timers after restart
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Insert or replace the schedule for `worker`/`key`
    async fn save(&self, record: ScheduleRecord) -> Result<(), WorkerError>;

    /// All schedules persisted for a worker
    async fn load_all(&self, worker: &str) -> Result<Vec<ScheduleRecord>, WorkerError>;

    /// Last run timestamp of a schedule, if it exists and has run
    async fn last_run(&self, worker: &str, key: &str) -> Result<Option<i64>, WorkerError>;

    async fn delete(&self, worker: &str, key: &str) -> Result<(), WorkerError>;
}
