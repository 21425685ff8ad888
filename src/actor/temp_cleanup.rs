//! TempFileCleanupWorker - periodic sweep of stale scrape partitions

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{Level, event};

use crate::{
    actor::{
        message::{CrudType, TempFileCleanupRequest},
        worker::{Worker, WorkerScope}
    },
    domain::{constant::cleanup_worker, error::WorkerError},
    port::clock::Clock
};

pub const CLEANUP_WORKER: &str = "temp_cleanup";

const SWEEP_JOB: &str = "sweep";

/// Remove every directory directly under `temp_path` last modified before `cutoff`
///
/// Returns the removed directories. A missing `temp_path` is an empty sweep.
pub async fn sweep_temp_dirs(temp_path: &Path, cutoff: DateTime<Utc>) -> Result<Vec<PathBuf>, WorkerError> {
    let temp_path = temp_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let entries = match std::fs::read_dir(&temp_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into())
        };

        let mut stale = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() && DateTime::<Utc>::from(metadata.modified()?) < cutoff {
                stale.push(entry.path());
            }
        }

        let mut removed = Vec::with_capacity(stale.len());
        for dir in stale {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => removed.push(dir),
                Err(e) => {
                    event!(Level::WARN, event = cleanup_worker::CLEANUP_FAILED, path = %dir.display(), error = %e);
                }
            }
        }
        Ok(removed)
    })
    .await
    .map_err(|e| WorkerError::FileSystem(format!("Temp sweep task failed: {}", e)))?
}

#[derive(Clone)]
pub struct TempFileCleanupWorker {
    temp_path:      Arc<PathBuf>,
    max_age:        chrono::Duration,
    interval_hours: u64
}

impl TempFileCleanupWorker {
    pub fn new(temp_path: impl Into<PathBuf>, max_age_days: u64, interval_hours: u64) -> Self {
        Self {
            temp_path: Arc::new(temp_path.into()),
            max_age: chrono::Duration::days(max_age_days as i64),
            interval_hours
        }
    }

    /// Sleep first, then sweep once per interval
    async fn run_sweeps(self, interval_hours: u64, clock: Arc<dyn Clock>) {
        let interval = Duration::from_secs(interval_hours * 3600);
        loop {
            event!(Level::DEBUG, event = cleanup_worker::CLEANUP_SLEEPING, hours = interval_hours);
            tokio::time::sleep(interval).await;

            match sweep_temp_dirs(&self.temp_path, clock.now() - self.max_age).await {
                Ok(removed) if !removed.is_empty() => {
                    event!(Level::INFO, event = cleanup_worker::CLEANUP_REMOVING, count = removed.len(),
                           dirs = ?removed);
                }
                Ok(_) => {}
                Err(e) => {
                    event!(Level::ERROR, event = cleanup_worker::CLEANUP_FAILED,
                           path = %self.temp_path.display(), error = %e);
                }
            }
        }
    }
}

#[async_trait]
impl Worker for TempFileCleanupWorker {
    type Request = TempFileCleanupRequest;

    fn name(&self) -> &'static str {
        CLEANUP_WORKER
    }

    async fn before_work(&self, scope: &WorkerScope) -> Result<(), WorkerError> {
        let request = TempFileCleanupRequest { interval_hours: self.interval_hours, crud_type: CrudType::Create };
        self.do_work(request, scope).await
    }

    async fn do_work(&self, request: TempFileCleanupRequest, scope: &WorkerScope) -> Result<(), WorkerError> {
        if request.interval_hours == 0 && request.crud_type != CrudType::Delete {
            return Err(WorkerError::Validation("Cleanup interval must be at least one hour".into()));
        }

        let this = self.clone();
        let clock = scope.context.clock.clone();
        scope.jobs.apply(SWEEP_JOB, request.crud_type, move |_token| this.run_sweeps(request.interval_hours, clock));
        Ok(())
    }
}
