//! Worker configuration loaded from `<config_dir>/worker.yaml`

use std::{
    fs,
    path::{Path, PathBuf}
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{actor::discussion::DEFAULT_INTERVALS_MINUTES, adapter::schedule::ScheduleStoreType};

const CONFIG_FILE: &str = "worker.yaml";

/// Schedule of the unread link digest
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DigestConfig {
    /// Recurrence spec, e.g. `every monday 09:00`
    pub schedule:  String,
    pub timezone:  String,
    pub max_links: usize
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self { schedule: "every monday 09:00".to_string(), timezone: "UTC".to_string(), max_links: 5 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Staging area for scraped files, one partition per source URL
    pub temp_path:                    PathBuf,
    /// Permanent resource storage, one directory per entry
    pub resource_path:                PathBuf,
    /// RocksDB directory, used by the `rocksdb` schedule store
    pub database_path:                PathBuf,
    pub schedule_store:               ScheduleStoreType,
    /// Backoff between discussion polls
    pub discussion_intervals_minutes: Vec<u64>,
    pub temp_file_max_age_days:       u64,
    pub temp_cleanup_interval_hours:  u64,
    pub digest:                       DigestConfig,
    /// Timeout of request/reply calls into the workers
    pub call_timeout_secs:            u64
}

impl WorkerConfig {
    /// Defaults with every path under `data_dir`
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            temp_path:                    data_dir.join("temp"),
            resource_path:                data_dir.join("resources"),
            database_path:                data_dir.join("rocksdb"),
            schedule_store:               ScheduleStoreType::RocksDb,
            discussion_intervals_minutes: DEFAULT_INTERVALS_MINUTES.to_vec(),
            temp_file_max_age_days:       14,
            temp_cleanup_interval_hours:  24,
            digest:                       DigestConfig::default(),
            call_timeout_secs:            30
        }
    }

    /// Load from the platform config directory, writing defaults on first run
    pub fn load() -> Result<Self> {
        let dirs = get_project_dirs()?;
        Self::load_from(&dirs.config_dir().join(CONFIG_FILE), dirs.data_dir())
    }

    /// Load `path`, creating it from defaults rooted at `data_dir` when missing
    pub fn load_from(path: &Path, data_dir: &Path) -> Result<Self> {
        if path.exists() {
            let content =
                fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            let config = Self::with_data_dir(data_dir);
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Create the storage directories if they don't exist
    pub fn ensure_dirs_exist(&self) -> Result<()> {
        for dir in [&self.temp_path, &self.resource_path] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let data_dir = get_project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|_| std::env::temp_dir().join("lynks"));
        Self::with_data_dir(&data_dir)
    }
}

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("io", "lynks", "lynks-worker").context("Failed to determine project directories")
}
