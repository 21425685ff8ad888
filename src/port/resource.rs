use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{
    error::WorkerError,
    resource::{GeneratedResource, Resource, ResourceType}
};

/// Port for staging scrape output and migrating it into permanent storage
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Write data into the temp partition of `src`, returning the file path
    async fn save_temp_file(
        &self,
        src: &str,
        data: &[u8],
        resource_type: ResourceType,
        extension: &str
    ) -> Result<String, WorkerError>;

    /// Move each generated resource into the entry's permanent partition
    ///
    /// Each resource migrates independently: a failure is logged and the item
    /// skipped, the rest of the batch still migrates.
    async fn migrate_generated_resources(&self, entry_id: &str, generated: Vec<GeneratedResource>) -> Vec<Resource>;

    /// Temp directory for a source URL
    fn construct_temp_base_path(&self, src: &str) -> PathBuf;

    /// Public URL of a temp file, for previews
    fn construct_temp_url(&self, path: &str) -> String;

    /// Remove every temp file staged for a source URL
    async fn delete_temp_files(&self, src: &str) -> Result<(), WorkerError>;
}

/// Durable resource records
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Parent id and current version of a named resource on an entry
    async fn current_version(&self, entry_id: &str, name: &str) -> Result<Option<(String, u32)>, WorkerError>;

    async fn insert(&self, resource: Resource) -> Result<(), WorkerError>;

    async fn get_for_entry(&self, entry_id: &str) -> Result<Vec<Resource>, WorkerError>;
}
