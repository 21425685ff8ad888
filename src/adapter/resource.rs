//! Local filesystem resource manager
//!
//! Temp storage is partitioned per source URL, permanent storage per entry id:
//!
//! - `{temp_path}/{url-uuid}/{type}-{uuid}.{ext}`
//! - `{resource_path}/{entry_id}/{resource_id}.{ext}`

use std::{
    path::{Path, PathBuf},
    sync::Arc
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{Level, event};
use uuid::Uuid;

use crate::{
    domain::{
        constant::storage,
        error::WorkerError,
        resource::{GeneratedResource, Resource, ResourceType}
    },
    port::{
        clock::Clock,
        resource::{ResourceManager, ResourceRepository}
    }
};

pub struct LocalResourceManager {
    temp_path:     PathBuf,
    resource_path: PathBuf,
    temp_url_base: String,
    repository:    Arc<dyn ResourceRepository>,
    clock:         Arc<dyn Clock>
}

impl LocalResourceManager {
    pub fn new(
        temp_path: impl Into<PathBuf>,
        resource_path: impl Into<PathBuf>,
        repository: Arc<dyn ResourceRepository>,
        clock: Arc<dyn Clock>
    ) -> Self {
        Self {
            temp_path: temp_path.into(),
            resource_path: resource_path.into(),
            temp_url_base: "/api/temp".to_string(),
            repository,
            clock
        }
    }

    pub fn with_temp_url_base(mut self, base: &str) -> Self {
        self.temp_url_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Permanent location of a migrated resource
    pub fn resource_file(&self, entry_id: &str, resource_id: &str, extension: &str) -> PathBuf {
        self.resource_path.join(entry_id).join(format!("{}.{}", resource_id, extension))
    }

    /// Move one staged file and record it; the move is rolled back when the
    /// record cannot be written
    async fn migrate_one(&self, entry_id: &str, generated: &GeneratedResource) -> Result<Resource, WorkerError> {
        let source = Path::new(&generated.target_path);
        let size = tokio::fs::metadata(source)
            .await
            .map_err(|e| WorkerError::Resource(format!("Missing temp file {}: {}", generated.target_path, e)))?
            .len();

        let name = generated.resource_type.as_str().to_string();
        let id = Uuid::new_v4().to_string();
        let (parent_id, version) = match self.repository.current_version(entry_id, &name).await? {
            Some((parent_id, version)) => (parent_id, version + 1),
            None => (id.clone(), 1)
        };

        let destination = self.resource_file(entry_id, &id, &generated.extension);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        move_file(source, &destination).await?;

        let resource = Resource {
            id,
            parent_id,
            entry_id: entry_id.to_string(),
            version,
            name,
            extension: generated.extension.clone(),
            resource_type: generated.resource_type,
            size,
            date_created: self.clock.now_millis()
        };

        if let Err(e) = self.repository.insert(resource.clone()).await {
            if let Err(rollback) = tokio::fs::remove_file(&destination).await {
                event!(Level::ERROR, event = storage::MIGRATION_FAILED,
                       path = %destination.display(), error = %rollback);
            }
            return Err(e);
        }

        event!(Level::DEBUG, event = storage::RESOURCE_SAVED,
               entry_id = %entry_id, resource_id = %resource.id, version = resource.version);
        Ok(resource)
    }
}

/// Rename, falling back to copy + remove across filesystems
async fn move_file(source: &Path, destination: &Path) -> Result<(), WorkerError> {
    if tokio::fs::rename(source, destination).await.is_ok() {
        return Ok(());
    }
    if let Err(e) = tokio::fs::copy(source, destination).await {
        remove_if_exists(destination).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::remove_file(source).await {
        remove_if_exists(destination).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            event!(Level::WARN, event = storage::MIGRATION_FAILED, path = %path.display(), error = %e);
        }
    }
}

#[async_trait]
impl ResourceManager for LocalResourceManager {
    async fn save_temp_file(
        &self,
        src: &str,
        data: &[u8],
        resource_type: ResourceType,
        extension: &str
    ) -> Result<String, WorkerError> {
        let dir = self.construct_temp_base_path(src);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}-{}.{}", resource_type.as_str(), Uuid::new_v4(), extension));
        tokio::fs::write(&path, data).await?;

        event!(Level::DEBUG, event = storage::TEMP_SAVED, src = %src, path = %path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    async fn migrate_generated_resources(&self, entry_id: &str, generated: Vec<GeneratedResource>) -> Vec<Resource> {
        event!(Level::DEBUG, event = storage::MIGRATION_STARTED, entry_id = %entry_id, count = generated.len());

        let mut migrated = Vec::with_capacity(generated.len());
        for resource in &generated {
            match self.migrate_one(entry_id, resource).await {
                Ok(saved) => migrated.push(saved),
                Err(e) => {
                    event!(Level::ERROR, event = storage::MIGRATION_FAILED, entry_id = %entry_id,
                           resource_type = resource.resource_type.as_str(), error = %e);
                }
            }
            remove_if_exists(Path::new(&resource.target_path)).await;
        }
        migrated
    }

    fn construct_temp_base_path(&self, src: &str) -> PathBuf {
        self.temp_path.join(Uuid::new_v5(&Uuid::NAMESPACE_URL, src.as_bytes()).to_string())
    }

    fn construct_temp_url(&self, path: &str) -> String {
        let relative = Path::new(path).strip_prefix(&self.temp_path).unwrap_or_else(|_| Path::new(path));
        format!("{}/{}", self.temp_url_base, relative.to_string_lossy().trim_start_matches('/'))
    }

    async fn delete_temp_files(&self, src: &str) -> Result<(), WorkerError> {
        let dir = self.construct_temp_base_path(src);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                event!(Level::DEBUG, event = storage::TEMP_DELETED, src = %src);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into())
        }
    }
}

/// In-memory resource records
#[derive(Debug, Default)]
pub struct InMemoryResourceRepository {
    resources: RwLock<Vec<Resource>>
}

impl InMemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn current_version(&self, entry_id: &str, name: &str) -> Result<Option<(String, u32)>, WorkerError> {
        let resources = self.resources.read().await;
        Ok(resources
            .iter()
            .filter(|r| r.entry_id == entry_id && r.name == name)
            .max_by_key(|r| r.version)
            .map(|r| (r.parent_id.clone(), r.version)))
    }

    async fn insert(&self, resource: Resource) -> Result<(), WorkerError> {
        let mut resources = self.resources.write().await;
        if resources.iter().any(|r| r.id == resource.id) {
            return Err(WorkerError::Storage(format!("Duplicate resource id {}", resource.id)));
        }
        resources.push(resource);
        Ok(())
    }

    async fn get_for_entry(&self, entry_id: &str) -> Result<Vec<Resource>, WorkerError> {
        let resources = self.resources.read().await;
        Ok(resources.iter().filter(|r| r.entry_id == entry_id).cloned().collect())
    }
}
