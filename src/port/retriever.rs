use async_trait::async_trait;

use crate::domain::error::WorkerError;

/// Port for fetching remote documents
#[async_trait]
pub trait ResourceRetriever: Send + Sync {
    /// Body of a successful GET, `None` for non-success responses
    async fn get_string(&self, url: &str) -> Result<Option<String>, WorkerError>;
}
