use thiserror::Error;

/// Common error types for the worker subsystem
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    /// Rejected input: bad timezone, bad recurrence spec, bad reminder shape
    #[error("{0}")]
    Validation(String),

    /// Schedule or resource record persistence failures
    #[error("{0}")]
    Storage(String),

    /// File system related errors
    #[error("{0}")]
    FileSystem(String),

    /// Serialization/deserialization errors
    #[error("{0}")]
    Serialization(String),

    /// Network/HTTP errors
    #[error("{0}")]
    Network(String),

    /// Scraper failures
    #[error("{0}")]
    Scrape(String),

    /// Resource migration errors
    #[error("{0}")]
    Resource(String),

    /// Template rendering errors
    #[error("{0}")]
    Template(String),

    /// Actor spawn errors
    #[error("{0}")]
    Spawn(String),

    /// The target mailbox is gone
    #[error("{0}")]
    MailboxClosed(String),

    /// Referenced entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String)
}

/// Convert from std::io::Error
impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::FileSystem(err.to_string())
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Serialization(err.to_string())
    }
}

/// Convert from rocksdb::Error
impl From<rocksdb::Error> for WorkerError {
    fn from(err: rocksdb::Error) -> Self {
        WorkerError::Storage(err.to_string())
    }
}

/// Convert from ractor::SpawnErr
impl From<ractor::SpawnErr> for WorkerError {
    fn from(err: ractor::SpawnErr) -> Self {
        WorkerError::Spawn(err.to_string())
    }
}

/// Convert from tera::Error
impl From<tera::Error> for WorkerError {
    fn from(err: tera::Error) -> Self {
        WorkerError::Template(err.to_string())
    }
}

/// Convert from reqwest::Error
impl From<reqwest::Error> for WorkerError {
    fn from(err: reqwest::Error) -> Self {
        WorkerError::Network(err.to_string())
    }
}
