use async_trait::async_trait;

use crate::domain::{
    error::WorkerError,
    notification::{Notification, NotifyPayload}
};

/// Port for user-facing notifications
///
/// Workers treat every call as fire-and-forget: a failure is logged and never
/// fails the worker's primary operation.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn accept(&self, notification: Notification, payload: NotifyPayload) -> Result<(), WorkerError>;

    async fn send_email(&self, subject: &str, body: &str) -> Result<(), WorkerError>;

    /// Send an email to a specific address rather than the current user
    async fn send_email_to(&self, address: &str, subject: &str, body: &str) -> Result<(), WorkerError>;

    async fn send_pushover(&self, title: Option<&str>, notification: Notification) -> Result<(), WorkerError>;
}
