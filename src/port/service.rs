//! Entity services the workers call back into once work completes

use async_trait::async_trait;

use crate::domain::{
    error::WorkerError,
    link::{Comment, Entry, GroupMatches, Link, Properties},
    reminder::{Reminder, ReminderStatus}
};

#[async_trait]
pub trait LinkService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Link>, WorkerError>;

    async fn update(&self, link: &Link) -> Result<(), WorkerError>;

    /// Merge properties into the stored link without touching other columns
    async fn merge_props(&self, id: &str, props: &Properties) -> Result<(), WorkerError>;

    async fn get_unread(&self) -> Result<Vec<Link>, WorkerError>;
}

#[async_trait]
pub trait EntryService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Entry>, WorkerError>;

    /// Entries among `ids` that exist
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Entry>, WorkerError>;
}

#[async_trait]
pub trait CommentService: Send + Sync {
    async fn get_comment(&self, entry_id: &str, comment_id: &str) -> Result<Option<Comment>, WorkerError>;
}

#[async_trait]
pub trait ReminderService: Send + Sync {
    async fn get_all_active(&self) -> Result<Vec<Reminder>, WorkerError>;

    /// Authoritative check against persisted state, consulted before every fire
    async fn is_active(&self, reminder_id: &str) -> Result<bool, WorkerError>;

    async fn update_status(&self, reminder_id: &str, status: ReminderStatus) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait EntryRefService: Send + Sync {
    async fn set_entry_refs(&self, entry_id: &str, refs: &[String], origin_id: &str) -> Result<(), WorkerError>;

    /// Remove every reference made from `origin_id`, returning how many were removed
    async fn delete_origin(&self, origin_id: &str) -> Result<usize, WorkerError>;
}

#[async_trait]
pub trait EntryAuditService: Send + Sync {
    async fn accept_audit_event(&self, entry_id: &str, src: &str, details: &str) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait GroupMatcher: Send + Sync {
    /// Tags and collections whose names occur in the extracted content
    async fn match_with_content(&self, content: Option<&str>) -> Result<GroupMatches, WorkerError>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    /// Addresses of users that opted into the unread digest
    async fn digest_emails(&self) -> Result<Vec<String>, WorkerError>;
}
