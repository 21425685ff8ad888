//! Typed requests for the worker actors

use std::{collections::BTreeSet, fmt, sync::Arc};

use ractor::{Message, RpcReplyPort};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        error::WorkerError,
        link::{Link, Suggestion},
        reminder::Reminder,
        resource::ResourceType
    },
    port::task::{Task, TaskContext}
};

/// How a request relates to the job already scheduled under its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrudType {
    Create,
    Update,
    Delete
}

/// Install, replace or cancel the timer of one reminder
#[derive(Debug, Clone)]
pub struct ReminderWorkerRequest {
    pub reminder:  Reminder,
    pub crud_type: CrudType
}

impl ReminderWorkerRequest {
    pub fn new(reminder: Reminder, crud_type: CrudType) -> Self {
        Self { reminder, crud_type }
    }
}

pub enum LinkProcessingRequest {
    /// Scrape the link and attach the requested resources to it
    Persist { link: Box<Link>, resource_set: BTreeSet<ResourceType>, process: bool },
    /// Preview a URL that has not been saved yet
    Suggest { url: String, reply: RpcReplyPort<Result<Suggestion, WorkerError>> },
    /// Whether a URL can still be opened
    ActiveCheck { url: String, reply: RpcReplyPort<bool> }
}

impl LinkProcessingRequest {
    pub fn persist(link: Link, process: bool) -> Self {
        LinkProcessingRequest::Persist {
            link: Box::new(link),
            resource_set: ResourceType::link_baseline(),
            process
        }
    }
}

impl fmt::Debug for LinkProcessingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkProcessingRequest::Persist { link, process, .. } => {
                write!(f, "Persist({}, process={})", link.id, process)
            }
            LinkProcessingRequest::Suggest { url, .. } => write!(f, "Suggest({})", url),
            LinkProcessingRequest::ActiveCheck { url, .. } => write!(f, "ActiveCheck({})", url)
        }
    }
}

/// Start, restart or resume the discussion finder of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionFinderRequest {
    pub link_id:  String,
    /// Polls already performed
    #[serde(default)]
    pub attempts: u32
}

impl DiscussionFinderRequest {
    pub fn new(link_id: &str) -> Self {
        Self { link_id: link_id.to_string(), attempts: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRefRequest {
    /// Re-index the references made by a note or snippet body
    Entry { entry_id: String },
    /// Re-index the references made by a comment
    Comment { entry_id: String, comment_id: String, crud_type: CrudType }
}

pub struct TaskRunnerRequest {
    pub task:    Arc<dyn Task>,
    pub context: TaskContext
}

impl fmt::Debug for TaskRunnerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunnerRequest").field("task", &self.task.name()).field("context", &self.context).finish()
    }
}

/// (Re)configure the periodic temp sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempFileCleanupRequest {
    pub interval_hours: u64,
    pub crud_type:      CrudType
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestRequest {
    /// Start the weekly schedule, replacing any running one
    Start,
    /// Send a digest immediately
    SendNow
}

// every request travels through a worker mailbox
impl Message for ReminderWorkerRequest {}
impl Message for LinkProcessingRequest {}
impl Message for DiscussionFinderRequest {}
impl Message for EntryRefRequest {}
impl Message for TaskRunnerRequest {}
impl Message for TempFileCleanupRequest {}
impl Message for DigestRequest {}
