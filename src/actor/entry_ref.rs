//! EntryRefWorker - index `@id` mentions made by notes, snippets and comments

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{Level, event};

use crate::{
    actor::{
        message::{CrudType, EntryRefRequest},
        worker::{Worker, WorkerScope}
    },
    domain::{constant::entry_ref_worker, error::WorkerError, link::EntryType},
    port::service::{CommentService, EntryRefService, EntryService}
};

pub const ENTRY_REF_WORKER: &str = "entry_ref";

/// Ids resolved per `get_many` call
const LOOKUP_CHUNK: usize = 25;

static ENTRY_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)@([a-z\d_-]{1,15})").unwrap());

/// Mentioned ids in order of first appearance
///
/// A mention must not be glued to a preceding word (`me@host`) and must end
/// at a non-word character.
pub fn find_mentions(text: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    for captures in ENTRY_MENTION.captures_iter(text) {
        let (Some(whole), Some(id)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let glued_before = text[..whole.start()].chars().next_back().is_some_and(|c| is_word(c) || c == '.');
        let glued_after = text[whole.end()..].chars().next().is_some_and(is_word);
        if glued_before || glued_after {
            continue;
        }
        let id = id.as_str().to_string();
        if !mentions.contains(&id) {
            mentions.push(id);
        }
    }
    mentions
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

#[derive(Clone)]
pub struct EntryRefWorker {
    entry_service:   Arc<dyn EntryService>,
    comment_service: Arc<dyn CommentService>,
    ref_service:     Arc<dyn EntryRefService>
}

impl EntryRefWorker {
    pub fn new(
        entry_service: Arc<dyn EntryService>,
        comment_service: Arc<dyn CommentService>,
        ref_service: Arc<dyn EntryRefService>
    ) -> Self {
        Self { entry_service, comment_service, ref_service }
    }

    /// `(entry_id, origin_id, text)` of the request's source, if it still exists
    async fn source(&self, request: &EntryRefRequest) -> Result<Option<(String, String, String)>, WorkerError> {
        match request {
            EntryRefRequest::Entry { entry_id } => {
                let Some(entry) = self.entry_service.get(entry_id).await? else {
                    return Ok(None);
                };
                match (entry.entry_type, entry.plain_text) {
                    (EntryType::Note | EntryType::Snippet, Some(text)) => Ok(Some((entry.id.clone(), entry.id, text))),
                    _ => Ok(None)
                }
            }
            EntryRefRequest::Comment { entry_id, comment_id, crud_type } => {
                let Some(comment) = self.comment_service.get_comment(entry_id, comment_id).await? else {
                    return Ok(None);
                };
                if *crud_type == CrudType::Delete {
                    let removed = self.ref_service.delete_origin(&comment.id).await?;
                    event!(Level::INFO, event = entry_ref_worker::ORIGIN_REFS_REMOVED,
                           origin_id = %comment.id, removed);
                }
                Ok(Some((comment.entry_id, comment.id, comment.plain_text)))
            }
        }
    }

    /// Mentions that resolve to existing entries
    async fn resolve(&self, mentions: Vec<String>) -> Result<Vec<String>, WorkerError> {
        let mut refs = Vec::with_capacity(mentions.len());
        for chunk in mentions.chunks(LOOKUP_CHUNK) {
            refs.extend(self.entry_service.get_many(chunk).await?.into_iter().map(|entry| entry.id));
        }
        Ok(refs)
    }
}

#[async_trait]
impl Worker for EntryRefWorker {
    type Request = EntryRefRequest;

    fn name(&self) -> &'static str {
        ENTRY_REF_WORKER
    }

    async fn do_work(&self, request: EntryRefRequest, _scope: &WorkerScope) -> Result<(), WorkerError> {
        let Some((entry_id, origin_id, text)) = self.source(&request).await? else {
            event!(Level::DEBUG, event = entry_ref_worker::SOURCE_MISSING, request = ?request);
            return Ok(());
        };

        let refs = self.resolve(find_mentions(&text)).await?;
        event!(Level::INFO, event = entry_ref_worker::REFS_FOUND,
               entry_id = %entry_id, origin_id = %origin_id, count = refs.len());

        self.ref_service.set_entry_refs(&entry_id, &refs, &origin_id).await?;
        event!(Level::INFO, event = entry_ref_worker::REFS_UPDATED, entry_id = %entry_id, origin_id = %origin_id);
        Ok(())
    }
}
