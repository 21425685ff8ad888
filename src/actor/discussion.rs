//! DiscussionFinderWorker - bounded polling of Hacker News and Reddit
//!
//! Each link gets one finder job. A finder polls, merges what it found into
//! the link's `discussions` property, then sleeps along the backoff table
//! until its attempt budget is spent. The request and its last run are
//! persisted after every poll so a restart resumes where it left off.

use std::{
    sync::{Arc, LazyLock},
    time::Duration
};

use async_trait::async_trait;
use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use tracing::{Level, event};

use crate::{
    actor::{
        message::DiscussionFinderRequest,
        worker::{Worker, WorkerScope}
    },
    domain::{
        constant::{discussion_worker, storage},
        error::WorkerError,
        link::{DISCUSSIONS_PROP, Discussion, DiscussionSource, Link},
        notification::{Notification, NotifyPayload}
    },
    port::{
        clock::Clock,
        notify::NotifySink,
        retriever::ResourceRetriever,
        schedule::{ScheduleRecord, ScheduleStore},
        service::{EntryAuditService, LinkService}
    }
};

pub const DISCUSSION_WORKER: &str = "discussion";

/// Polls a finder performs before it gives up on a quiet link
pub const MAX_ATTEMPTS: u32 = 5;

/// Minutes slept after the 1st, 2nd, 3rd and every later poll
pub const DEFAULT_INTERVALS_MINUTES: [u64; 4] = [60, 240, 600, 1440];

const AUDIT_SOURCE: &str = "DiscussionFinderWorker";
const HACKER_NEWS_SEARCH: &str = "http://hn.algolia.com/api/v1/search";
const HACKER_NEWS_ITEM: &str = "https://news.ycombinator.com/item?id=";
const REDDIT_SEARCH: &str = "https://www.reddit.com/api/info.json";

static REDDIT_POST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"reddit\.com/r/.+/comments/.+/.+").unwrap());

#[derive(Deserialize)]
struct HackerNewsResponse {
    #[serde(default)]
    hits: Vec<HackerNewsHit>
}

#[derive(Deserialize)]
struct HackerNewsHit {
    title:        Option<String>,
    #[serde(rename = "objectID")]
    object_id:    String,
    points:       Option<i64>,
    num_comments: Option<i64>,
    created_at:   String
}

#[derive(Deserialize)]
struct RedditListing {
    data: RedditListingData
}

#[derive(Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>
}

#[derive(Deserialize)]
struct RedditChild {
    kind: String,
    data: serde_json::Value
}

#[derive(Deserialize)]
struct RedditPost {
    subreddit_name_prefixed: String,
    permalink:               String,
    #[serde(default)]
    score:                   i64,
    #[serde(default)]
    num_comments:            i64,
    created_utc:             f64
}

#[derive(Clone)]
pub struct DiscussionFinderWorker {
    link_service:   Arc<dyn LinkService>,
    audit:          Arc<dyn EntryAuditService>,
    notify:         Arc<dyn NotifySink>,
    retriever:      Arc<dyn ResourceRetriever>,
    schedule_store: Arc<dyn ScheduleStore>,
    intervals:      Arc<[u64]>
}

impl DiscussionFinderWorker {
    /// An empty backoff table falls back to [`DEFAULT_INTERVALS_MINUTES`]
    pub fn new(
        link_service: Arc<dyn LinkService>,
        audit: Arc<dyn EntryAuditService>,
        notify: Arc<dyn NotifySink>,
        retriever: Arc<dyn ResourceRetriever>,
        schedule_store: Arc<dyn ScheduleStore>,
        intervals_minutes: Vec<u64>
    ) -> Self {
        let intervals: Arc<[u64]> = if intervals_minutes.is_empty() {
            Arc::from(DEFAULT_INTERVALS_MINUTES.as_slice())
        } else {
            Arc::from(intervals_minutes)
        };
        Self { link_service, audit, notify, retriever, schedule_store, intervals }
    }

    /// Wait after the poll that brought the count to `attempts`
    fn interval_minutes(&self, attempts: u32) -> u64 {
        let index = (attempts.saturating_sub(1) as usize).min(self.intervals.len() - 1);
        self.intervals[index]
    }

    /// Delay before the first poll of a (re)started finder
    ///
    /// Without a recorded run the finder polls straight away; otherwise the
    /// whole minutes since the last run are taken off the pending interval.
    fn resume_delay(&self, attempts: u32, last_run: Option<i64>, now_millis: i64) -> Duration {
        let Some(last_run) = last_run.filter(|_| attempts > 0) else {
            return Duration::ZERO;
        };
        let elapsed_minutes = ((now_millis - last_run).max(0) / 60_000) as u64;
        let interval = self.interval_minutes(attempts);
        if elapsed_minutes >= interval { Duration::ZERO } else { minutes(interval - elapsed_minutes) }
    }

    fn launch(&self, request: DiscussionFinderRequest, delay: Duration, scope: &WorkerScope) {
        event!(Level::INFO, event = discussion_worker::FINDER_LAUNCHED,
               link_id = %request.link_id, attempts = request.attempts, delay_minutes = delay.as_secs() / 60);

        let this = self.clone();
        let clock = scope.context.clock.clone();
        let key = request.link_id.clone();
        scope.jobs.launch(&key, move |_token| async move { this.run_finder(request, delay, clock).await });
    }

    async fn run_finder(self, mut request: DiscussionFinderRequest, delay: Duration, clock: Arc<dyn Clock>) {
        let id = request.link_id.clone();
        if !delay.is_zero() {
            event!(Level::DEBUG, event = discussion_worker::RESUME_DELAYED,
                   link_id = %id, sleep_minutes = delay.as_secs() / 60);
            tokio::time::sleep(delay).await;
        }

        loop {
            let link = match self.link_service.get(&id).await {
                Ok(Some(link)) => link,
                Ok(None) => {
                    event!(Level::INFO, event = discussion_worker::LINK_MISSING, link_id = %id);
                    break;
                }
                Err(e) => {
                    event!(Level::ERROR, event = discussion_worker::LINK_MISSING, link_id = %id, error = %e);
                    return;
                }
            };

            let added = self.poll(&link).await;
            request.attempts += 1;

            if request.attempts >= MAX_ATTEMPTS {
                if added == 0 {
                    event!(Level::INFO, event = discussion_worker::FINDER_FINISHED,
                           link_id = %id, attempts = request.attempts);
                    break;
                }
                event!(Level::INFO, event = discussion_worker::FINDER_EXTENDED, link_id = %id, added);
            }

            self.remember(&request, clock.now_millis()).await;
            let interval = self.interval_minutes(request.attempts);
            event!(Level::DEBUG, event = discussion_worker::FINDER_SLEEPING,
                   link_id = %id, attempts = request.attempts, sleep_minutes = interval);
            tokio::time::sleep(minutes(interval)).await;
        }

        self.forget(&id).await;
    }

    /// Query every source once and merge the results, returning how many were new
    async fn poll(&self, link: &Link) -> usize {
        let mut found = Vec::new();
        for (source, result) in [
            (DiscussionSource::HackerNews, self.hacker_news(&link.url).await),
            (DiscussionSource::Reddit, self.reddit(&link.url).await)
        ] {
            match result {
                Ok(discussions) => found.extend(discussions),
                Err(e) => {
                    event!(Level::WARN, event = discussion_worker::POLL_SOURCE_FAILED,
                           link_id = %link.id, source = ?source, error = %e);
                }
            }
        }
        event!(Level::INFO, event = discussion_worker::POLL_COMPLETED, link_id = %link.id, found = found.len());

        if found.is_empty() {
            event!(Level::INFO, event = discussion_worker::NONE_FOUND, link_id = %link.id);
            self.record_audit(&link.id, "No discussions found").await;
            return 0;
        }

        let mut updated = link.clone();
        let mut discussions = updated.props.discussions();
        let added = merge_discussions(&mut discussions, found);
        match serde_json::to_value(&discussions) {
            Ok(value) => updated.props.add_attribute(DISCUSSIONS_PROP, value),
            Err(e) => {
                event!(Level::ERROR, event = discussion_worker::MERGE_FAILED, link_id = %link.id, error = %e);
                return 0;
            }
        }
        if let Err(e) = self.link_service.merge_props(&updated.id, &updated.props).await {
            event!(Level::ERROR, event = discussion_worker::MERGE_FAILED, link_id = %link.id, error = %e);
            return 0;
        }

        if added > 0 {
            event!(Level::INFO, event = discussion_worker::DISCUSSIONS_FOUND, link_id = %link.id, added);
            let message = format!("{} new discussions found", added);
            self.record_audit(&link.id, &message).await;
            let notification = Notification::discussions(message, Some(&link.id));
            if let Err(e) = self.notify.accept(notification, NotifyPayload::Link(Box::new(updated))).await {
                event!(Level::WARN, event = discussion_worker::DISCUSSIONS_FOUND, link_id = %link.id, error = %e);
            }
        }
        added
    }

    async fn hacker_news(&self, url: &str) -> Result<Vec<Discussion>, WorkerError> {
        match self.retriever.get_string(&hacker_news_url(url)).await? {
            Some(body) if !body.trim().is_empty() => parse_hacker_news(&body),
            _ => Ok(Vec::new())
        }
    }

    /// Crossposts for a reddit post, a URL search for anything else
    async fn reddit(&self, url: &str) -> Result<Vec<Discussion>, WorkerError> {
        let crossposts = REDDIT_POST.is_match(url);
        let request_url = if crossposts { url.replace("comments", "duplicates") } else { reddit_search_url(url) };
        let body = match self.retriever.get_string(&request_url).await? {
            Some(body) if !body.trim().is_empty() => body,
            _ => return Ok(Vec::new())
        };

        let mut node: serde_json::Value = serde_json::from_str(&body)?;
        if crossposts {
            node = match node.as_array_mut() {
                Some(listings) if listings.len() > 1 => listings.swap_remove(1),
                _ => return Ok(Vec::new())
            };
        }
        parse_reddit(node)
    }

    async fn record_audit(&self, link_id: &str, details: &str) {
        if let Err(e) = self.audit.accept_audit_event(link_id, AUDIT_SOURCE, details).await {
            event!(Level::WARN, event = discussion_worker::POLL_COMPLETED, link_id = %link_id, error = %e);
        }
    }

    async fn remember(&self, request: &DiscussionFinderRequest, last_run: i64) {
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => {
                event!(Level::ERROR, event = storage::SCHEDULE_CORRUPT, link_id = %request.link_id, error = %e);
                return;
            }
        };
        let record = ScheduleRecord {
            worker: DISCUSSION_WORKER.to_string(),
            key: request.link_id.clone(),
            payload,
            last_run: Some(last_run)
        };
        if let Err(e) = self.schedule_store.save(record).await {
            event!(Level::WARN, event = storage::SCHEDULE_SAVED, link_id = %request.link_id, error = %e);
        }
    }

    async fn forget(&self, link_id: &str) {
        if let Err(e) = self.schedule_store.delete(DISCUSSION_WORKER, link_id).await {
            event!(Level::WARN, event = storage::SCHEDULE_DELETED, link_id = %link_id, error = %e);
        }
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn encode(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}

fn hacker_news_url(url: &str) -> String {
    format!("{}?query={}&restrictSearchableAttributes=url", HACKER_NEWS_SEARCH, encode(url))
}

fn reddit_search_url(url: &str) -> String {
    format!("{}?url={}", REDDIT_SEARCH, encode(url))
}

fn parse_hacker_news(body: &str) -> Result<Vec<Discussion>, WorkerError> {
    let response: HackerNewsResponse = serde_json::from_str(body)?;
    response
        .hits
        .into_iter()
        .map(|hit| {
            let created = DateTime::parse_from_rfc3339(&hit.created_at)
                .map_err(|e| WorkerError::Serialization(format!("Invalid created_at {}: {}", hit.created_at, e)))?;
            Ok(Discussion {
                source:   DiscussionSource::HackerNews,
                title:    hit.title.unwrap_or_default(),
                url:      format!("{}{}", HACKER_NEWS_ITEM, hit.object_id),
                score:    hit.points.unwrap_or_default(),
                comments: hit.num_comments.unwrap_or_default(),
                created:  created.timestamp_millis()
            })
        })
        .collect()
}

/// Link posts (`t3`) of a reddit listing
fn parse_reddit(node: serde_json::Value) -> Result<Vec<Discussion>, WorkerError> {
    let listing: RedditListing = serde_json::from_value(node)?;
    let mut discussions = Vec::new();
    for child in listing.data.children.into_iter().filter(|c| c.kind == "t3") {
        let post: RedditPost = serde_json::from_value(child.data)?;
        discussions.push(Discussion {
            source:   DiscussionSource::Reddit,
            title:    format!("/{}", post.subreddit_name_prefixed),
            url:      post.permalink,
            score:    post.score,
            comments: post.num_comments,
            created:  (post.created_utc * 1000.0) as i64
        });
    }
    Ok(discussions)
}

/// Newest first, busiest first among equals
fn sort_discussions(discussions: &mut [Discussion]) {
    discussions.sort_by(|a, b| b.created.cmp(&a.created).then(b.comments.cmp(&a.comments)));
}

/// URL-keyed union into `existing`; known URLs are refreshed, nothing is removed
fn merge_discussions(existing: &mut Vec<Discussion>, found: Vec<Discussion>) -> usize {
    let mut added = 0;
    for discussion in found {
        match existing.iter_mut().find(|d| d.url == discussion.url) {
            Some(current) => *current = discussion,
            None => {
                existing.push(discussion);
                added += 1;
            }
        }
    }
    sort_discussions(existing);
    added
}

#[async_trait]
impl Worker for DiscussionFinderWorker {
    type Request = DiscussionFinderRequest;

    fn name(&self) -> &'static str {
        DISCUSSION_WORKER
    }

    async fn before_work(&self, scope: &WorkerScope) -> Result<(), WorkerError> {
        let now = scope.context.clock.now_millis();
        for record in self.schedule_store.load_all(DISCUSSION_WORKER).await? {
            match serde_json::from_value::<DiscussionFinderRequest>(record.payload) {
                Ok(request) => {
                    let delay = self.resume_delay(request.attempts, record.last_run, now);
                    self.launch(request, delay, scope);
                }
                Err(e) => {
                    event!(Level::ERROR, event = storage::SCHEDULE_CORRUPT, key = %record.key, error = %e);
                    self.forget(&record.key).await;
                }
            }
        }
        Ok(())
    }

    async fn do_work(&self, request: DiscussionFinderRequest, scope: &WorkerScope) -> Result<(), WorkerError> {
        let last_run = match request.attempts {
            0 => None,
            _ => self.schedule_store.last_run(DISCUSSION_WORKER, &request.link_id).await?
        };
        let delay = self.resume_delay(request.attempts, last_run, scope.context.clock.now_millis());
        self.launch(request, delay, scope);
        Ok(())
    }
}
