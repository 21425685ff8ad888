//! Recording fakes for the ports, shared by the worker tests

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering}
    },
    time::Duration
};

use async_trait::async_trait;

use crate::{
    domain::{
        error::WorkerError,
        link::{Comment, Entry, GroupMatches, Link, Properties},
        notification::{Notification, NotificationType, NotifyPayload},
        reminder::{Reminder, ReminderStatus},
        resource::{GeneratedResource, LinkDetails, ResourceType, SuggestResponse}
    },
    port::{
        notify::NotifySink,
        retriever::ResourceRetriever,
        scraper::{Scraper, ScraperFactory},
        service::{
            CommentService, EntryAuditService, EntryRefService, EntryService, GroupMatcher, LinkService,
            ReminderService, UserService
        }
    }
};

/// Advance paused time, then let woken jobs run to their next await
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[derive(Default)]
pub struct FakeLinkService {
    links:       Mutex<HashMap<String, Link>>,
    updates:     Mutex<Vec<Link>>,
    merges:      Mutex<Vec<(String, Properties)>>,
    fail_merges: AtomicBool
}

impl FakeLinkService {
    pub fn insert(&self, link: Link) {
        self.links.lock().unwrap().insert(link.id.clone(), link);
    }

    pub fn remove(&self, id: &str) {
        self.links.lock().unwrap().remove(id);
    }

    pub fn link(&self, id: &str) -> Option<Link> {
        self.links.lock().unwrap().get(id).cloned()
    }

    pub fn updates(&self) -> Vec<Link> {
        self.updates.lock().unwrap().clone()
    }

    pub fn merges(&self) -> Vec<(String, Properties)> {
        self.merges.lock().unwrap().clone()
    }

    /// Make every later `merge_props` fail
    pub fn fail_merges(&self) {
        self.fail_merges.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LinkService for FakeLinkService {
    async fn get(&self, id: &str) -> Result<Option<Link>, WorkerError> {
        Ok(self.link(id))
    }

    async fn update(&self, link: &Link) -> Result<(), WorkerError> {
        self.updates.lock().unwrap().push(link.clone());
        self.insert(link.clone());
        Ok(())
    }

    async fn merge_props(&self, id: &str, props: &Properties) -> Result<(), WorkerError> {
        if self.fail_merges.load(Ordering::SeqCst) {
            return Err(WorkerError::Storage(format!("Unable to merge properties of {}", id)));
        }
        self.merges.lock().unwrap().push((id.to_string(), props.clone()));
        if let Some(link) = self.links.lock().unwrap().get_mut(id) {
            link.props.attributes.extend(props.attributes.clone());
            link.props.tasks = props.tasks.clone();
        }
        Ok(())
    }

    async fn get_unread(&self) -> Result<Vec<Link>, WorkerError> {
        let mut unread: Vec<Link> = self.links.lock().unwrap().values().filter(|l| !l.read).cloned().collect();
        unread.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(unread)
    }
}

#[derive(Default)]
pub struct FakeEntryService {
    entries: Mutex<HashMap<String, Entry>>,
    batches: Mutex<Vec<usize>>
}

impl FakeEntryService {
    pub fn insert(&self, entry: Entry) {
        self.entries.lock().unwrap().insert(entry.id.clone(), entry);
    }

    /// Sizes of the id batches passed to `get_many`
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntryService for FakeEntryService {
    async fn get(&self, id: &str) -> Result<Option<Entry>, WorkerError> {
        Ok(self.entries.lock().unwrap().get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Entry>, WorkerError> {
        self.batches.lock().unwrap().push(ids.len());
        let entries = self.entries.lock().unwrap();
        Ok(ids.iter().filter_map(|id| entries.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct FakeCommentService {
    comments: Mutex<HashMap<String, Comment>>
}

impl FakeCommentService {
    pub fn insert(&self, comment: Comment) {
        self.comments.lock().unwrap().insert(comment.id.clone(), comment);
    }
}

#[async_trait]
impl CommentService for FakeCommentService {
    async fn get_comment(&self, entry_id: &str, comment_id: &str) -> Result<Option<Comment>, WorkerError> {
        Ok(self.comments.lock().unwrap().get(comment_id).filter(|c| c.entry_id == entry_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeReminderService {
    reminders: Mutex<HashMap<String, Reminder>>
}

impl FakeReminderService {
    pub fn insert(&self, reminder: Reminder) {
        self.reminders.lock().unwrap().insert(reminder.reminder_id.clone(), reminder);
    }

    pub fn set_status(&self, reminder_id: &str, status: ReminderStatus) {
        if let Some(reminder) = self.reminders.lock().unwrap().get_mut(reminder_id) {
            reminder.status = status;
        }
    }

    pub fn remove(&self, reminder_id: &str) {
        self.reminders.lock().unwrap().remove(reminder_id);
    }

    pub fn status(&self, reminder_id: &str) -> Option<ReminderStatus> {
        self.reminders.lock().unwrap().get(reminder_id).map(|r| r.status)
    }
}

#[async_trait]
impl ReminderService for FakeReminderService {
    async fn get_all_active(&self) -> Result<Vec<Reminder>, WorkerError> {
        Ok(self.reminders.lock().unwrap().values().filter(|r| r.is_active()).cloned().collect())
    }

    async fn is_active(&self, reminder_id: &str) -> Result<bool, WorkerError> {
        Ok(self.reminders.lock().unwrap().get(reminder_id).is_some_and(|r| r.is_active()))
    }

    async fn update_status(&self, reminder_id: &str, status: ReminderStatus) -> Result<(), WorkerError> {
        self.set_status(reminder_id, status);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEntryRefService {
    refs:            Mutex<Vec<(String, Vec<String>, String)>>,
    deleted_origins: Mutex<Vec<String>>
}

impl FakeEntryRefService {
    /// `(entry_id, refs, origin_id)` per call
    pub fn calls(&self) -> Vec<(String, Vec<String>, String)> {
        self.refs.lock().unwrap().clone()
    }

    pub fn deleted_origins(&self) -> Vec<String> {
        self.deleted_origins.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntryRefService for FakeEntryRefService {
    async fn set_entry_refs(&self, entry_id: &str, refs: &[String], origin_id: &str) -> Result<(), WorkerError> {
        self.refs.lock().unwrap().push((entry_id.to_string(), refs.to_vec(), origin_id.to_string()));
        Ok(())
    }

    async fn delete_origin(&self, origin_id: &str) -> Result<usize, WorkerError> {
        self.deleted_origins.lock().unwrap().push(origin_id.to_string());
        Ok(1)
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<(String, String, String)>>
}

impl RecordingAudit {
    /// Details of every audit event recorded for `entry_id`
    pub fn details(&self, entry_id: &str) -> Vec<String> {
        self.events.lock().unwrap().iter().filter(|(id, _, _)| id == entry_id).map(|(_, _, d)| d.clone()).collect()
    }
}

#[async_trait]
impl EntryAuditService for RecordingAudit {
    async fn accept_audit_event(&self, entry_id: &str, src: &str, details: &str) -> Result<(), WorkerError> {
        self.events.lock().unwrap().push((entry_id.to_string(), src.to_string(), details.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGroupMatcher {
    pub matches: GroupMatches
}

#[async_trait]
impl GroupMatcher for FakeGroupMatcher {
    async fn match_with_content(&self, content: Option<&str>) -> Result<GroupMatches, WorkerError> {
        Ok(if content.is_some() { self.matches.clone() } else { GroupMatches::default() })
    }
}

#[derive(Default)]
pub struct FakeUserService {
    pub emails: Vec<String>
}

#[async_trait]
impl UserService for FakeUserService {
    async fn digest_emails(&self) -> Result<Vec<String>, WorkerError> {
        Ok(self.emails.clone())
    }
}

/// One email handed to the sink; `to` is `None` for the current user
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to:      Option<String>,
    pub subject: String,
    pub body:    String
}

#[derive(Default)]
pub struct RecordingNotifySink {
    notifications: Mutex<Vec<(Notification, Option<&'static str>)>>,
    emails:        Mutex<Vec<SentEmail>>,
    pushovers:     Mutex<Vec<(Option<String>, Notification)>>,
    failing:       bool
}

impl RecordingNotifySink {
    /// A sink whose every call fails after recording
    pub fn failing() -> Self {
        Self { failing: true, ..Default::default() }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn count(&self, notification_type: NotificationType) -> usize {
        self.notifications.lock().unwrap().iter().filter(|(n, _)| n.notification_type == notification_type).count()
    }

    pub fn payload_entities(&self) -> Vec<Option<&'static str>> {
        self.notifications.lock().unwrap().iter().map(|(_, p)| *p).collect()
    }

    pub fn emails(&self) -> Vec<SentEmail> {
        self.emails.lock().unwrap().clone()
    }

    pub fn pushovers(&self) -> Vec<(Option<String>, Notification)> {
        self.pushovers.lock().unwrap().clone()
    }

    fn result(&self) -> Result<(), WorkerError> {
        if self.failing { Err(WorkerError::Network("notification service unavailable".into())) } else { Ok(()) }
    }
}

#[async_trait]
impl NotifySink for RecordingNotifySink {
    async fn accept(&self, notification: Notification, payload: NotifyPayload) -> Result<(), WorkerError> {
        self.notifications.lock().unwrap().push((notification, payload.entity()));
        self.result()
    }

    async fn send_email(&self, subject: &str, body: &str) -> Result<(), WorkerError> {
        self.emails.lock().unwrap().push(SentEmail { to: None, subject: subject.into(), body: body.into() });
        self.result()
    }

    async fn send_email_to(&self, address: &str, subject: &str, body: &str) -> Result<(), WorkerError> {
        self.emails.lock().unwrap().push(SentEmail {
            to:      Some(address.into()),
            subject: subject.into(),
            body:    body.into()
        });
        self.result()
    }

    async fn send_pushover(&self, title: Option<&str>, notification: Notification) -> Result<(), WorkerError> {
        self.pushovers.lock().unwrap().push((title.map(str::to_string), notification));
        self.result()
    }
}

/// Serves canned bodies per URL; a queue yields one body per call and
/// repeats its last body once drained
#[derive(Default)]
pub struct FakeRetriever {
    responses: Mutex<HashMap<String, VecDeque<Option<String>>>>,
    requested: Mutex<Vec<String>>
}

impl FakeRetriever {
    pub fn respond(&self, url: &str, bodies: Vec<Option<String>>) {
        self.responses.lock().unwrap().insert(url.to_string(), bodies.into());
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceRetriever for FakeRetriever {
    async fn get_string(&self, url: &str) -> Result<Option<String>, WorkerError> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        let Some(queue) = responses.get_mut(url) else {
            return Ok(None);
        };
        if queue.len() > 1 { Ok(queue.pop_front().flatten()) } else { Ok(queue.front().cloned().flatten()) }
    }
}

/// Shared behaviour and call counters of every [`FakeScraper`] a factory builds
#[derive(Default)]
pub struct ScraperScript {
    pub fail_init:   bool,
    pub fail_scrape: bool,
    /// Files written into `temp_dir` on scrape, as `(type, extension, contents)`
    pub outputs:     Vec<(ResourceType, String, String)>,
    pub title:       Option<String>,
    pub keywords:    Vec<String>,
    pub inits:       AtomicUsize,
    pub scrapes:     AtomicUsize,
    pub closes:      AtomicUsize
}

pub struct FakeScraper {
    script:   Arc<ScraperScript>,
    url:      String,
    temp_dir: std::path::PathBuf
}

impl FakeScraper {
    fn write_outputs(&self, resource_set: &BTreeSet<ResourceType>) -> Result<Vec<GeneratedResource>, WorkerError> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let mut generated = Vec::new();
        for (index, (resource_type, extension, contents)) in self.script.outputs.iter().enumerate() {
            if !resource_set.contains(resource_type) {
                continue;
            }
            let path = self.temp_dir.join(format!("{}-{}.{}", resource_type.as_str(), index, extension));
            std::fs::write(&path, contents)?;
            generated.push(GeneratedResource {
                resource_type: *resource_type,
                target_path:   path.to_string_lossy().into_owned(),
                extension:     extension.clone()
            });
        }
        Ok(generated)
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn init(&mut self) -> Result<(), WorkerError> {
        self.script.inits.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_init {
            return Err(WorkerError::Scrape(format!("Unable to open {}", self.url)));
        }
        Ok(())
    }

    async fn scrape_resources(
        &mut self,
        resource_set: &BTreeSet<ResourceType>
    ) -> Result<Vec<GeneratedResource>, WorkerError> {
        self.script.scrapes.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_scrape {
            return Err(WorkerError::Scrape("page crashed".into()));
        }
        self.write_outputs(resource_set)
    }

    async fn suggest(&mut self, resource_set: &BTreeSet<ResourceType>) -> Result<SuggestResponse, WorkerError> {
        if self.script.fail_scrape {
            return Err(WorkerError::Scrape("page crashed".into()));
        }
        Ok(SuggestResponse {
            details:   LinkDetails {
                url:      self.url.clone(),
                title:    self.script.title.clone(),
                keywords: self.script.keywords.clone()
            },
            resources: self.write_outputs(resource_set)?
        })
    }

    async fn close(&mut self) -> Result<(), WorkerError> {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeScraperFactory {
    pub script:   Arc<ScraperScript>,
    pub temp_dir: std::path::PathBuf,
    /// Scrapers built per URL
    pub count:    usize
}

impl ScraperFactory for FakeScraperFactory {
    fn create_processors(&self, url: &str) -> Vec<Box<dyn Scraper>> {
        (0..self.count)
            .map(|index| {
                Box::new(FakeScraper {
                    script:   self.script.clone(),
                    url:      url.to_string(),
                    temp_dir: self.temp_dir.join(format!("scraper-{}", index))
                }) as Box<dyn Scraper>
            })
            .collect()
    }
}
