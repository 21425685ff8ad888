//! LinkProcessorWorker - scrape, stage and migrate link resources
//!
//! Requests are handled inline, one at a time, so every migration for an
//! entry goes through this actor's serialized handler.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc
};

use async_trait::async_trait;
use ractor::RpcReplyPort;
use tracing::{Level, event};

use crate::{
    actor::{
        message::LinkProcessingRequest,
        worker::{Worker, WorkerScope}
    },
    domain::{
        constant::link_worker,
        error::WorkerError,
        link::{DEAD_LINK_PROP, Link, Suggestion},
        notification::{Notification, NotifyPayload},
        resource::{GeneratedResource, Resource, ResourceType},
        text::{normalize, remove_stopwords}
    },
    port::{
        notify::NotifySink,
        resource::ResourceManager,
        scraper::{Scraper, ScraperFactory},
        service::{EntryAuditService, GroupMatcher, LinkService}
    }
};

pub const LINK_WORKER: &str = "link";

const AUDIT_SOURCE: &str = "LinkProcessorWorker";

/// Output of the scrape phase, nothing of it persisted yet
#[derive(Default)]
struct ScrapeOutcome {
    generated: Vec<GeneratedResource>
}

#[derive(Clone)]
pub struct LinkProcessorWorker {
    link_service:     Arc<dyn LinkService>,
    audit:            Arc<dyn EntryAuditService>,
    notify:           Arc<dyn NotifySink>,
    group_matcher:    Arc<dyn GroupMatcher>,
    resource_manager: Arc<dyn ResourceManager>,
    scrapers:         Arc<dyn ScraperFactory>
}

impl LinkProcessorWorker {
    pub fn new(
        link_service: Arc<dyn LinkService>,
        audit: Arc<dyn EntryAuditService>,
        notify: Arc<dyn NotifySink>,
        group_matcher: Arc<dyn GroupMatcher>,
        resource_manager: Arc<dyn ResourceManager>,
        scrapers: Arc<dyn ScraperFactory>
    ) -> Self {
        Self { link_service, audit, notify, group_matcher, resource_manager, scrapers }
    }

    async fn persist(&self, mut link: Link, resource_set: BTreeSet<ResourceType>, process: bool) {
        event!(Level::INFO, event = link_worker::PERSIST_STARTED, entry_id = %link.id, url = %link.url, process);
        let original = link.clone();

        let result = match self.scrape(&mut link, &resource_set, process).await {
            Ok(outcome) => self.store(&mut link, &resource_set, outcome).await,
            Err(e) => Err(e)
        };

        match result {
            Ok(resources) => self.persist_succeeded(link, &original, resources, process).await,
            Err(e) => self.persist_failed(link, e).await
        }
    }

    /// Run every scraper for the link, closing each one whatever happens
    ///
    /// After the first failure the remaining scrapers are only closed.
    async fn scrape(
        &self,
        link: &mut Link,
        resource_set: &BTreeSet<ResourceType>,
        process: bool
    ) -> Result<ScrapeOutcome, WorkerError> {
        self.resource_manager.delete_temp_files(&link.url).await?;
        link.props.clear_tasks();

        let mut outcome = ScrapeOutcome::default();
        let mut failure = None;
        for mut scraper in self.scrapers.create_processors(&link.url) {
            if failure.is_none() {
                match Self::run_scraper(scraper.as_mut(), link, resource_set, process).await {
                    Ok(generated) => outcome.generated.extend(generated),
                    Err(e) => failure = Some(e)
                }
            }
            close_scraper(scraper.as_mut(), &link.url).await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(outcome)
        }
    }

    async fn run_scraper(
        scraper: &mut dyn Scraper,
        link: &mut Link,
        resource_set: &BTreeSet<ResourceType>,
        process: bool
    ) -> Result<Vec<GeneratedResource>, WorkerError> {
        scraper.enrich(&mut link.props).await?;
        if !process || resource_set.is_empty() {
            return Ok(Vec::new());
        }
        scraper.init().await?;
        scraper.scrape_resources(resource_set).await
    }

    /// Extract readable text into the link and migrate the requested resources
    async fn store(
        &self,
        link: &mut Link,
        resource_set: &BTreeSet<ResourceType>,
        outcome: ScrapeOutcome
    ) -> Result<Vec<Resource>, WorkerError> {
        let mut by_type: BTreeMap<ResourceType, GeneratedResource> = BTreeMap::new();
        for generated in outcome.generated {
            by_type.entry(generated.resource_type).or_insert(generated);
        }

        if let Some(readable) = by_type.remove(&ResourceType::ReadableText) {
            let text = tokio::fs::read_to_string(&readable.target_path).await?;
            link.content = Some(remove_stopwords(&normalize(&text)));
            if let Err(e) = tokio::fs::remove_file(&readable.target_path).await {
                event!(Level::WARN, event = link_worker::TEXT_CLEANUP_FAILED, entry_id = %link.id,
                       path = %readable.target_path, error = %e);
            }
        }

        let mut to_migrate = Vec::new();
        for resource_type in resource_set.iter().filter(|t| **t != ResourceType::ReadableText) {
            match by_type.remove(resource_type) {
                Some(generated) => to_migrate.push(generated),
                None => {
                    event!(Level::DEBUG, event = link_worker::RESOURCE_EMPTY, entry_id = %link.id,
                           resource_type = resource_type.as_str());
                }
            }
        }

        Ok(self.resource_manager.migrate_generated_resources(&link.id, to_migrate).await)
    }

    async fn persist_succeeded(&self, mut link: Link, original: &Link, resources: Vec<Resource>, process: bool) {
        if let Some(thumbnail) = resources.iter().find(|r| r.resource_type == ResourceType::Thumbnail) {
            link.thumbnail_id = Some(thumbnail.id.clone());
        }
        link.props.add_attribute(DEAD_LINK_PROP, false);

        if let Err(e) = self.link_service.merge_props(&link.id, &link.props).await {
            event!(Level::ERROR, event = link_worker::PERSIST_FAILED, entry_id = %link.id, error = %e);
        }

        if link != *original {
            if let Err(e) = self.link_service.update(&link).await {
                event!(Level::ERROR, event = link_worker::PERSIST_FAILED, entry_id = %link.id, error = %e);
            }
        } else {
            event!(Level::INFO, event = link_worker::PERSIST_UNCHANGED, entry_id = %link.id);
        }

        event!(Level::INFO, event = link_worker::PERSIST_COMPLETED, entry_id = %link.id, resources = resources.len());

        if process {
            let message = format!("Link processed successfully, {} resources created", resources.len());
            self.record_audit(&link.id, &message).await;
            let notification = Notification::processed(message, Some(&link.id));
            self.send_notification(notification, NotifyPayload::Link(Box::new(link))).await;
        }
    }

    async fn persist_failed(&self, mut link: Link, error: WorkerError) {
        event!(Level::ERROR, event = link_worker::PERSIST_FAILED, entry_id = %link.id, error = %error);

        link.props.add_attribute(DEAD_LINK_PROP, true);
        if let Err(e) = self.link_service.merge_props(&link.id, &link.props).await {
            event!(Level::ERROR, event = link_worker::PERSIST_FAILED, entry_id = %link.id, error = %e);
        }
        event!(Level::INFO, event = link_worker::LINK_DEAD, entry_id = %link.id);

        self.record_audit(&link.id, "Link processing failed").await;
        let notification = Notification::error("An error occurred whilst processing the link", Some(&link.id));
        self.send_notification(notification, NotifyPayload::Link(Box::new(link))).await;
    }

    async fn suggest(&self, url: &str) -> Result<Suggestion, WorkerError> {
        event!(Level::INFO, event = link_worker::SUGGEST_STARTED, url = %url);

        let mut suggestion = None;
        let mut last_error = None;
        for mut scraper in self.scrapers.create_processors(url) {
            if suggestion.is_none() {
                match self.suggest_with(scraper.as_mut()).await {
                    Ok(found) => suggestion = Some(found),
                    Err(e) => {
                        event!(Level::WARN, event = link_worker::SUGGEST_FAILED, url = %url, error = %e);
                        last_error = Some(e);
                    }
                }
            }
            close_scraper(scraper.as_mut(), url).await;
        }

        match (suggestion, last_error) {
            (Some(suggestion), _) => {
                event!(Level::INFO, event = link_worker::SUGGEST_COMPLETED, url = %url);
                Ok(suggestion)
            }
            (None, Some(e)) => Err(e),
            (None, None) => Err(WorkerError::NotFound(format!("No scraper available for {}", url)))
        }
    }

    async fn suggest_with(&self, scraper: &mut dyn Scraper) -> Result<Suggestion, WorkerError> {
        scraper.init().await?;
        let response = scraper.suggest(&ResourceType::suggestion()).await?;

        let mut by_type: BTreeMap<ResourceType, GeneratedResource> = BTreeMap::new();
        for generated in response.resources {
            by_type.entry(generated.resource_type).or_insert(generated);
        }

        let content = match by_type.get(&ResourceType::ReadableText) {
            Some(readable) => Some(normalize(&tokio::fs::read_to_string(&readable.target_path).await?)),
            None => None
        };
        let groups = self.group_matcher.match_with_content(content.as_deref()).await?;
        let temp_url =
            |t: ResourceType| by_type.get(&t).map(|g| self.resource_manager.construct_temp_url(&g.target_path));

        Ok(Suggestion {
            url:         response.details.url,
            title:       response.details.title,
            thumbnail:   temp_url(ResourceType::Thumbnail),
            preview:     temp_url(ResourceType::Preview),
            keywords:    response.details.keywords,
            tags:        groups.tags,
            collections: groups.collections
        })
    }

    /// Whether every scraper for the URL can open it; no scraper means unreachable
    async fn active_check(&self, url: &str) -> bool {
        event!(Level::INFO, event = link_worker::ACTIVE_CHECK_STARTED, url = %url);

        let scrapers = self.scrapers.create_processors(url);
        let mut active = !scrapers.is_empty();
        for mut scraper in scrapers {
            if active {
                if let Err(e) = scraper.init().await {
                    event!(Level::INFO, event = link_worker::LINK_DEAD, url = %url, error = %e);
                    active = false;
                }
            }
            close_scraper(scraper.as_mut(), url).await;
        }
        active
    }

    async fn record_audit(&self, entry_id: &str, details: &str) {
        if let Err(e) = self.audit.accept_audit_event(entry_id, AUDIT_SOURCE, details).await {
            event!(Level::WARN, event = link_worker::PERSIST_FAILED, entry_id = %entry_id, error = %e);
        }
    }

    async fn send_notification(&self, notification: Notification, payload: NotifyPayload) {
        if let Err(e) = self.notify.accept(notification, payload).await {
            event!(Level::WARN, event = link_worker::PERSIST_FAILED, error = %e);
        }
    }
}

async fn close_scraper(scraper: &mut dyn Scraper, url: &str) {
    if let Err(e) = scraper.close().await {
        event!(Level::WARN, event = link_worker::SCRAPER_CLOSE_FAILED, url = %url, error = %e);
    }
}

fn reply<T>(port: RpcReplyPort<T>, value: T) {
    if port.send(value).is_err() {
        event!(Level::DEBUG, event = link_worker::SUGGEST_FAILED, message = "caller went away");
    }
}

#[async_trait]
impl Worker for LinkProcessorWorker {
    type Request = LinkProcessingRequest;

    fn name(&self) -> &'static str {
        LINK_WORKER
    }

    async fn do_work(&self, request: LinkProcessingRequest, _scope: &WorkerScope) -> Result<(), WorkerError> {
        match request {
            LinkProcessingRequest::Persist { link, resource_set, process } => {
                self.persist(*link, resource_set, process).await
            }
            LinkProcessingRequest::Suggest { url, reply: port } => reply(port, self.suggest(&url).await),
            LinkProcessingRequest::ActiveCheck { url, reply: port } => reply(port, self.active_check(&url).await)
        }
        Ok(())
    }
}
