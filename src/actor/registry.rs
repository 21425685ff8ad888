//! WorkerRegistry - owns every worker actor and is the single entry point for
//! handing work to them
//!
//! Services call the `accept_*` methods synchronously; each one only enqueues
//! onto the target mailbox and returns. Validation that can fail fast (bad
//! timezone, bad recurrence, zero interval) happens here, before enqueueing.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use ractor::Message;
use tracing::{Level, event};

use crate::{
    actor::{
        digest::UnreadLinkDigestWorker,
        discussion::DiscussionFinderWorker,
        entry_ref::EntryRefWorker,
        link::LinkProcessorWorker,
        message::{
            CrudType, DigestRequest, DiscussionFinderRequest, EntryRefRequest, LinkProcessingRequest,
            ReminderWorkerRequest, TaskRunnerRequest, TempFileCleanupRequest
        },
        reminder::ReminderWorker,
        task_runner::TaskRunnerWorker,
        temp_cleanup::TempFileCleanupWorker,
        worker::{Worker, WorkerContext, WorkerHandle}
    },
    adapter::template::TemplateRenderer,
    config::WorkerConfig,
    domain::{
        constant::registry,
        error::WorkerError,
        link::{Link, Suggestion},
        reminder::Reminder,
        resource::ResourceType,
        schedule::{Recurrence, parse_timezone}
    },
    port::{
        notify::NotifySink,
        resource::ResourceManager,
        retriever::ResourceRetriever,
        schedule::ScheduleStore,
        scraper::ScraperFactory,
        service::{
            CommentService, EntryAuditService, EntryRefService, EntryService, GroupMatcher, LinkService,
            ReminderService, UserService
        },
        task::{Task, TaskContext}
    }
};

/// Collaborators shared by the workers
#[derive(Clone)]
pub struct WorkerDependencies {
    pub link_service:     Arc<dyn LinkService>,
    pub entry_service:    Arc<dyn EntryService>,
    pub comment_service:  Arc<dyn CommentService>,
    pub reminder_service: Arc<dyn ReminderService>,
    pub ref_service:      Arc<dyn EntryRefService>,
    pub audit:            Arc<dyn EntryAuditService>,
    pub group_matcher:    Arc<dyn GroupMatcher>,
    pub user_service:     Arc<dyn UserService>,
    pub notify:           Arc<dyn NotifySink>,
    pub scrapers:         Arc<dyn ScraperFactory>,
    pub resource_manager: Arc<dyn ResourceManager>,
    pub retriever:        Arc<dyn ResourceRetriever>,
    pub schedule_store:   Arc<dyn ScheduleStore>,
    pub templates:        Arc<TemplateRenderer>
}

pub struct WorkerRegistry {
    reminder:     WorkerHandle<ReminderWorkerRequest>,
    link:         WorkerHandle<LinkProcessingRequest>,
    discussion:   WorkerHandle<DiscussionFinderRequest>,
    entry_ref:    WorkerHandle<EntryRefRequest>,
    task_runner:  WorkerHandle<TaskRunnerRequest>,
    temp_cleanup: WorkerHandle<TempFileCleanupRequest>,
    digest:       WorkerHandle<DigestRequest>,
    call_timeout: Duration
}

async fn spawn_worker<W: Worker>(worker: W, context: &WorkerContext) -> Result<WorkerHandle<W::Request>, WorkerError> {
    let name = worker.name();
    WorkerHandle::spawn(worker, context.clone()).await.inspect_err(|e| {
        event!(Level::ERROR, event = registry::WORKER_SPAWN_FAILED, worker = name, error = %e);
    })
}

impl WorkerRegistry {
    /// Spawn every worker; each one finishes its resume step before reading its mailbox
    pub async fn start(
        deps: WorkerDependencies,
        config: &WorkerConfig,
        context: WorkerContext
    ) -> Result<Self, WorkerError> {
        event!(Level::DEBUG, event = registry::REGISTRY_STARTING);

        let digest_schedule = Recurrence::parse(&config.digest.schedule)?;
        let digest_tz = parse_timezone(&config.digest.timezone)?;

        let reminder = spawn_worker(
            ReminderWorker::new(
                deps.reminder_service.clone(),
                deps.entry_service.clone(),
                deps.notify.clone(),
                deps.schedule_store.clone(),
                deps.templates.clone()
            ),
            &context
        )
        .await?;
        let link = spawn_worker(
            LinkProcessorWorker::new(
                deps.link_service.clone(),
                deps.audit.clone(),
                deps.notify.clone(),
                deps.group_matcher.clone(),
                deps.resource_manager.clone(),
                deps.scrapers.clone()
            ),
            &context
        )
        .await?;
        let discussion = spawn_worker(
            DiscussionFinderWorker::new(
                deps.link_service.clone(),
                deps.audit.clone(),
                deps.notify.clone(),
                deps.retriever.clone(),
                deps.schedule_store.clone(),
                config.discussion_intervals_minutes.clone()
            ),
            &context
        )
        .await?;
        let entry_ref = spawn_worker(
            EntryRefWorker::new(deps.entry_service.clone(), deps.comment_service.clone(), deps.ref_service.clone()),
            &context
        )
        .await?;
        let task_runner = spawn_worker(TaskRunnerWorker::new(deps.notify.clone()), &context).await?;
        let temp_cleanup = spawn_worker(
            TempFileCleanupWorker::new(
                &config.temp_path,
                config.temp_file_max_age_days,
                config.temp_cleanup_interval_hours
            ),
            &context
        )
        .await?;
        let digest = spawn_worker(
            UnreadLinkDigestWorker::new(
                deps.link_service,
                deps.user_service,
                deps.notify,
                deps.templates,
                digest_schedule,
                digest_tz,
                config.digest.max_links
            ),
            &context
        )
        .await?;

        event!(Level::INFO, event = registry::REGISTRY_STARTED, workers = 7);
        Ok(Self {
            reminder,
            link,
            discussion,
            entry_ref,
            task_runner,
            temp_cleanup,
            digest,
            call_timeout: Duration::from_secs(config.call_timeout_secs)
        })
    }

    /// Install, replace or cancel a reminder's timer
    pub fn accept_reminder_work(&self, reminder: Reminder, crud_type: CrudType) -> Result<(), WorkerError> {
        if crud_type != CrudType::Delete && reminder.is_active() {
            reminder.validate().inspect_err(|e| {
                event!(Level::WARN, event = registry::WORK_REJECTED, worker = self.reminder.name(),
                       reminder_id = %reminder.reminder_id, error = %e);
            })?;
        }
        let reminder_id = reminder.reminder_id.clone();
        enqueue(&self.reminder, ReminderWorkerRequest::new(reminder, crud_type), &reminder_id)
    }

    /// Scrape a link and attach the requested resources
    ///
    /// [`ResourceType::link_baseline`] is the set for a newly saved link.
    pub fn accept_link_work(
        &self,
        link: Link,
        resource_set: BTreeSet<ResourceType>,
        process: bool
    ) -> Result<(), WorkerError> {
        let entry_id = link.id.clone();
        let request = LinkProcessingRequest::Persist { link: Box::new(link), resource_set, process };
        enqueue(&self.link, request, &entry_id)
    }

    /// Start polling discussion sites for a link
    pub fn accept_discussion_work(&self, link_id: &str) -> Result<(), WorkerError> {
        enqueue(&self.discussion, DiscussionFinderRequest::new(link_id), link_id)
    }

    /// Re-index the mentions in a note or snippet
    pub fn accept_entry_ref_work(&self, entry_id: &str) -> Result<(), WorkerError> {
        enqueue(&self.entry_ref, EntryRefRequest::Entry { entry_id: entry_id.to_string() }, entry_id)
    }

    /// Re-index the mentions in a comment
    pub fn accept_comment_ref_work(
        &self,
        entry_id: &str,
        comment_id: &str,
        crud_type: CrudType
    ) -> Result<(), WorkerError> {
        let request = EntryRefRequest::Comment {
            entry_id: entry_id.to_string(),
            comment_id: comment_id.to_string(),
            crud_type
        };
        enqueue(&self.entry_ref, request, comment_id)
    }

    pub fn accept_task_work(&self, task: Arc<dyn Task>, context: TaskContext) -> Result<(), WorkerError> {
        let key = task.name().to_string();
        enqueue(&self.task_runner, TaskRunnerRequest { task, context }, &key)
    }

    /// Reconfigure the temp sweep interval, or stop the sweep with `Delete`
    pub fn accept_temp_cleanup_work(&self, interval_hours: u64, crud_type: CrudType) -> Result<(), WorkerError> {
        if interval_hours == 0 && crud_type != CrudType::Delete {
            let e = WorkerError::Validation("Cleanup interval must be at least one hour".into());
            event!(Level::WARN, event = registry::WORK_REJECTED, worker = self.temp_cleanup.name(), error = %e);
            return Err(e);
        }
        enqueue(&self.temp_cleanup, TempFileCleanupRequest { interval_hours, crud_type }, "sweep")
    }

    pub fn accept_digest_work(&self, request: DigestRequest) -> Result<(), WorkerError> {
        enqueue(&self.digest, request, "digest")
    }

    /// Preview a URL without saving anything
    pub async fn suggest_link(&self, url: &str) -> Result<Suggestion, WorkerError> {
        let url = url.to_string();
        self.link.call(|reply| LinkProcessingRequest::Suggest { url, reply }, Some(self.call_timeout)).await?
    }

    /// Whether a URL still opens
    pub async fn check_link_active(&self, url: &str) -> Result<bool, WorkerError> {
        let url = url.to_string();
        self.link.call(|reply| LinkProcessingRequest::ActiveCheck { url, reply }, Some(self.call_timeout)).await
    }

    /// Stop every worker, cancelling their outstanding jobs
    pub async fn shutdown(self) {
        let results = [
            self.reminder.close().await,
            self.link.close().await,
            self.discussion.close().await,
            self.entry_ref.close().await,
            self.task_runner.close().await,
            self.temp_cleanup.close().await,
            self.digest.close().await
        ];
        for e in results.into_iter().filter_map(Result::err) {
            event!(Level::WARN, event = registry::REGISTRY_SHUTDOWN, error = %e);
        }
        event!(Level::INFO, event = registry::REGISTRY_SHUTDOWN);
    }
}

fn enqueue<R: Message>(handle: &WorkerHandle<R>, request: R, key: &str) -> Result<(), WorkerError> {
    match handle.send(request) {
        Ok(()) => {
            event!(Level::DEBUG, event = registry::WORK_ACCEPTED, worker = handle.name(), key = %key);
            Ok(())
        }
        Err(e) => {
            event!(Level::ERROR, event = registry::WORK_REJECTED, worker = handle.name(), key = %key, error = %e);
            Err(e)
        }
    }
}
