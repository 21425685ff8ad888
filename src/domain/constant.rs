//! Domain Events - Structured events for internal monitoring and debugging

/// Generic worker actor events
pub mod worker {
    pub const WORKER_STARTED: &str = "worker.started";
    pub const WORKER_RESUMED: &str = "worker.resumed";
    pub const WORKER_RESUME_FAILED: &str = "worker.resume_failed";
    pub const WORKER_STOPPED: &str = "worker.stopped";
    pub const REQUEST_RECEIVED: &str = "request.received";
    pub const REQUEST_FAILED: &str = "request.failed";
    pub const JOB_LAUNCHED: &str = "job.launched";
    pub const JOB_CANCELLED: &str = "job.cancelled";
    pub const JOB_FINISHED: &str = "job.finished";
}

/// WorkerRegistry events
pub mod registry {
    pub const REGISTRY_STARTING: &str = "registry.starting";
    pub const REGISTRY_STARTED: &str = "registry.started";
    pub const WORKER_SPAWN_FAILED: &str = "registry.spawn_failed";
    pub const WORK_ACCEPTED: &str = "work.accepted";
    pub const WORK_REJECTED: &str = "work.rejected";
    pub const REGISTRY_SHUTDOWN: &str = "registry.shutdown";
}

/// ReminderWorker events
pub mod reminder_worker {
    pub const REMINDERS_RESUMED: &str = "reminders.resumed";
    pub const TIMER_INSTALLED: &str = "timer.installed";
    pub const TIMER_SLEEPING: &str = "timer.sleeping";
    pub const TIMER_CANCELLED: &str = "timer.cancelled";
    pub const REMINDER_SKIPPED_INACTIVE: &str = "reminder.skipped_inactive";
    pub const REMINDER_ELAPSED: &str = "reminder.elapsed";
    pub const REMINDER_COMPLETED: &str = "reminder.completed";
    pub const NOTIFY_FAILED: &str = "notify.failed";
    pub const SCHEDULE_INVALID: &str = "schedule.invalid";
}

/// LinkProcessorWorker events
pub mod link_worker {
    pub const PERSIST_STARTED: &str = "persist.started";
    pub const PERSIST_COMPLETED: &str = "persist.completed";
    pub const PERSIST_UNCHANGED: &str = "persist.unchanged";
    pub const PERSIST_FAILED: &str = "persist.failed";
    pub const TEXT_CLEANUP_FAILED: &str = "persist.text_cleanup_failed";
    pub const RESOURCE_EMPTY: &str = "resource.empty";
    pub const SCRAPER_CLOSE_FAILED: &str = "scraper.close_failed";
    pub const SUGGEST_STARTED: &str = "suggest.started";
    pub const SUGGEST_COMPLETED: &str = "suggest.completed";
    pub const SUGGEST_FAILED: &str = "suggest.failed";
    pub const ACTIVE_CHECK_STARTED: &str = "active_check.started";
    pub const LINK_DEAD: &str = "link.dead";
}

/// DiscussionFinderWorker events
pub mod discussion_worker {
    pub const FINDER_LAUNCHED: &str = "finder.launched";
    pub const RESUME_DELAYED: &str = "finder.resume_delayed";
    pub const POLL_COMPLETED: &str = "poll.completed";
    pub const POLL_SOURCE_FAILED: &str = "poll.source_failed";
    pub const MERGE_FAILED: &str = "discussions.merge_failed";
    pub const DISCUSSIONS_FOUND: &str = "discussions.found";
    pub const NONE_FOUND: &str = "discussions.none_found";
    pub const FINDER_SLEEPING: &str = "finder.sleeping";
    pub const FINDER_EXTENDED: &str = "finder.extended";
    pub const FINDER_FINISHED: &str = "finder.finished";
    pub const LINK_MISSING: &str = "finder.link_missing";
}

/// EntryRefWorker events
pub mod entry_ref_worker {
    pub const ORIGIN_REFS_REMOVED: &str = "refs.origin_removed";
    pub const REFS_FOUND: &str = "refs.found";
    pub const REFS_UPDATED: &str = "refs.updated";
    pub const SOURCE_MISSING: &str = "refs.source_missing";
}

/// TaskRunnerWorker events
pub mod task_worker {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
}

/// TempFileCleanupWorker events
pub mod cleanup_worker {
    pub const CLEANUP_SLEEPING: &str = "cleanup.sleeping";
    pub const CLEANUP_REMOVING: &str = "cleanup.removing";
    pub const CLEANUP_FAILED: &str = "cleanup.failed";
}

/// UnreadLinkDigestWorker events
pub mod digest_worker {
    pub const DIGEST_SLEEPING: &str = "digest.sleeping";
    pub const DIGEST_NO_RECIPIENTS: &str = "digest.no_recipients";
    pub const DIGEST_NO_LINKS: &str = "digest.no_links";
    pub const DIGEST_SENT: &str = "digest.sent";
    pub const DIGEST_FAILED: &str = "digest.failed";
}

/// Storage adapter events
pub mod storage {
    pub const SCHEDULE_SAVED: &str = "schedule.saved";
    pub const SCHEDULE_DELETED: &str = "schedule.deleted";
    pub const SCHEDULE_CORRUPT: &str = "schedule.corrupt";
    pub const TEMP_SAVED: &str = "temp.saved";
    pub const TEMP_DELETED: &str = "temp.deleted";
    pub const MIGRATION_STARTED: &str = "migration.started";
    pub const MIGRATION_FAILED: &str = "migration.failed";
    pub const RESOURCE_SAVED: &str = "resource.saved";
}
