//! ReminderWorker - timezone aware one-shot and recurring timers
//!
//! Each active reminder owns one job in the worker's [`ScheduledJobs`] table,
//! keyed by reminder id. The job is an explicit loop: compute the next fire,
//! sleep, re-check the reminder against persisted state, notify, repeat.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{Level, event};

use crate::{
    actor::{
        message::{CrudType, ReminderWorkerRequest},
        worker::{Worker, WorkerScope}
    },
    adapter::template::TemplateRenderer,
    domain::{
        constant::reminder_worker,
        error::WorkerError,
        notification::{Notification, NotificationMethod, NotifyPayload},
        reminder::{Reminder, ReminderKind, ReminderStatus, delay_until}
    },
    port::{
        clock::Clock,
        notify::NotifySink,
        schedule::{ScheduleRecord, ScheduleStore},
        service::{EntryService, ReminderService}
    }
};

pub const REMINDER_WORKER: &str = "reminder";

const EMAIL_SUBJECT: &str = "Lynks - Reminder Elapsed";
const PUSHOVER_TITLE: &str = "Reminder Elapsed";

#[derive(Clone)]
pub struct ReminderWorker {
    reminder_service: Arc<dyn ReminderService>,
    entry_service:    Arc<dyn EntryService>,
    notify:           Arc<dyn NotifySink>,
    schedule_store:   Arc<dyn ScheduleStore>,
    templates:        Arc<TemplateRenderer>
}

impl ReminderWorker {
    pub fn new(
        reminder_service: Arc<dyn ReminderService>,
        entry_service: Arc<dyn EntryService>,
        notify: Arc<dyn NotifySink>,
        schedule_store: Arc<dyn ScheduleStore>,
        templates: Arc<TemplateRenderer>
    ) -> Self {
        Self { reminder_service, entry_service, notify, schedule_store, templates }
    }

    fn install(&self, reminder: Reminder, scope: &WorkerScope) {
        event!(Level::INFO, event = reminder_worker::TIMER_INSTALLED,
               reminder_id = %reminder.reminder_id, entry_id = %reminder.entry_id, spec = %reminder.spec());

        let this = self.clone();
        let clock = scope.context.clock.clone();
        let key = reminder.reminder_id.clone();
        scope.jobs.launch(&key, move |_token| async move { this.run_timer(reminder, clock).await });
    }

    async fn uninstall(&self, reminder_id: &str, scope: &WorkerScope) {
        if scope.jobs.cancel(reminder_id) {
            event!(Level::INFO, event = reminder_worker::TIMER_CANCELLED, reminder_id = %reminder_id);
        }
        self.forget_schedule(reminder_id).await;
    }

    /// Fire loop of one reminder; ends when the reminder completes or is no longer active
    async fn run_timer(self, reminder: Reminder, clock: Arc<dyn Clock>) {
        let id = reminder.reminder_id.clone();
        let mut last_run = None;
        let mut fire = match reminder.next_fire(clock.now()) {
            Ok(fire) => fire,
            Err(e) => {
                event!(Level::ERROR, event = reminder_worker::SCHEDULE_INVALID, reminder_id = %id, error = %e);
                return;
            }
        };

        loop {
            self.remember_schedule(&reminder, fire, last_run).await;

            let sleep = delay_until(fire, clock.now());
            event!(Level::DEBUG, event = reminder_worker::TIMER_SLEEPING,
                   reminder_id = %id, next_fire = %fire, sleep_ms = sleep.as_millis() as u64);
            tokio::time::sleep(sleep).await;

            match self.reminder_service.is_active(&id).await {
                Ok(true) => {}
                Ok(false) => {
                    event!(Level::INFO, event = reminder_worker::REMINDER_SKIPPED_INACTIVE, reminder_id = %id);
                    self.forget_schedule(&id).await;
                    return;
                }
                Err(e) => {
                    event!(Level::ERROR, event = reminder_worker::REMINDER_SKIPPED_INACTIVE, reminder_id = %id,
                           error = %e);
                    return;
                }
            }

            self.reminder_elapsed(&reminder).await;
            last_run = Some(clock.now_millis());

            match &reminder.kind {
                ReminderKind::Adhoc { .. } => {
                    if let Err(e) = self.reminder_service.update_status(&id, ReminderStatus::Completed).await {
                        event!(Level::ERROR, event = reminder_worker::REMINDER_COMPLETED, reminder_id = %id,
                               error = %e);
                    }
                    event!(Level::INFO, event = reminder_worker::REMINDER_COMPLETED, reminder_id = %id);
                    self.forget_schedule(&id).await;
                    return;
                }
                ReminderKind::Recurring { .. } => {
                    // step from the previous fire so intervals do not drift, unless that is already behind
                    let now = clock.now();
                    let next = match reminder.next_fire(fire) {
                        Ok(next) if next > now => Ok(next),
                        Ok(_) => reminder.next_fire(now),
                        Err(e) => Err(e)
                    };
                    match next {
                        Ok(next) => fire = next,
                        Err(e) => {
                            event!(Level::ERROR, event = reminder_worker::SCHEDULE_INVALID, reminder_id = %id,
                                   error = %e);
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn reminder_elapsed(&self, reminder: &Reminder) {
        event!(Level::INFO, event = reminder_worker::REMINDER_ELAPSED,
               reminder_id = %reminder.reminder_id, entry_id = %reminder.entry_id);

        for method in &reminder.notify_methods {
            let result = match method {
                NotificationMethod::Web => {
                    let notification = Notification::reminder(reminder.message.as_deref(), Some(&reminder.entry_id));
                    self.notify.accept(notification, NotifyPayload::Reminder(Box::new(reminder.clone()))).await
                }
                NotificationMethod::Email => self.send_email(reminder).await,
                NotificationMethod::Pushover => {
                    let title = reminder.message.as_ref().map(|_| PUSHOVER_TITLE);
                    let notification = Notification::reminder(reminder.message.as_deref(), Some(&reminder.entry_id));
                    self.notify.send_pushover(title, notification).await
                }
            };

            if let Err(e) = result {
                event!(Level::WARN, event = reminder_worker::NOTIFY_FAILED,
                       reminder_id = %reminder.reminder_id, method = ?method, error = %e);
            }
        }
    }

    async fn send_email(&self, reminder: &Reminder) -> Result<(), WorkerError> {
        let entry = self.entry_service.get(&reminder.entry_id).await?;
        let title = entry.and_then(|e| e.title);
        let body = self.templates.render_reminder(title.as_deref(), &reminder.spec(), reminder.message.as_deref())?;
        self.notify.send_email(EMAIL_SUBJECT, &body).await
    }

    async fn remember_schedule(&self, reminder: &Reminder, fire: DateTime<Utc>, last_run: Option<i64>) {
        let record = ScheduleRecord {
            worker: REMINDER_WORKER.to_string(),
            key: reminder.reminder_id.clone(),
            payload: json!({ "reminder": reminder, "next_fire": fire.timestamp_millis(), "tz": reminder.tz }),
            last_run
        };
        if let Err(e) = self.schedule_store.save(record).await {
            event!(Level::WARN, event = reminder_worker::TIMER_INSTALLED, reminder_id = %reminder.reminder_id,
                   error = %e);
        }
    }

    async fn forget_schedule(&self, reminder_id: &str) {
        if let Err(e) = self.schedule_store.delete(REMINDER_WORKER, reminder_id).await {
            event!(Level::WARN, event = reminder_worker::TIMER_CANCELLED, reminder_id = %reminder_id, error = %e);
        }
    }
}

#[async_trait]
impl Worker for ReminderWorker {
    type Request = ReminderWorkerRequest;

    fn name(&self) -> &'static str {
        REMINDER_WORKER
    }

    async fn before_work(&self, scope: &WorkerScope) -> Result<(), WorkerError> {
        let reminders = self.reminder_service.get_all_active().await?;

        // drop schedules whose reminder is gone or no longer active
        for record in self.schedule_store.load_all(REMINDER_WORKER).await? {
            if !reminders.iter().any(|r| r.reminder_id == record.key) {
                self.forget_schedule(&record.key).await;
            }
        }

        event!(Level::INFO, event = reminder_worker::REMINDERS_RESUMED, count = reminders.len());
        for reminder in reminders {
            match reminder.validate() {
                Ok(()) => self.install(reminder, scope),
                Err(e) => {
                    event!(Level::ERROR, event = reminder_worker::SCHEDULE_INVALID,
                           reminder_id = %reminder.reminder_id, error = %e);
                }
            }
        }
        Ok(())
    }

    async fn do_work(&self, request: ReminderWorkerRequest, scope: &WorkerScope) -> Result<(), WorkerError> {
        let ReminderWorkerRequest { reminder, crud_type } = request;
        let id = reminder.reminder_id.clone();

        match crud_type {
            CrudType::Delete => self.uninstall(&id, scope).await,
            CrudType::Create | CrudType::Update if !reminder.is_active() => self.uninstall(&id, scope).await,
            CrudType::Create | CrudType::Update => {
                if let Err(e) = reminder.validate() {
                    self.uninstall(&id, scope).await;
                    return Err(e);
                }
                self.install(reminder, scope);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::{
        actor::worker::{WorkerContext, WorkerHandle},
        adapter::{clock::TokioClock, schedule::InMemoryScheduleStore},
        domain::{
            link::{Entry, EntryType},
            notification::NotificationType
        },
        testing::{FakeEntryService, FakeReminderService, RecordingNotifySink, advance}
    };

    struct Fixture {
        reminders: Arc<FakeReminderService>,
        entries:   Arc<FakeEntryService>,
        notify:    Arc<RecordingNotifySink>,
        store:     Arc<InMemoryScheduleStore>,
        base:      DateTime<Utc>
    }

    impl Fixture {
        fn new(base: DateTime<Utc>) -> Self {
            Self {
                reminders: Arc::new(FakeReminderService::default()),
                entries: Arc::new(FakeEntryService::default()),
                notify: Arc::new(RecordingNotifySink::default()),
                store: Arc::new(InMemoryScheduleStore::new()),
                base
            }
        }

        async fn spawn(&self) -> WorkerHandle<ReminderWorkerRequest> {
            let worker = ReminderWorker::new(
                self.reminders.clone(),
                self.entries.clone(),
                self.notify.clone(),
                self.store.clone(),
                Arc::new(TemplateRenderer::new().unwrap())
            );
            let context = WorkerContext::new(Arc::new(TokioClock::starting_at(self.base)));
            WorkerHandle::spawn(worker, context).await.unwrap()
        }

        fn millis_after(&self, minutes: i64) -> i64 {
            (self.base + chrono::Duration::minutes(minutes)).timestamp_millis()
        }

        fn fired(&self) -> usize {
            self.notify.count(NotificationType::Reminder)
        }

        /// Create the reminder in the service and hand it to the worker
        fn create(&self, handle: &WorkerHandle<ReminderWorkerRequest>, reminder: Reminder) {
            self.reminders.insert(reminder.clone());
            handle.send(ReminderWorkerRequest::new(reminder, CrudType::Create)).unwrap();
        }
    }

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_adhoc_reminders_fire_once_at_their_time() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::adhoc("r1", "e1", fixture.millis_after(15), "Europe/London"));
        fixture.create(&handle, Reminder::adhoc("r2", "e1", fixture.millis_after(45), "Europe/London"));

        advance(minutes(14)).await;
        assert_eq!(fixture.fired(), 0);

        advance(minutes(1)).await;
        assert_eq!(fixture.fired(), 1);
        assert_eq!(fixture.reminders.status("r1"), Some(ReminderStatus::Completed));
        assert_eq!(fixture.reminders.status("r2"), Some(ReminderStatus::Active));

        advance(minutes(30)).await;
        assert_eq!(fixture.fired(), 2);

        // completed reminders leave no schedule behind
        advance(minutes(120)).await;
        assert_eq!(fixture.fired(), 2);
        assert!(fixture.store.load_all(REMINDER_WORKER).await.unwrap().is_empty());
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_due_adhoc_fires_immediately() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::adhoc("r1", "e1", fixture.millis_after(-10), "UTC"));
        advance(Duration::from_secs(1)).await;

        assert_eq!(fixture.fired(), 1);
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_interval_fire_count() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::recurring("r1", "e1", "every 30 minutes", "Europe/London"));

        advance(minutes(25)).await;
        assert_eq!(fixture.fired(), 0);

        advance(minutes(160)).await;
        assert_eq!(fixture.fired(), 6);

        advance(minutes(60)).await;
        assert_eq!(fixture.fired(), 8);
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_daily_follows_reminder_timezone_across_dst() {
        // New York moves to daylight time on 10 March 2024
        let base = Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap();
        let fixture = Fixture::new(base);
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::recurring("r1", "e1", "every day 09:00", "America/New_York"));

        // 09:00 EST is 14:00 UTC on the 8th and 9th
        advance(minutes(2 * 60 + 1)).await;
        assert_eq!(fixture.fired(), 1);
        advance(minutes(24 * 60)).await;
        assert_eq!(fixture.fired(), 2);

        // 09:00 EDT on the 10th is 13:00 UTC, an hour earlier in absolute time
        let until_10th_13h = (Utc.with_ymd_and_hms(2024, 3, 10, 13, 0, 0).unwrap() - base).num_minutes() as u64;
        let elapsed = 2 * 60 + 1 + 24 * 60;
        advance(minutes(until_10th_13h - elapsed)).await;
        assert_eq!(fixture.fired(), 3);

        // four whole days after the start, four fires
        advance(minutes(4 * 24 * 60 - until_10th_13h)).await;
        assert_eq!(fixture.fired(), 4);
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_interval_in_half_hour_offset_zone() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::recurring("r1", "e1", "every 2 hours", "Asia/Kolkata"));

        advance(minutes(10 * 60)).await;
        assert_eq!(fixture.fired(), 5);
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_reminder_never_notifies() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        // the worker is handed a stale active copy of a reminder the service has disabled
        let reminder = Reminder::adhoc("r1", "e1", fixture.millis_after(5), "UTC");
        fixture.reminders.insert(reminder.clone().with_status(ReminderStatus::Disabled));
        handle.send(ReminderWorkerRequest::new(reminder, CrudType::Create)).unwrap();

        // disabled after its timer was installed
        fixture.create(&handle, Reminder::recurring("r2", "e1", "every 10 minutes", "UTC"));
        advance(minutes(1)).await;
        fixture.reminders.set_status("r2", ReminderStatus::Disabled);

        advance(minutes(60)).await;
        assert_eq!(fixture.fired(), 0);
        assert!(fixture.notify.emails().is_empty());
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_replaces_timer_and_delete_cancels() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::adhoc("r1", "e1", fixture.millis_after(15), "UTC"));
        let moved = Reminder::adhoc("r1", "e1", fixture.millis_after(45), "UTC");
        fixture.reminders.insert(moved.clone());
        handle.send(ReminderWorkerRequest::new(moved, CrudType::Update)).unwrap();

        advance(minutes(20)).await;
        assert_eq!(fixture.fired(), 0);
        advance(minutes(26)).await;
        assert_eq!(fixture.fired(), 1);

        let doomed = Reminder::recurring("r2", "e1", "every 5 minutes", "UTC");
        fixture.create(&handle, doomed.clone());
        advance(minutes(1)).await;
        assert_eq!(fixture.store.load_all(REMINDER_WORKER).await.unwrap().len(), 1);

        fixture.reminders.remove("r2");
        handle.send(ReminderWorkerRequest::new(doomed, CrudType::Delete)).unwrap();
        advance(minutes(60)).await;
        assert_eq!(fixture.fired(), 1);
        assert!(fixture.store.load_all(REMINDER_WORKER).await.unwrap().is_empty());
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_to_disabled_cancels_timer() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        let reminder = Reminder::recurring("r1", "e1", "every 10 minutes", "UTC");
        fixture.create(&handle, reminder.clone());
        let disabled = reminder.with_status(ReminderStatus::Disabled);
        handle.send(ReminderWorkerRequest::new(disabled, CrudType::Update)).unwrap();

        // the service still says active, only the cancelled timer keeps it quiet
        advance(minutes(60)).await;
        assert_eq!(fixture.fired(), 0);
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_installs_active_reminders_and_drops_orphans() {
        let fixture = Fixture::new(base());
        fixture.reminders.insert(Reminder::adhoc("r1", "e1", fixture.millis_after(10), "UTC"));
        fixture.reminders.insert(
            Reminder::adhoc("r2", "e1", fixture.millis_after(10), "UTC").with_status(ReminderStatus::Disabled)
        );
        fixture
            .store
            .save(ScheduleRecord {
                worker:   REMINDER_WORKER.to_string(),
                key:      "gone".to_string(),
                payload:  json!({}),
                last_run: None
            })
            .await
            .unwrap();

        let handle = fixture.spawn().await;
        advance(minutes(11)).await;

        assert_eq!(fixture.fired(), 1);
        assert!(fixture.store.last_run(REMINDER_WORKER, "gone").await.unwrap().is_none());
        assert!(fixture.store.load_all(REMINDER_WORKER).await.unwrap().iter().all(|r| r.key != "gone"));
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_notification_method_is_used() {
        let fixture = Fixture::new(base());
        fixture.entries.insert(Entry {
            id:         "e1".into(),
            entry_type: EntryType::Note,
            title:      Some("Quarterly review".into()),
            plain_text: None
        });
        let handle = fixture.spawn().await;

        let reminder = Reminder::adhoc("r1", "e1", fixture.millis_after(1), "UTC")
            .with_methods(&[NotificationMethod::Web, NotificationMethod::Email, NotificationMethod::Pushover])
            .with_message("prepare slides");
        fixture.create(&handle, reminder);
        advance(minutes(2)).await;

        let notifications = fixture.notify.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "prepare slides");
        assert_eq!(fixture.notify.payload_entities(), vec![Some("Reminder")]);

        let emails = fixture.notify.emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, EMAIL_SUBJECT);
        assert!(emails[0].body.contains("Quarterly review"));

        let pushovers = fixture.notify.pushovers();
        assert_eq!(pushovers.len(), 1);
        assert_eq!(pushovers[0].0.as_deref(), Some(PUSHOVER_TITLE));
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_failure_does_not_stop_recurring_reminder() {
        let mut fixture = Fixture::new(base());
        fixture.notify = Arc::new(RecordingNotifySink::failing());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::recurring("r1", "e1", "every 10 minutes", "UTC"));
        advance(minutes(30)).await;

        assert_eq!(fixture.fired(), 3);
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_reminder_is_rejected() {
        let fixture = Fixture::new(base());
        let handle = fixture.spawn().await;

        fixture.create(&handle, Reminder::recurring("r1", "e1", "every 10 minutes", "Nowhere/Special"));
        advance(minutes(30)).await;

        assert_eq!(fixture.fired(), 0);
        assert!(fixture.store.load_all(REMINDER_WORKER).await.unwrap().is_empty());
        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_skips_oversized_intervals() {
        let fixture = Fixture::new(base());
        fixture.reminders.insert(Reminder::recurring("huge", "e1", "every 3000000000000 hours", "UTC"));
        fixture.reminders.insert(Reminder::recurring("far", "e1", "every 10000000000 hours", "UTC"));
        fixture.reminders.insert(Reminder::recurring("r1", "e1", "every 10 minutes", "UTC"));

        let handle = fixture.spawn().await;
        advance(minutes(30)).await;

        assert_eq!(fixture.fired(), 3);
        let keys: Vec<String> =
            fixture.store.load_all(REMINDER_WORKER).await.unwrap().into_iter().map(|record| record.key).collect();
        assert_eq!(keys, vec!["r1".to_string()]);
        handle.close().await.unwrap();
    }
}
