//! UnreadLinkDigestWorker - weekly email of a few random unread links

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use rand::seq::IndexedRandom;
use tracing::{Level, event};

use crate::{
    actor::{
        message::DigestRequest,
        worker::{Worker, WorkerScope}
    },
    adapter::template::{DigestEntry, TemplateRenderer},
    domain::{constant::digest_worker, error::WorkerError, link::Link, reminder::delay_until, schedule::Recurrence},
    port::{
        clock::Clock,
        notify::NotifySink,
        service::{LinkService, UserService}
    }
};

pub const DIGEST_WORKER: &str = "digest";

const SCHEDULE_JOB: &str = "weekly";
const EMAIL_SUBJECT: &str = "Lynks - Weekly Digest";
const DATE_FORMAT: &str = "%d %b %Y, %H:%M";

#[derive(Clone)]
pub struct UnreadLinkDigestWorker {
    link_service: Arc<dyn LinkService>,
    user_service: Arc<dyn UserService>,
    notify:       Arc<dyn NotifySink>,
    templates:    Arc<TemplateRenderer>,
    schedule:     Recurrence,
    tz:           Tz,
    max_links:    usize
}

impl UnreadLinkDigestWorker {
    pub fn new(
        link_service: Arc<dyn LinkService>,
        user_service: Arc<dyn UserService>,
        notify: Arc<dyn NotifySink>,
        templates: Arc<TemplateRenderer>,
        schedule: Recurrence,
        tz: Tz,
        max_links: usize
    ) -> Self {
        Self { link_service, user_service, notify, templates, schedule, tz, max_links }
    }

    async fn run_schedule(self, clock: Arc<dyn Clock>) {
        loop {
            let now = clock.now();
            let fire = self.schedule.next_after(now.with_timezone(&self.tz));
            event!(Level::DEBUG, event = digest_worker::DIGEST_SLEEPING, next_fire = %fire);
            tokio::time::sleep(delay_until(fire.to_utc(), now)).await;

            if let Err(e) = self.send_digest().await {
                event!(Level::ERROR, event = digest_worker::DIGEST_FAILED, error = %e);
            }
        }
    }

    /// Email a random pick of unread links to every digest address, returning the emails sent
    async fn send_digest(&self) -> Result<usize, WorkerError> {
        let emails = self.user_service.digest_emails().await?;
        if emails.is_empty() {
            event!(Level::INFO, event = digest_worker::DIGEST_NO_RECIPIENTS);
            return Ok(0);
        }

        let links = self.link_service.get_unread().await?;
        if links.is_empty() {
            event!(Level::INFO, event = digest_worker::DIGEST_NO_LINKS);
            return Ok(0);
        }

        let entries: Vec<DigestEntry> =
            links.choose_multiple(&mut rand::rng(), self.max_links).map(|link| self.digest_entry(link)).collect();
        let body = self.templates.render_digest(&entries)?;

        let mut sent = 0;
        for email in &emails {
            match self.notify.send_email_to(email, EMAIL_SUBJECT, &body).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    event!(Level::WARN, event = digest_worker::DIGEST_FAILED, email = %email, error = %e);
                }
            }
        }
        event!(Level::INFO, event = digest_worker::DIGEST_SENT, emails = sent, links = entries.len());
        Ok(sent)
    }

    fn digest_entry(&self, link: &Link) -> DigestEntry {
        let date = DateTime::from_timestamp_millis(link.date_updated)
            .map(|updated| updated.with_timezone(&self.tz).format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        DigestEntry { title: link.title.clone(), url: link.url.clone(), source: link.source.clone(), date }
    }
}

#[async_trait]
impl Worker for UnreadLinkDigestWorker {
    type Request = DigestRequest;

    fn name(&self) -> &'static str {
        DIGEST_WORKER
    }

    async fn before_work(&self, scope: &WorkerScope) -> Result<(), WorkerError> {
        self.do_work(DigestRequest::Start, scope).await
    }

    async fn do_work(&self, request: DigestRequest, scope: &WorkerScope) -> Result<(), WorkerError> {
        match request {
            DigestRequest::Start => {
                let this = self.clone();
                let clock = scope.context.clock.clone();
                scope.jobs.launch(SCHEDULE_JOB, move |_token| this.run_schedule(clock));
            }
            DigestRequest::SendNow => {
                self.send_digest().await?;
            }
        }
        Ok(())
    }
}
