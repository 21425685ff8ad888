//! Generic channel worker
//!
//! Every workload runs as a [`ChannelWorker`]: a ractor actor that owns one
//! FIFO mailbox of a single request type and hands each message to a
//! [`Worker`] implementation.
//! - `before_work` runs once before the first message (resume from persisted state)
//! - `do_work` failures are logged per message and never stop the actor
//! - long-running jobs (timers, polls) live in [`ScheduledJobs`] and are
//!   cancelled when the actor stops

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering}
    },
    time::Duration
};

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, Message, RpcReplyPort, rpc::CallResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    actor::message::CrudType,
    adapter::clock::SystemClock,
    domain::{constant::worker, error::WorkerError},
    port::clock::Clock
};

/// Execution context injected into every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub clock: Arc<dyn Clock>
}

impl WorkerContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Context backed by the host clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

/// Per-actor state handed to the worker on every call
pub struct WorkerScope {
    pub context: WorkerContext,
    pub jobs:    ScheduledJobs
}

#[async_trait]
pub trait Worker: Clone + Send + Sync + 'static {
    type Request: Message;

    fn name(&self) -> &'static str;

    /// Resume step, runs before the mailbox is read
    async fn before_work(&self, _scope: &WorkerScope) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn do_work(&self, request: Self::Request, scope: &WorkerScope) -> Result<(), WorkerError>;

    async fn on_stop(&self, scope: &WorkerScope) {
        scope.jobs.cancel_all();
    }
}

/// Actor adapter driving a [`Worker`]
pub struct ChannelWorker<W: Worker> {
    worker: W
}

impl<W: Worker> ChannelWorker<W> {
    pub fn new(worker: W) -> Self {
        Self { worker }
    }
}

#[async_trait::async_trait]
impl<W: Worker> Actor for ChannelWorker<W> {
    type Arguments = WorkerContext;
    type Msg = W::Request;
    type State = WorkerScope;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        context: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        let name = self.worker.name();
        event!(Level::DEBUG, event = worker::WORKER_STARTED, worker = name);

        let scope = WorkerScope { context, jobs: ScheduledJobs::new(name) };
        match self.worker.before_work(&scope).await {
            Ok(()) => event!(Level::DEBUG, event = worker::WORKER_RESUMED, worker = name),
            Err(e) => event!(Level::ERROR, event = worker::WORKER_RESUME_FAILED, worker = name, error = %e)
        }

        Ok(scope)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        let name = self.worker.name();
        event!(Level::TRACE, event = worker::REQUEST_RECEIVED, worker = name);

        if let Err(e) = self.worker.do_work(message, state).await {
            event!(Level::ERROR, event = worker::REQUEST_FAILED, worker = name, error = %e);
        }
        Ok(())
    }

    async fn post_stop(&self, _myself: ActorRef<Self::Msg>, state: &mut Self::State) -> Result<(), ActorProcessingErr> {
        self.worker.on_stop(state).await;
        event!(Level::DEBUG, event = worker::WORKER_STOPPED, worker = self.worker.name());
        Ok(())
    }
}

/// Sending side of a running worker's mailbox
pub struct WorkerHandle<R: Message> {
    name:  &'static str,
    actor: ActorRef<R>,
    join:  JoinHandle<()>
}

impl<R: Message> WorkerHandle<R> {
    /// Spawn `worker` as an actor; its resume step completes before any send is processed
    pub async fn spawn<W>(worker: W, context: WorkerContext) -> Result<Self, WorkerError>
    where
        W: Worker<Request = R>
    {
        let name = worker.name();
        let (actor, join) = Actor::spawn(None, ChannelWorker::new(worker), context).await?;
        Ok(Self { name, actor, join })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue a request; fails fast when the actor is gone
    pub fn send(&self, request: R) -> Result<(), WorkerError> {
        self.actor
            .cast(request)
            .map_err(|e| WorkerError::MailboxClosed(format!("{} mailbox closed: {}", self.name, e)))
    }

    /// Enqueue a request carrying a reply port and await the reply
    pub async fn call<T, F>(&self, build: F, timeout: Option<Duration>) -> Result<T, WorkerError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> R
    {
        match ractor::rpc::call(&self.actor, build, timeout).await {
            Ok(CallResult::Success(reply)) => Ok(reply),
            Ok(CallResult::Timeout) => Err(WorkerError::Generic(format!("{} did not reply in time", self.name))),
            Ok(CallResult::SenderError) => {
                Err(WorkerError::MailboxClosed(format!("{} dropped the reply channel", self.name)))
            }
            Err(e) => Err(WorkerError::MailboxClosed(format!("{} mailbox closed: {}", self.name, e)))
        }
    }

    /// Stop the actor and wait until its jobs are cancelled
    pub async fn close(self) -> Result<(), WorkerError> {
        self.actor.stop(None);
        self.join.await.map_err(|e| WorkerError::Generic(format!("{} failed to stop: {}", self.name, e)))
    }
}

struct JobSlot {
    generation: u64,
    token:      CancellationToken
}

/// Keyed table of cancellable background jobs
///
/// At most one job runs per key. Launching under a key that already has a job
/// cancels the old one first, and a job that finishes only clears its own slot.
#[derive(Clone)]
pub struct ScheduledJobs {
    worker:          &'static str,
    slots:           Arc<Mutex<HashMap<String, JobSlot>>>,
    next_generation: Arc<AtomicU64>,
    root:            CancellationToken
}

fn lock(slots: &Mutex<HashMap<String, JobSlot>>) -> MutexGuard<'_, HashMap<String, JobSlot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScheduledJobs {
    pub fn new(worker: &'static str) -> Self {
        Self {
            worker,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
            root: CancellationToken::new()
        }
    }

    /// Run `job` in the background under `key`
    ///
    /// The job receives its cancellation token; it is also dropped at its next
    /// await point once the token fires.
    pub fn launch<F, Fut>(&self, key: &str, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static
    {
        let token = self.root.child_token();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        if let Some(previous) =
            lock(&self.slots).insert(key.to_string(), JobSlot { generation, token: token.clone() })
        {
            previous.token.cancel();
        }

        event!(Level::DEBUG, event = worker::JOB_LAUNCHED, worker = self.worker, key = %key, generation);

        let future = job(token.clone());
        let slots = self.slots.clone();
        let key = key.to_string();
        let name = self.worker;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    event!(Level::DEBUG, event = worker::JOB_CANCELLED, worker = name, key = %key, generation);
                }
                _ = future => {
                    event!(Level::DEBUG, event = worker::JOB_FINISHED, worker = name, key = %key, generation);
                }
            }

            let mut slots = lock(&slots);
            if slots.get(&key).is_some_and(|slot| slot.generation == generation) {
                slots.remove(&key);
            }
        });
    }

    /// CREATE and UPDATE (re)launch the job for `key`, DELETE only cancels it
    pub fn apply<F, Fut>(&self, key: &str, crud_type: CrudType, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static
    {
        match crud_type {
            CrudType::Create | CrudType::Update => self.launch(key, job),
            CrudType::Delete => {
                self.cancel(key);
            }
        }
    }

    /// Cancel the job under `key`, returning whether one was running
    pub fn cancel(&self, key: &str) -> bool {
        match lock(&self.slots).remove(key) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false
        }
    }

    pub fn cancel_all(&self) {
        self.root.cancel();
        lock(&self.slots).clear();
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        lock(&self.slots).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
