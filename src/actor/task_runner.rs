//! TaskRunnerWorker - run ad-hoc tasks off the request path

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use crate::{
    actor::{
        message::TaskRunnerRequest,
        worker::{Worker, WorkerScope}
    },
    domain::{
        constant::task_worker,
        error::WorkerError,
        notification::{Notification, NotifyPayload}
    },
    port::notify::NotifySink
};

pub const TASK_WORKER: &str = "task_runner";

#[derive(Clone)]
pub struct TaskRunnerWorker {
    notify: Arc<dyn NotifySink>
}

impl TaskRunnerWorker {
    pub fn new(notify: Arc<dyn NotifySink>) -> Self {
        Self { notify }
    }
}

#[async_trait]
impl Worker for TaskRunnerWorker {
    type Request = TaskRunnerRequest;

    fn name(&self) -> &'static str {
        TASK_WORKER
    }

    async fn do_work(&self, request: TaskRunnerRequest, _scope: &WorkerScope) -> Result<(), WorkerError> {
        let TaskRunnerRequest { task, context } = request;
        event!(Level::INFO, event = task_worker::TASK_STARTED, task = task.name(), entry_id = ?context.entry_id);

        task.process(&context).await?;
        event!(Level::INFO, event = task_worker::TASK_COMPLETED, task = task.name());

        let notification = Notification::processed("Task submitted for processing", context.entry_id.as_deref());
        if let Err(e) = self.notify.accept(notification, NotifyPayload::Empty).await {
            event!(Level::WARN, event = task_worker::TASK_COMPLETED, task = task.name(), error = %e);
        }
        Ok(())
    }
}
