use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::error::WorkerError;

/// Parameters a task runs with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskContext {
    pub entry_id: Option<String>,
    pub params:   BTreeMap<String, String>
}

/// An ad-hoc unit of work submitted to the task runner
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, context: &TaskContext) -> Result<(), WorkerError>;
}
