//! Background workers
//!
//! Every workload runs as its own ractor actor behind a [`worker::WorkerHandle`];
//! the [`registry::WorkerRegistry`] spawns them and routes work to them.

pub mod digest;
pub mod discussion;
pub mod entry_ref;
pub mod link;
pub mod message;
pub mod registry;
pub mod reminder;
pub mod task_runner;
pub mod temp_cleanup;
pub mod worker;

pub use message::*;
pub use registry::{WorkerDependencies, WorkerRegistry};
