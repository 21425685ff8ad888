//! # Lynks worker
//!
//! Background workers of the lynks content manager: reminder timers, link
//! scraping, discussion polling, entry reference indexing, ad-hoc tasks, temp
//! file cleanup and the unread link digest.
//!
//! - [`actor`] - the worker actors and the [`actor::WorkerRegistry`] that owns them
//! - [`port`] - the narrow interfaces the workers call back into
//! - [`adapter`] - clocks, schedule stores, resource storage, HTTP and templates
//! - [`domain`] - recurrence grammar, entities, errors and event names

pub mod actor;
pub mod adapter;
pub mod config;
pub mod domain;
pub mod port;

#[cfg(test)]
mod testing;

pub use actor::{WorkerDependencies, WorkerRegistry};
pub use config::WorkerConfig;
pub use domain::error::WorkerError;
