//! Ports - narrow interfaces to the collaborators the workers depend on

pub mod clock;
pub mod notify;
pub mod resource;
pub mod retriever;
pub mod schedule;
pub mod scraper;
pub mod service;
pub mod task;
