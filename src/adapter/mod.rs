//! Adapters - concrete implementations of the ports

pub mod clock;
pub mod resource;
pub mod retriever;
pub mod schedule;
pub mod template;
