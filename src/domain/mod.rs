pub mod command;
pub mod constant;
pub mod error;
pub mod link;
pub mod notification;
pub mod reminder;
pub mod resource;
pub mod schedule;
pub mod text;
