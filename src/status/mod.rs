// src/status/mod.rs
mod page;
mod publisher;

pub use page::{CheckView, ResultView, StatusPage, StatusView};
pub use publisher::StatusPublisher;
