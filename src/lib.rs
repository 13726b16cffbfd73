// src/lib.rs
pub mod check;
pub mod config;
pub mod dns;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod server;
pub mod status;
