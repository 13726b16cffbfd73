// src/history/mod.rs
mod log;
mod store;

pub use log::{
    format_line, log_path, parse_history, parse_line, rehydrate, retention_cutoff, LineError,
    LogWriter, LogWriterHandle, DEFAULT_QUEUE_CAPACITY, RETENTION_DAYS,
};
pub use store::{CheckSnapshot, CheckStatus, HistoryStore, PENDING};
