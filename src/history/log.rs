// src/history/log.rs
//
// Durable per-check history: one tab-separated line per recorded result in
// `<log_dir>/<domain>-<type>.log`.

use crate::check::{CheckResult, CheckSpec};
use crate::metrics::MetricsCollector;
use anyhow::Context;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Results older than this are pruned from memory and ignored on load.
pub const RETENTION_DAYS: i64 = 30;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

const FIELD_COUNT: usize = 4;

pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RETENTION_DAYS)
}

pub fn log_path(log_dir: &Path, spec: &CheckSpec) -> PathBuf {
    log_dir.join(format!("{}.log", spec.name()))
}

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("expected 4 tab-separated fields, found {0}")]
    TooFewFields(usize),

    #[error("invalid timestamp {0:?}: {1}")]
    BadTimestamp(String, chrono::ParseError),
}

/// Renders one result as a newline-terminated log line.
pub fn format_line(result: &CheckResult) -> String {
    let records = result
        .records
        .iter()
        .map(|r| one_line(r))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}\t{}\t{}\t{}\n",
        result.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        one_line(&result.status),
        one_line(&result.server),
        records
    )
}

fn one_line(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

pub fn parse_line(line: &str) -> Result<CheckResult, LineError> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < FIELD_COUNT {
        return Err(LineError::TooFewFields(parts.len()));
    }

    let timestamp = DateTime::parse_from_rfc3339(parts[0])
        .map_err(|e| LineError::BadTimestamp(parts[0].to_string(), e))?
        .with_timezone(&Utc);

    let records = if parts[3].is_empty() {
        Vec::new()
    } else {
        parts[3].split(',').map(str::to_string).collect()
    };

    Ok(CheckResult {
        status: parts[1].to_string(),
        timestamp,
        server: parts[2].to_string(),
        records,
    })
}

/// Parses a whole log, keeping lines newer than `cutoff` in file order.
pub fn parse_history(contents: &str, cutoff: DateTime<Utc>, source: &Path) -> Vec<CheckResult> {
    let mut history = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(result) if result.timestamp > cutoff => history.push(result),
            Ok(_) => {}
            Err(e) => warn!(
                "Skipping line {} of history log {}: {}",
                number + 1,
                source.display(),
                e
            ),
        }
    }

    history
}

/// Loads the retained window from a log file. Missing or unreadable files yield an empty history.
pub async fn rehydrate(path: &Path, now: DateTime<Utc>) -> Vec<CheckResult> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to load history from {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let history = parse_history(&contents, retention_cutoff(now), path);
    debug!(
        "Loaded {} history entries from {}",
        history.len(),
        path.display()
    );
    history
}

#[derive(Debug)]
struct PendingLine {
    path: PathBuf,
    line: String,
}

/// Fire-and-forget queue in front of a single background writer task.
///
/// Lines are written in submission order. A full queue drops the line
/// instead of making the caller wait.
#[derive(Clone)]
pub struct LogWriter {
    tx: mpsc::Sender<PendingLine>,
    metrics: Option<Arc<MetricsCollector>>,
}

pub struct LogWriterHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LogWriter {
    pub fn spawn(
        capacity: usize,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> (Self, LogWriterHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_writer(rx, shutdown_rx, metrics.clone()));

        (
            Self { tx, metrics },
            LogWriterHandle { shutdown_tx, task },
        )
    }

    pub fn submit(&self, path: PathBuf, result: &CheckResult) {
        let pending = PendingLine {
            path,
            line: format_line(result),
        };

        match self.tx.try_send(pending) {
            Ok(()) => return,
            Err(TrySendError::Full(pending)) => warn!(
                "History log queue full, dropping result for {}",
                pending.path.display()
            ),
            Err(TrySendError::Closed(pending)) => warn!(
                "History log writer stopped, dropping result for {}",
                pending.path.display()
            ),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_log_line_dropped();
        }
    }
}

impl LogWriterHandle {
    /// Stops accepting lines, writes everything already queued, then returns.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("History log writer task failed: {}", e);
        }
    }
}

async fn run_writer(
    mut rx: mpsc::Receiver<PendingLine>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Option<Arc<MetricsCollector>>,
) {
    let mut watching = true;

    loop {
        tokio::select! {
            pending = rx.recv() => match pending {
                Some(pending) => write_pending(&pending, metrics.as_deref()).await,
                None => break,
            },
            changed = shutdown_rx.changed(), if watching => match changed {
                Ok(()) if *shutdown_rx.borrow() => break,
                Ok(()) => {}
                Err(_) => watching = false,
            },
        }
    }

    rx.close();
    while let Some(pending) = rx.recv().await {
        write_pending(&pending, metrics.as_deref()).await;
    }

    info!("History log writer stopped");
}

async fn write_pending(pending: &PendingLine, metrics: Option<&MetricsCollector>) {
    if let Err(e) = append_line(&pending.path, &pending.line).await {
        error!("{:#}", e);
        if let Some(metrics) = metrics {
            metrics.record_log_write_failure();
        }
    }
}

async fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Error creating log directory {}", dir.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Error opening log file {}", path.display()))?;

    file.write_all(line.as_bytes())
        .await
        .with_context(|| format!("Error writing to log file {}", path.display()))?;

    file.flush()
        .await
        .with_context(|| format!("Error closing log file {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, TimeZone};

    fn result(ts: DateTime<Utc>, status: &str, records: &[&str]) -> CheckResult {
        CheckResult {
            status: status.to_string(),
            timestamp: ts,
            server: "8.8.8.8".to_string(),
            records: records.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_format_line_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let line = format_line(&result(ts, "example.org-A-PASS", &["1.1.1.1", "2.2.2.2"]));
        assert_eq!(
            line,
            "2024-05-01T12:00:00Z\texample.org-A-PASS\t8.8.8.8\t1.1.1.1,2.2.2.2\n"
        );
    }

    #[test]
    fn test_format_line_keeps_one_line_per_result() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let line = format_line(&result(ts, "x-A-ERROR-bad\tthing\nhere", &[]));
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(line.matches('\t').count(), 3);
    }

    #[test]
    fn test_parse_line_accepts_offsets() {
        let parsed =
            parse_line("2024-05-01T14:00:00+02:00\tx.test-TXT-FAIL\t1.1.1.1\tfoo,bar").unwrap();
        assert_eq!(parsed.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(parsed.status, "x.test-TXT-FAIL");
        assert_eq!(parsed.server, "1.1.1.1");
        assert_eq!(parsed.records, vec!["foo", "bar"]);
    }

    #[test]
    fn test_parse_line_empty_records() {
        let parsed = parse_line("2024-05-01T12:00:00Z\tx-A-ERROR-timeout\tsystem\t").unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert!(matches!(
            parse_line("2024-05-01T12:00:00Z\tonly-two"),
            Err(LineError::TooFewFields(2))
        ));
        assert!(matches!(
            parse_line("yesterday\tx-A-PASS\t8.8.8.8\t1.2.3.4"),
            Err(LineError::BadTimestamp(..))
        ));
    }

    #[test]
    fn test_parse_history_skips_bad_and_expired_lines() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let contents = "\
2024-05-01T00:00:00Z\told-A-PASS\t8.8.8.8\t1.2.3.4
garbage line
2024-06-29T00:00:00Z\tnew-A-PASS\t8.8.8.8\t1.2.3.4

not-a-time\tx\ty\tz
2024-06-29T01:00:00Z\tnew-A-FAIL\t1.1.1.1\t5.6.7.8
";
        let history = parse_history(contents, retention_cutoff(now), Path::new("test.log"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, "new-A-PASS");
        assert_eq!(history[1].status, "new-A-FAIL");
    }

    #[tokio::test]
    async fn test_rehydrate_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = rehydrate(&dir.path().join("absent.log"), Utc::now()).await;
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_writer_round_trip_and_idempotent_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("example.org-A.log");
        let now = Utc::now();
        let ts = now.trunc_subsecs(0);

        let (writer, handle) = LogWriter::spawn(16, None);
        let first = result(ts, "example.org-A-PASS", &["93.184.216.34"]);
        let second = CheckResult {
            server: "1.1.1.1".to_string(),
            ..result(ts, "example.org-A-ERROR-timed out", &[])
        };
        writer.submit(path.clone(), &first);
        writer.submit(path.clone(), &second);
        handle.shutdown().await;

        let loaded = rehydrate(&path, now).await;
        assert_eq!(loaded, vec![first, second]);

        let again = rehydrate(&path, now).await;
        assert_eq!(loaded, again);
    }

    #[tokio::test]
    async fn test_writer_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        tokio::fs::write(&blocker, "file").await.unwrap();

        let registry = crate::metrics::MetricsRegistry::new().unwrap();
        let metrics = registry.collector();
        let (writer, handle) = LogWriter::spawn(4, Some(metrics.clone()));
        writer.submit(
            blocker.join("x.log"),
            &result(Utc::now(), "x-A-PASS", &["1.2.3.4"]),
        );
        handle.shutdown().await;

        assert_eq!(metrics.log_write_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = crate::metrics::MetricsRegistry::new().unwrap();
        let metrics = registry.collector();
        let (writer, handle) = LogWriter::spawn(4, Some(metrics.clone()));
        handle.shutdown().await;

        writer.submit(
            dir.path().join("late.log"),
            &result(Utc::now(), "late-A-PASS", &[]),
        );
        assert_eq!(metrics.log_lines_dropped_total.get(), 1);
        assert!(!dir.path().join("late.log").exists());
    }
}
