// src/history/store.rs
use super::log::{log_path, rehydrate, retention_cutoff, LogWriter};
use crate::check::{CheckResult, CheckSpec};
use crate::metrics::MetricsCollector;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Status shown for a check before its first result.
pub const PENDING: &str = "PENDING";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStatus {
    pub status: String,
    pub last_check: Option<DateTime<Utc>>,
}

impl CheckStatus {
    fn pending() -> Self {
        Self {
            status: PENDING.to_string(),
            last_check: None,
        }
    }
}

/// Point-in-time view of one check for rendering.
#[derive(Debug, Clone)]
pub struct CheckSnapshot {
    pub spec: CheckSpec,
    pub status: CheckStatus,
    pub latest: Option<CheckResult>,
}

/// What the status page shows for one check. Status and latest result are
/// replaced together so a reader never pairs one result's status with
/// another result's details.
#[derive(Debug, Clone)]
struct Current {
    status: CheckStatus,
    latest: Option<CheckResult>,
}

struct CheckState {
    spec: CheckSpec,
    name: String,
    log_path: Option<PathBuf>,
    history: RwLock<Vec<CheckResult>>,
}

/// Shared monitoring state: one entry per configured check.
///
/// Current status and latest result sit behind one coarse lock, each history
/// behind its own. An append takes the coarse lock only long enough to
/// overwrite one check's entry, so writers for different checks only contend
/// there, and snapshots never touch the history locks.
pub struct HistoryStore {
    checks: Vec<CheckState>,
    current: RwLock<Vec<Current>>,
    writer: Option<LogWriter>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HistoryStore {
    /// Store without durable logs.
    pub fn in_memory(specs: Vec<CheckSpec>) -> Self {
        Self::assemble(
            specs.into_iter().map(|spec| (spec, None, Vec::new())).collect(),
            None,
            None,
        )
    }

    /// Store backed by per-check logs under `log_dir`, seeded from whatever
    /// those logs hold inside the retention window.
    pub async fn open(
        specs: Vec<CheckSpec>,
        log_dir: &Path,
        writer: Option<LogWriter>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let now = Utc::now();
        let mut seeded = Vec::with_capacity(specs.len());

        for spec in specs {
            let path = log_path(log_dir, &spec);
            let history = rehydrate(&path, now).await;
            if !history.is_empty() {
                info!(
                    "Restored {} results for {} from {}",
                    history.len(),
                    spec.name(),
                    path.display()
                );
            }
            seeded.push((spec, Some(path), history));
        }

        Self::assemble(seeded, writer, metrics)
    }

    fn assemble(
        seeded: Vec<(CheckSpec, Option<PathBuf>, Vec<CheckResult>)>,
        writer: Option<LogWriter>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let mut checks = Vec::with_capacity(seeded.len());
        let mut current = Vec::with_capacity(seeded.len());

        for (spec, log_path, history) in seeded {
            let name = spec.name();
            if let Some(metrics) = &metrics {
                metrics.update_history_size(&name, history.len());
            }
            current.push(Current {
                status: CheckStatus::pending(),
                latest: history.last().cloned(),
            });
            checks.push(CheckState {
                spec,
                name,
                log_path,
                history: RwLock::new(history),
            });
        }

        if let Some(metrics) = &metrics {
            metrics.set_checks_configured(checks.len());
        }

        Self {
            checks,
            current: RwLock::new(current),
            writer,
            metrics,
        }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn spec(&self, index: usize) -> Option<&CheckSpec> {
        self.checks.get(index).map(|c| &c.spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &CheckSpec> {
        self.checks.iter().map(|c| &c.spec)
    }

    /// Records `result` for check `index`, pruning against the current time.
    pub async fn append(&self, index: usize, result: CheckResult) {
        self.append_at(index, result, Utc::now()).await
    }

    /// Records `result` for check `index`, pruning entries older than the window ending at `now`.
    pub async fn append_at(&self, index: usize, result: CheckResult, now: DateTime<Utc>) {
        let Some(check) = self.checks.get(index) else {
            warn!("Ignoring result for unknown check index {}", index);
            return;
        };

        let retained = {
            let mut history = check.history.write().await;
            history.push(result.clone());
            let cutoff = retention_cutoff(now);
            history.retain(|entry| entry.timestamp > cutoff);
            history.len()
        };

        {
            let mut current = self.current.write().await;
            current[index] = Current {
                status: CheckStatus {
                    status: result.status.clone(),
                    last_check: Some(result.timestamp),
                },
                latest: Some(result.clone()),
            };
        }

        if let (Some(writer), Some(path)) = (&self.writer, &check.log_path) {
            writer.submit(path.clone(), &result);
        }

        if let Some(metrics) = &self.metrics {
            metrics.update_check_status(&check.name, result.outcome(&check.name));
            metrics.update_history_size(&check.name, retained);
        }
    }

    pub async fn status(&self, index: usize) -> Option<CheckStatus> {
        self.current
            .read()
            .await
            .get(index)
            .map(|entry| entry.status.clone())
    }

    pub async fn history(&self, index: usize) -> Vec<CheckResult> {
        match self.checks.get(index) {
            Some(check) => check.history.read().await.clone(),
            None => Vec::new(),
        }
    }

    /// Copies status and latest result of every check in one read of the
    /// coarse lock.
    pub async fn snapshot(&self) -> Vec<CheckSnapshot> {
        let current = self.current.read().await.clone();

        self.checks
            .iter()
            .zip(current)
            .map(|(check, entry)| CheckSnapshot {
                spec: check.spec.clone(),
                status: entry.status,
                latest: entry.latest,
            })
            .collect()
    }
}
