// src/monitor/scheduler.rs
use crate::check::{evaluate, CheckResult, CheckSpec};
use crate::dns::DnsLookup;
use crate::history::HistoryStore;
use crate::metrics::{MetricsCollector, Timer};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Spawns and owns one timer loop per configured check.
pub struct Scheduler {
    store: Arc<HistoryStore>,
    primary: Arc<dyn DnsLookup>,
    secondary: Option<Arc<dyn DnsLookup>>,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Running check loops. `shutdown` stops and joins all of them.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

struct CheckWorker {
    index: usize,
    name: String,
    spec: CheckSpec,
    store: Arc<HistoryStore>,
    primary: Arc<dyn DnsLookup>,
    secondary: Option<Arc<dyn DnsLookup>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<HistoryStore>,
        primary: Arc<dyn DnsLookup>,
        secondary: Option<Arc<dyn DnsLookup>>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            store,
            primary,
            secondary,
            metrics,
        }
    }

    /// Starts every check loop. The first evaluation of each check runs immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(self.store.len());

        for (index, spec) in self.store.specs().enumerate() {
            let worker = CheckWorker {
                index,
                name: spec.name(),
                spec: spec.clone(),
                store: self.store.clone(),
                primary: self.primary.clone(),
                secondary: self.secondary.clone(),
                metrics: self.metrics.clone(),
            };

            let name = worker.name.clone();
            let task = tokio::spawn(worker.run(shutdown_rx.clone()));
            tasks.push((name, task));
        }

        info!(
            "Started {} check loops (primary: {}, secondary: {})",
            tasks.len(),
            self.primary.server(),
            self.secondary
                .as_ref()
                .map(|s| s.server())
                .unwrap_or("none")
        );

        SchedulerHandle { shutdown_tx, tasks }
    }
}

impl SchedulerHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                error!("Check loop {} ended abnormally: {}", name, e);
            }
        }

        info!("All check loops stopped");
    }
}

impl CheckWorker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(self.spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching = true;

        info!(
            "Monitoring {} every {}",
            self.name,
            humantime::format_duration(self.spec.interval)
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown_rx.changed(), if watching => match changed {
                    Ok(()) if *shutdown_rx.borrow() => break,
                    Ok(()) => {}
                    Err(_) => watching = false,
                },
            }
        }

        debug!("Check loop {} shutting down", self.name);
    }

    /// Primary then secondary, both stamped with the same capture time.
    async fn tick(&self) {
        let now = Utc::now();

        self.check_with(self.primary.as_ref(), now).await;

        if let Some(secondary) = &self.secondary {
            self.check_with(secondary.as_ref(), now).await;
        }
    }

    async fn check_with(&self, resolver: &dyn DnsLookup, now: DateTime<Utc>) {
        let timer = Timer::new();
        let evaluation = evaluate(&self.spec, resolver).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_check(
                &self.name,
                resolver.server(),
                evaluation.outcome,
                timer.elapsed(),
            );
        }

        self.store
            .append(
                self.index,
                CheckResult {
                    status: evaluation.status,
                    timestamp: now,
                    server: resolver.server().to_string(),
                    records: evaluation.records,
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Outcome;
    use crate::dns::LookupError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Resolves every name to one address, except names listed as down.
    struct ScriptedLookup {
        server: &'static str,
        address: &'static str,
        down: &'static [&'static str],
        calls: AtomicUsize,
    }

    impl ScriptedLookup {
        fn new(server: &'static str, address: &'static str) -> Self {
            Self {
                server,
                address,
                down: &[],
                calls: AtomicUsize::new(0),
            }
        }

        fn with_down(mut self, down: &'static [&'static str]) -> Self {
            self.down = down;
            self
        }

        fn answer(&self, name: &str) -> Result<Vec<String>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.iter().any(|d| *d == name) {
                Err(LookupError::Other(format!("no such host {}", name)))
            } else {
                Ok(vec![self.address.to_string()])
            }
        }
    }

    #[async_trait]
    impl DnsLookup for ScriptedLookup {
        async fn lookup_a(&self, name: &str) -> Result<Vec<String>, LookupError> {
            self.answer(name)
        }
        async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
            self.answer(name)
        }
        async fn lookup_ns(&self, name: &str) -> Result<Vec<String>, LookupError> {
            self.answer(name)
        }
        async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError> {
            self.answer(name)
        }
        async fn lookup_mx(&self, name: &str) -> Result<Vec<String>, LookupError> {
            self.answer(name)
        }
        fn server(&self) -> &str {
            self.server
        }
    }

    fn spec(domain: &str, interval: Duration) -> CheckSpec {
        CheckSpec {
            domain: domain.to_string(),
            record_type: "A".to_string(),
            expected: "10.0.0.1".to_string(),
            interval,
        }
    }

    #[tokio::test]
    async fn test_first_evaluation_is_immediate() {
        let store = Arc::new(HistoryStore::in_memory(vec![spec(
            "slow.test",
            Duration::from_secs(3600),
        )]));
        let primary = Arc::new(ScriptedLookup::new("10.0.0.53", "10.0.0.1"));

        let handle = Scheduler::new(store.clone(), primary.clone(), None, None).start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        let status = store.status(0).await.unwrap();
        assert_eq!(status.status, "slow.test-A-PASS");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_secondary_shares_capture_time_and_wins_status() {
        let store = Arc::new(HistoryStore::in_memory(vec![spec(
            "dual.test",
            Duration::from_secs(3600),
        )]));
        let primary = Arc::new(ScriptedLookup::new("10.0.0.53", "10.0.0.1"));
        let secondary = Arc::new(ScriptedLookup::new("10.0.1.53", "10.9.9.9"));

        let handle = Scheduler::new(
            store.clone(),
            primary,
            Some(secondary as Arc<dyn DnsLookup>),
            None,
        )
        .start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;

        let history = store.history(0).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].server, "10.0.0.53");
        assert_eq!(history[0].outcome(&store.spec(0).unwrap().name()), Outcome::Pass);
        assert_eq!(history[1].server, "10.0.1.53");
        assert_eq!(history[1].outcome(&store.spec(0).unwrap().name()), Outcome::Fail);
        assert_eq!(history[0].timestamp, history[1].timestamp);

        let status = store.status(0).await.unwrap();
        assert_eq!(status.status, "dual.test-A-FAIL");
        assert_eq!(status.last_check, Some(history[1].timestamp));
    }

    #[tokio::test]
    async fn test_failing_check_does_not_stall_others() {
        let store = Arc::new(HistoryStore::in_memory(vec![
            spec("down.test", Duration::from_millis(20)),
            spec("up.test", Duration::from_millis(20)),
        ]));
        let primary =
            Arc::new(ScriptedLookup::new("10.0.0.53", "10.0.0.1").with_down(&["down.test"]));

        let handle = Scheduler::new(store.clone(), primary, None, None).start();
        assert_eq!(handle.len(), 2);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let first_seen = store.status(1).await.unwrap().last_check.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        let down = store.status(0).await.unwrap();
        assert!(down.status.starts_with("down.test-A-ERROR-"));
        assert!(down.status.contains("no such host"));
        assert!(store.history(0).await.iter().all(|r| r.records.is_empty()));

        let up = store.status(1).await.unwrap();
        assert_eq!(up.status, "up.test-A-PASS");
        assert!(up.last_check.unwrap() > first_seen);
        assert!(store.history(1).await.len() >= 3);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loops() {
        let store = Arc::new(HistoryStore::in_memory(vec![spec(
            "stop.test",
            Duration::from_millis(10),
        )]));
        let primary = Arc::new(ScriptedLookup::new("10.0.0.53", "10.0.0.1"));

        let handle = Scheduler::new(store.clone(), primary.clone(), None, None).start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        let calls = primary.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(primary.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_no_checks_means_no_loops() {
        let store = Arc::new(HistoryStore::in_memory(Vec::new()));
        let primary = Arc::new(ScriptedLookup::new("10.0.0.53", "10.0.0.1"));

        let handle = Scheduler::new(store.clone(), primary, None, None).start();
        assert!(handle.is_empty());
        handle.shutdown().await;
        assert!(store.status(0).await.is_none());
    }
}
