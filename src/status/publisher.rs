// src/status/publisher.rs
use super::page::{StatusPage, StatusView};
use crate::history::HistoryStore;
use std::sync::Arc;

/// Renders the current state of every check on demand.
pub struct StatusPublisher {
    store: Arc<HistoryStore>,
    page: StatusPage,
    primary_server: String,
    secondary_server: Option<String>,
}

impl StatusPublisher {
    pub fn new(
        store: Arc<HistoryStore>,
        primary_server: impl Into<String>,
        secondary_server: Option<String>,
    ) -> Result<Self, minijinja::Error> {
        Ok(Self {
            store,
            page: StatusPage::new()?,
            primary_server: primary_server.into(),
            secondary_server,
        })
    }

    pub async fn view(&self) -> StatusView {
        let snapshot = self.store.snapshot().await;
        StatusView::new(
            &self.primary_server,
            self.secondary_server.as_deref(),
            &snapshot,
        )
    }

    pub async fn render(&self) -> Result<String, minijinja::Error> {
        let view = self.view().await;
        self.page.render(&view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckResult, CheckSpec};
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_render_reflects_store() {
        let store = Arc::new(HistoryStore::in_memory(vec![
            CheckSpec {
                domain: "a.test".to_string(),
                record_type: "TXT".to_string(),
                expected: "v=spf1".to_string(),
                interval: Duration::from_secs(60),
            },
            CheckSpec {
                domain: "b.test".to_string(),
                record_type: "SRV".to_string(),
                expected: "x".to_string(),
                interval: Duration::from_secs(60),
            },
        ]));
        store
            .append(
                1,
                CheckResult {
                    status: "b.test-SRV-UNSUPPORTED".to_string(),
                    timestamp: Utc::now(),
                    server: "system".to_string(),
                    records: Vec::new(),
                },
            )
            .await;

        let publisher = StatusPublisher::new(store, "system", None).unwrap();
        let view = publisher.view().await;
        assert_eq!(view.checks[0].outcome, "PENDING");
        assert_eq!(view.checks[1].outcome, "UNSUPPORTED");

        let html = publisher.render().await.unwrap();
        assert!(html.contains("b.test-SRV-UNSUPPORTED"));
        assert!(html.contains("Primary DNS Server: system"));
    }
}
