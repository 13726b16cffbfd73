// src/status/page.rs
use crate::check::Outcome;
use crate::history::CheckSnapshot;
use minijinja::Environment;
use serde::Serialize;

const TEMPLATE_NAME: &str = "status.html";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub primary_server: String,
    pub secondary_server: Option<String>,
    pub checks: Vec<CheckView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckView {
    pub domain: String,
    pub record_type: String,
    pub expected: String,
    pub interval: String,
    pub status: String,
    pub outcome: &'static str,
    pub latest: Option<ResultView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub time: String,
    pub status: String,
    pub server: String,
    pub records: Vec<String>,
}

impl StatusView {
    pub fn new(
        primary_server: &str,
        secondary_server: Option<&str>,
        snapshot: &[CheckSnapshot],
    ) -> Self {
        let checks = snapshot
            .iter()
            .map(|check| CheckView {
                domain: check.spec.domain.clone(),
                record_type: check.spec.record_type.clone(),
                expected: check.spec.expected.clone(),
                interval: humantime::format_duration(check.spec.interval).to_string(),
                status: check.status.status.clone(),
                outcome: Outcome::from_status(&check.spec.name(), &check.status.status).as_str(),
                latest: check.latest.as_ref().map(|result| ResultView {
                    time: result.timestamp.format(TIME_FORMAT).to_string(),
                    status: result.status.clone(),
                    server: result.server.clone(),
                    records: result.records.clone(),
                }),
            })
            .collect();

        Self {
            primary_server: primary_server.to_string(),
            secondary_server: secondary_server.map(str::to_string),
            checks,
        }
    }
}

/// Compiled status page template. Rendering is a pure function of the view.
pub struct StatusPage {
    env: Environment<'static>,
}

impl StatusPage {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, include_str!("../../templates/status.html"))?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &StatusView) -> Result<String, minijinja::Error> {
        self.env.get_template(TEMPLATE_NAME)?.render(view)
    }
}
