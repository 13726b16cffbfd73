// src/check/types.rs
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// One configured monitoring unit. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSpec {
    pub domain: String,
    pub record_type: String,
    pub expected: String,
    pub interval: Duration,
}

impl CheckSpec {
    /// `<domain>-<type>`, the prefix of every status string and the log file stem.
    pub fn name(&self) -> String {
        format!("{}-{}", self.domain, self.record_type)
    }
}

/// A single recorded evaluation against one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub server: String,
    pub records: Vec<String>,
}

impl CheckResult {
    /// Outcome of this result for the check named `check_name` (see [`CheckSpec::name`]).
    pub fn outcome(&self, check_name: &str) -> Outcome {
        Outcome::from_status(check_name, &self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Pass,
    Fail,
    Error,
    Unsupported,
}

impl Outcome {
    /// Classifies a status such as `example.org-A-PASS` for the check `example.org-A`.
    ///
    /// Only the text after the `<domain>-<type>-` prefix is inspected, so marker
    /// words inside the domain never leak into the classification. ERROR
    /// statuses carry free-form resolver detail after `ERROR-`.
    pub fn from_status(check_name: &str, status: &str) -> Self {
        let verdict = status
            .strip_prefix(check_name)
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(status);

        match verdict {
            "PASS" => Outcome::Pass,
            "FAIL" => Outcome::Fail,
            "UNSUPPORTED" => Outcome::Unsupported,
            "ERROR" => Outcome::Error,
            v if v.starts_with("ERROR-") => Outcome::Error,
            _ => Outcome::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pending => "PENDING",
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Error => "ERROR",
            Outcome::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
