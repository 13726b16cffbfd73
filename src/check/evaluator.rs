// src/check/evaluator.rs
use super::types::{CheckSpec, Outcome};
use crate::dns::{DnsLookup, LookupError};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Record types a check can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    A,
    Cname,
    Ns,
    Txt,
    Mx,
}

impl FromStr for RecordKind {
    type Err = String;

    /// Matches the spelling used in check configuration exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordKind::A),
            "CNAME" => Ok(RecordKind::Cname),
            "NS" => Ok(RecordKind::Ns),
            "TXT" => Ok(RecordKind::Txt),
            "MX" => Ok(RecordKind::Mx),
            other => Err(format!("unsupported record type {}", other)),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::A => "A",
            RecordKind::Cname => "CNAME",
            RecordKind::Ns => "NS",
            RecordKind::Txt => "TXT",
            RecordKind::Mx => "MX",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub status: String,
    pub records: Vec<String>,
}

/// Runs one lookup for `spec` through `resolver` and classifies the answer.
///
/// Never fails: resolver errors become an ERROR evaluation carrying the error
/// text, unknown record types become UNSUPPORTED.
pub async fn evaluate(spec: &CheckSpec, resolver: &dyn DnsLookup) -> Evaluation {
    let name = spec.name();

    let kind = match spec.record_type.parse::<RecordKind>() {
        Ok(kind) => kind,
        Err(_) => {
            warn!("Check {} uses an unsupported record type", name);
            return Evaluation {
                outcome: Outcome::Unsupported,
                status: format!("{}-UNSUPPORTED", name),
                records: Vec::new(),
            };
        }
    };

    let records = match lookup(kind, &spec.domain, resolver).await {
        Ok(records) => records,
        Err(e) => {
            warn!(
                "Check {} lookup via {} failed: {}",
                name,
                resolver.server(),
                e
            );
            return Evaluation {
                outcome: Outcome::Error,
                status: format!("{}-ERROR-{}", name, e),
                records: Vec::new(),
            };
        }
    };

    let expected = spec.expected.to_lowercase();
    let matched = records
        .iter()
        .any(|record| record.to_lowercase().contains(&expected));

    let outcome = if matched { Outcome::Pass } else { Outcome::Fail };
    if matched {
        debug!("Check {} via {} passed: {:?}", name, resolver.server(), records);
    } else {
        warn!(
            "Check {} via {} failed: expected {:?} in {:?}",
            name,
            resolver.server(),
            spec.expected,
            records
        );
    }

    Evaluation {
        outcome,
        status: format!("{}-{}", name, outcome),
        records,
    }
}

async fn lookup(
    kind: RecordKind,
    domain: &str,
    resolver: &dyn DnsLookup,
) -> Result<Vec<String>, LookupError> {
    match kind {
        RecordKind::A => resolver.lookup_a(domain).await,
        RecordKind::Cname => resolver.lookup_cname(domain).await,
        RecordKind::Ns => resolver.lookup_ns(domain).await,
        RecordKind::Txt => resolver.lookup_txt(domain).await,
        RecordKind::Mx => resolver.lookup_mx(domain).await,
    }
}
