// src/config/models.rs
use crate::check::CheckSpec;
use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Primary DNS server IP. Empty means the system resolver.
    pub dns_server: String,
    #[serde(deserialize_with = "empty_as_none")]
    pub secondary_dns_server: Option<String>,
    #[serde(with = "humantime_serde")]
    pub default_interval: Duration,
    pub log_dir: PathBuf,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub bind_address: IpAddr,
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            dns_server: String::new(),
            secondary_dns_server: None,
            default_interval: Duration::from_secs(5 * 60),
            log_dir: PathBuf::from("logs"),
            port: 8080,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub domain: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub expected: String,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        validate_server("dns_server", &self.global.dns_server)?;
        if let Some(secondary) = &self.global.secondary_dns_server {
            validate_server("secondary_dns_server", secondary)?;
        }

        if self.global.default_interval.is_zero() {
            bail!("default_interval must be greater than zero");
        }
        if self.global.lookup_timeout.is_zero() {
            bail!("lookup_timeout must be greater than zero");
        }

        for check in &self.checks {
            let name = format!("{}-{}", check.domain, check.record_type);
            if check.domain.trim().is_empty() {
                bail!("check with record type {} has an empty domain", check.record_type);
            }
            if !is_file_safe(&check.domain) || !is_file_safe(&check.record_type) {
                bail!("check {} contains characters not allowed in a log file name", name);
            }
            if matches!(check.interval, Some(interval) if interval.is_zero()) {
                bail!("check {} has a zero interval", name);
            }
        }

        if self.metrics.enabled && self.metrics.port == self.global.port {
            bail!(
                "metrics port {} collides with the status page port",
                self.metrics.port
            );
        }

        Ok(())
    }

    /// Address the status page listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.global.bind_address, self.global.port)
    }

    pub fn check_specs(&self) -> Vec<CheckSpec> {
        self.checks
            .iter()
            .map(|check| CheckSpec {
                domain: check.domain.clone(),
                record_type: check.record_type.clone(),
                expected: check.expected.clone(),
                interval: check.interval.unwrap_or(self.global.default_interval),
            })
            .collect()
    }
}

fn validate_server(field: &str, server: &str) -> Result<()> {
    if !server.is_empty() && server.parse::<IpAddr>().is_err() {
        bail!("{} must be an IP address, got {:?}", field, server);
    }
    Ok(())
}

fn is_file_safe(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains("..")
        && !value
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

/// Accepts `8080`, `"8080"` and `":8080"`.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .trim_start_matches(':')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {:?}", text))),
    }
}
