// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, is_yaml(path))?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration text without touching the filesystem.
pub fn parse_config(contents: &str, yaml: bool) -> Result<Config> {
    let config: Config = if yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SAMPLE: &str = r#"
global:
  dns_server: "8.8.8.8"
  secondary_dns_server: "1.1.1.1"
  default_interval: 2m
  log_dir: /var/log/dns-monitor
  port: ":9000"
checks:
  - domain: example.org
    type: A
    expected: 93.184.216.34
  - domain: example.org
    type: MX
    expected: mail
    interval: 30s
"#;

    #[test]
    fn test_yaml_config_with_overrides() {
        let config = parse_config(SAMPLE, true).unwrap();
        config.validate().unwrap();

        assert_eq!(config.global.dns_server, "8.8.8.8");
        assert_eq!(config.global.secondary_dns_server.as_deref(), Some("1.1.1.1"));
        assert_eq!(config.global.port, 9000);
        assert_eq!(config.global.log_dir.to_str(), Some("/var/log/dns-monitor"));

        let specs = config.check_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].interval, Duration::from_secs(120));
        assert_eq!(specs[1].interval, Duration::from_secs(30));
        assert_eq!(specs[1].record_type, "MX");
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse_config("checks: []\n", true).unwrap();
        config.validate().unwrap();

        assert_eq!(config.global.dns_server, "");
        assert!(config.global.secondary_dns_server.is_none());
        assert_eq!(config.global.default_interval, Duration::from_secs(300));
        assert_eq!(config.global.lookup_timeout, Duration::from_secs(5));
        assert_eq!(config.global.log_dir.to_str(), Some("logs"));
        assert_eq!(config.global.port, 8080);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8080");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_numeric_and_plain_string_port() {
        let config = parse_config("global:\n  port: 8081\n", true).unwrap();
        assert_eq!(config.global.port, 8081);

        let config = parse_config("global:\n  port: \"8082\"\n", true).unwrap();
        assert_eq!(config.global.port, 8082);

        assert!(parse_config("global:\n  port: \"http\"\n", true).is_err());
    }

    #[test]
    fn test_empty_secondary_is_none() {
        let config = parse_config("global:\n  secondary_dns_server: \"\"\n", true).unwrap();
        assert!(config.global.secondary_dns_server.is_none());
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"global": {"dns_server": "9.9.9.9", "default_interval": "10s"},
                       "checks": [{"domain": "a.test", "type": "TXT", "expected": "v=spf1"}]}"#;
        let config = parse_config(json, false).unwrap();
        config.validate().unwrap();
        assert_eq!(config.check_specs()[0].interval, Duration::from_secs(10));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_server = parse_config("global:\n  dns_server: dns.google\n", true).unwrap();
        assert!(bad_server.validate().is_err());

        let bad_domain =
            parse_config("checks:\n  - {domain: \"../etc\", type: A, expected: x}\n", true).unwrap();
        assert!(bad_domain.validate().is_err());

        let zero_interval = parse_config(
            "checks:\n  - {domain: a.test, type: A, expected: x, interval: 0s}\n",
            true,
        )
        .unwrap();
        assert!(zero_interval.validate().is_err());

        let clash = parse_config(
            "global:\n  port: 9090\nmetrics:\n  enabled: true\n  port: 9090\n",
            true,
        )
        .unwrap();
        assert!(clash.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_config_missing_file_is_error() {
        let result = load_config("/nonexistent/dns-monitor.yaml").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.checks.len(), 2);
    }
}
