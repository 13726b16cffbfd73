// src/dns/resolver.rs
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, info};

use super::lookup::{DnsLookup, LookupError};

/// Server identifier recorded for lookups made through the host's resolver configuration.
pub const SYSTEM_SERVER: &str = "system";

const DNS_PORT: u16 = 53;
const LOOKUP_ATTEMPTS: usize = 2;
const MAX_CNAME_HOPS: usize = 16;

/// `DnsLookup` backed by hickory's tokio resolver.
///
/// A resolver built for a specific server only ever talks to that server over
/// UDP port 53. There is no fallback to the system configuration and no
/// answer cache: every lookup is a fresh query, so an unreachable server
/// shows up as a lookup error on the very next check.
#[derive(Clone)]
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
    server: String,
}

impl HickoryResolver {
    /// Builds a resolver for `server`, or for the system configuration when `server` is empty.
    pub fn new(server: &str, timeout: Duration) -> Result<Self, LookupError> {
        let server = server.trim();
        if server.is_empty() {
            return Self::system(timeout);
        }

        let ip: IpAddr = server
            .parse()
            .map_err(|_| LookupError::InvalidServer(server.to_string()))?;

        Ok(Self::pinned(SocketAddr::new(ip, DNS_PORT), server, timeout))
    }

    /// Builds a resolver that sends every query to `addr` over UDP, recording
    /// results under `server`.
    pub fn pinned(addr: SocketAddr, server: &str, timeout: Duration) -> Self {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));

        info!("DNS resolver configured: {} (udp)", addr);

        let mut opts = Self::options(ResolverOpts::default(), timeout);
        opts.use_hosts_file = false;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            server: server.to_string(),
        }
    }

    /// Builds a resolver from the host's resolver configuration.
    pub fn system(timeout: Duration) -> Result<Self, LookupError> {
        let (config, opts) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| LookupError::Other(format!("failed to read system resolver config: {}", e)))?;

        info!("DNS resolver configured: system defaults");

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, Self::options(opts, timeout)),
            server: SYSTEM_SERVER.to_string(),
        })
    }

    fn options(mut opts: ResolverOpts, timeout: Duration) -> ResolverOpts {
        opts.timeout = timeout;
        opts.attempts = LOOKUP_ATTEMPTS;
        opts.cache_size = 0;
        opts.preserve_intermediates = true;
        opts
    }
}

#[async_trait]
impl DnsLookup for HickoryResolver {
    async fn lookup_a(&self, name: &str) -> Result<Vec<String>, LookupError> {
        debug!(server = %self.server, name, "A lookup");
        let response = self.resolver.ipv4_lookup(name).await?;
        Ok(response.iter().map(|addr| addr.to_string()).collect())
    }

    /// Resolves the canonical name: the end of the alias chain, or the
    /// queried name itself when it is not an alias.
    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
        debug!(server = %self.server, name, "CNAME lookup");
        let response = self.resolver.lookup(name, RecordType::A).await?;

        let aliases: HashMap<String, String> = response
            .record_iter()
            .filter_map(|record| {
                let target = record.data()?.as_cname()?;
                Some((name_key(&record.name().to_string()), target.0.to_string()))
            })
            .collect();

        let mut canonical = format!("{}.", name.trim_end_matches('.'));
        for _ in 0..MAX_CNAME_HOPS {
            match aliases.get(&name_key(&canonical)) {
                Some(target) => canonical = target.clone(),
                None => break,
            }
        }

        Ok(vec![canonical])
    }

    async fn lookup_ns(&self, name: &str) -> Result<Vec<String>, LookupError> {
        debug!(server = %self.server, name, "NS lookup");
        let response = self.resolver.ns_lookup(name).await?;
        Ok(response.iter().map(|ns| ns.0.to_string()).collect())
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError> {
        debug!(server = %self.server, name, "TXT lookup");
        let response = self.resolver.txt_lookup(name).await?;
        Ok(response
            .iter()
            .map(|txt| {
                txt.iter()
                    .map(|data| String::from_utf8_lossy(data).to_string())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .collect())
    }

    async fn lookup_mx(&self, name: &str) -> Result<Vec<String>, LookupError> {
        debug!(server = %self.server, name, "MX lookup");
        let response = self.resolver.mx_lookup(name).await?;
        Ok(response
            .iter()
            .map(|mx| mx.exchange().to_string())
            .collect())
    }

    fn server(&self) -> &str {
        &self.server
    }
}

fn name_key(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}
