// src/dns/lookup.rs
use async_trait::async_trait;

/// Record lookups against one specific DNS server.
///
/// Each method returns the record values rendered as strings, in the order
/// the server returned them.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn lookup_a(&self, name: &str) -> Result<Vec<String>, LookupError>;

    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, LookupError>;

    async fn lookup_ns(&self, name: &str) -> Result<Vec<String>, LookupError>;

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError>;

    async fn lookup_mx(&self, name: &str) -> Result<Vec<String>, LookupError>;

    /// Identifier recorded alongside every result produced by this resolver.
    fn server(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid nameserver address: {0}")]
    InvalidServer(String),

    #[error("{0}")]
    Resolve(#[from] hickory_resolver::error::ResolveError),

    #[error("{0}")]
    Other(String),
}
