//
// src/dns/mod.rs
//
mod lookup;
mod resolver;

pub use lookup::{DnsLookup, LookupError};
pub use resolver::{HickoryResolver, SYSTEM_SERVER};
