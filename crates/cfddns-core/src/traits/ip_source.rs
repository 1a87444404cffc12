// # IP Source Trait
//
// Defines the interface for observing the current public IP address.
//
// ## Implementations
//
// - HTTP echo service: `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{IpSource, IpVersion};
//
// let source = /* IpSource implementation */;
// let ip = source.current(IpVersion::V4).await?;
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

use crate::config::RecordType;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Whether `ip` belongs to this family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            IpVersion::V4 => ip.is_ipv4(),
            IpVersion::V6 => ip.is_ipv6(),
        }
    }
}

impl From<RecordType> for IpVersion {
    fn from(record_type: RecordType) -> Self {
        match record_type {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for IP source implementations
///
/// An IP source answers one question: what is the public address of this
/// host for a given family right now? It performs a single lookup per call
/// and does not retry or cache; the engine decides what to do with the
/// answer.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IP address for `version`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current address, guaranteed to be of `version`
    /// - `Err(Error)`: If the address could not be determined
    async fn current(&self, version: IpVersion) -> Result<IpAddr, crate::Error>;

    /// Short name for logging (e.g. the echo service host)
    fn source_name(&self) -> &str;
}
