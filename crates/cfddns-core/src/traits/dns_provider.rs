// # DNS Provider Trait
//
// Defines the two-phase interface for updating a DNS record via a provider
// API: find the record ID, then submit the new content.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{DnsProvider, RecordType, RecordUpdate};
//
// let provider = /* DnsProvider implementation */;
// let id = provider.find_record_id("home.example.com", RecordType::A).await?;
// provider.update_record(&id, &update).await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::{DomainConfig, RecordType};

/// Desired state of a record, sent in the update phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// The DNS record name
    pub name: String,
    /// A or AAAA
    pub record_type: RecordType,
    /// New record content
    pub content: IpAddr,
    /// Time-to-live, 1 meaning automatic
    pub ttl: u32,
    /// Whether traffic is proxied through the provider's edge
    pub proxied: bool,
}

impl RecordUpdate {
    /// Build the update for `domain` pointing at `content`
    pub fn for_domain(domain: &DomainConfig, record_type: RecordType, content: IpAddr) -> Self {
        Self {
            name: domain.domain.clone(),
            record_type,
            content,
            ttl: domain.ttl,
            proxied: domain.proxied,
        }
    }
}

/// Trait for DNS provider implementations
///
/// Providers are single-shot: each method performs one API request and
/// reports success or failure. Retry and the decision whether an update is
/// needed at all belong to the `UpdateEngine`.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the provider's ID for an existing record
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The record ID
    /// - `Err(Error::NotFound)`: No record with that name and type exists
    /// - `Err(Error)`: The request failed
    async fn find_record_id(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<String, crate::Error>;

    /// Replace the content of the record identified by `record_id`
    async fn update_record(
        &self,
        record_id: &str,
        update: &RecordUpdate,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from a domain entry
///
/// Each domain entry carries its own credentials, so the engine asks the
/// factory for a provider per entry.
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider for `domain`
    fn create(&self, domain: &DomainConfig) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
