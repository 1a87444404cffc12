//! Core traits for cfddns
//!
//! This module defines the seams between the update engine and its
//! collaborators.
//!
//! - [`IpSource`]: Observe the current public IP
//! - [`DnsProvider`]: Look up and update DNS records via a provider API
//! - [`StateStore`]: Remember the last applied IP per record

pub mod ip_source;
pub mod dns_provider;
pub mod state_store;

pub use ip_source::{IpSource, IpVersion};
pub use dns_provider::{DnsProvider, DnsProviderFactory, RecordUpdate};
pub use state_store::StateStore;
