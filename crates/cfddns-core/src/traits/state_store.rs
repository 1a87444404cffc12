// # State Store Trait
//
// Defines the interface for the IP cache.
//
// ## Purpose
//
// The state store remembers the last IP that was successfully applied for
// each (record name, record type) pair. An equal observation means the run
// has nothing to do for that pair. The store is only written after a
// successful update, so a failed attempt leaves the old value behind and the
// next run retries the same transition.
//
// ## Implementations
//
// - `FileStateStore`: one plain-text file per pair
// - `MemoryStateStore`: in-memory, for tests

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::RecordType;

/// Trait for state store implementations
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the last applied IP for a record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(IpAddr))`: The last applied IP
    /// - `Ok(None)`: Nothing cached (first run, or unreadable cache)
    /// - `Err(Error)`: Storage error
    async fn get_last_ip(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Option<IpAddr>, crate::Error>;

    /// Record `ip` as the last applied IP for a record
    async fn set_last_ip(
        &self,
        record_name: &str,
        record_type: RecordType,
        ip: IpAddr,
    ) -> Result<(), crate::Error>;
}
