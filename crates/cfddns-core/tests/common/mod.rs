//! Test doubles and common utilities for engine contract tests
//!
//! The doubles count every call so tests can assert exactly which network
//! operations a run performed.

#![allow(dead_code)]

use cfddns_core::config::{DomainConfig, EngineConfig, RecordType};
use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{DnsProvider, DnsProviderFactory, IpSource, IpVersion, RecordUpdate};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IpSource returning fixed answers per family
#[derive(Clone)]
pub struct FixedIpSource {
    v4: Option<IpAddr>,
    v6: Option<IpAddr>,
    calls: Arc<AtomicUsize>,
}

impl FixedIpSource {
    /// Source that knows only an IPv4 address
    pub fn v4(ip: &str) -> Self {
        Self {
            v4: Some(ip.parse().unwrap()),
            v6: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source that knows both families
    pub fn dual(v4: &str, v6: &str) -> Self {
        Self {
            v4: Some(v4.parse().unwrap()),
            v6: Some(v6.parse().unwrap()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source that can never determine an address
    pub fn unreachable() -> Self {
        Self {
            v4: None,
            v6: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source that answers an IPv4 lookup with an IPv6 address
    pub fn wrong_family() -> Self {
        Self {
            v4: Some("2001:db8::1".parse().unwrap()),
            v6: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times current() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for FixedIpSource {
    async fn current(&self, version: IpVersion) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = match version {
            IpVersion::V4 => self.v4,
            IpVersion::V6 => self.v6,
        };
        answer.ok_or_else(|| Error::ip_source(format!("no {} connectivity", version)))
    }

    fn source_name(&self) -> &str {
        "fixed"
    }
}

/// Shared call log for providers created by [`MockProviderFactory`]
#[derive(Default)]
pub struct ProviderCalls {
    pub created: AtomicUsize,
    pub lookups: AtomicUsize,
    pub updates: AtomicUsize,
    pub sent: Mutex<Vec<RecordUpdate>>,
}

impl ProviderCalls {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Total API calls across both phases
    pub fn api_calls(&self) -> usize {
        self.lookups() + self.updates()
    }

    pub fn sent(&self) -> Vec<RecordUpdate> {
        self.sent.lock().unwrap().clone()
    }
}

/// A factory for mock providers with scripted failures
///
/// `lookup_failures` / `update_failures` make the first N calls of that
/// phase fail; use `usize::MAX` for a phase that never succeeds. Domains
/// registered with [`MockProviderFactory::with_broken_domain`] fail every
/// update regardless of the script.
#[derive(Clone)]
pub struct MockProviderFactory {
    pub calls: Arc<ProviderCalls>,
    lookup_failures: usize,
    update_failures: usize,
    broken_domains: Vec<String>,
}

impl MockProviderFactory {
    pub fn healthy() -> Self {
        Self::failing(0, 0)
    }

    pub fn failing(lookup_failures: usize, update_failures: usize) -> Self {
        Self {
            calls: Arc::new(ProviderCalls::default()),
            lookup_failures,
            update_failures,
            broken_domains: Vec::new(),
        }
    }

    /// Make every update for `domain` fail
    pub fn with_broken_domain(mut self, domain: &str) -> Self {
        self.broken_domains.push(domain.to_string());
        self
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, domain: &DomainConfig) -> Result<Box<dyn DnsProvider>> {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        let update_failures = if self.broken_domains.contains(&domain.domain) {
            usize::MAX
        } else {
            self.update_failures
        };
        Ok(Box::new(MockDnsProvider {
            calls: Arc::clone(&self.calls),
            lookup_failures: self.lookup_failures,
            update_failures,
        }))
    }
}

/// A mock DnsProvider that tracks calls
pub struct MockDnsProvider {
    calls: Arc<ProviderCalls>,
    lookup_failures: usize,
    update_failures: usize,
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_record_id(&self, record_name: &str, record_type: RecordType) -> Result<String> {
        let n = self.calls.lookups.fetch_add(1, Ordering::SeqCst);
        if n < self.lookup_failures {
            return Err(Error::provider("mock", "lookup unavailable"));
        }
        Ok(format!("{}-{}", record_name, record_type))
    }

    async fn update_record(&self, _record_id: &str, update: &RecordUpdate) -> Result<()> {
        let n = self.calls.updates.fetch_add(1, Ordering::SeqCst);
        if n < self.update_failures {
            return Err(Error::provider("mock", "update unavailable"));
        }
        self.calls.sent.lock().unwrap().push(update.clone());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Engine settings for tests: three attempts, no delay
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        max_attempts: 3,
        retry_delay_secs: 0,
        dry_run: false,
    }
}

/// Minimal domain entry with credentials
pub fn domain(name: &str) -> DomainConfig {
    DomainConfig::new(name)
        .with_api_token("test-token")
        .with_zone_id("test-zone")
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}
