//! Update engine
//!
//! The UpdateEngine is responsible for:
//! - Observing the current public IP via IpSource
//! - Comparing it with the cached IP (idempotency)
//! - Updating DNS records via DnsProvider, with bounded retry per phase
//! - Persisting the new IP after a successful update
//!
//! ## Flow for one (domain, record type) pair
//!
//! ```text
//!   IpSource::current ──► StateStore::get_last_ip ──► equal? ──► Unchanged
//!                                                        │
//!                                                        ▼ differs
//!                              DnsProvider::find_record_id   (phase 1, retried)
//!                                                        │
//!                                                        ▼
//!                              DnsProvider::update_record    (phase 2, retried)
//!                                                        │
//!                                                        ▼
//!                              StateStore::set_last_ip ──► Updated
//! ```
//!
//! A failure anywhere after the comparison leaves the cache untouched, so
//! the next run sees the same difference and tries again.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{DomainConfig, EngineConfig, RecordType};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, IpSource, IpVersion, RecordUpdate, StateStore};

/// Result of syncing one (domain, record type) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Observed IP equals the cached one; no API call was made
    Unchanged {
        /// The current IP address
        ip: IpAddr,
    },
    /// Record was updated and the cache now holds `new`
    Updated {
        /// Cached IP before the update, if any
        previous: Option<IpAddr>,
        /// The new IP address
        new: IpAddr,
    },
    /// Dry run: the update was logged, nothing was written
    DryRun {
        /// Cached IP, if any
        previous: Option<IpAddr>,
        /// The IP that would have been applied
        new: IpAddr,
    },
}

/// Totals for one run over all configured pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Pairs whose IP had not changed
    pub unchanged: usize,
    /// Pairs that were updated (or would have been, in a dry run)
    pub updated: usize,
    /// Pairs skipped because the current IP could not be observed
    pub skipped: usize,
    /// Pairs whose update failed after all retries
    pub failed: usize,
}

impl RunReport {
    /// Whether no update failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of pairs processed
    pub fn total(&self) -> usize {
        self.unchanged + self.updated + self.skipped + self.failed
    }

    fn record(&mut self, outcome: &UpdateOutcome) {
        match outcome {
            UpdateOutcome::Unchanged { .. } => self.unchanged += 1,
            UpdateOutcome::Updated { .. } | UpdateOutcome::DryRun { .. } => self.updated += 1,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} unchanged, {} skipped, {} failed",
            self.updated, self.unchanged, self.skipped, self.failed
        )
    }
}

/// The two API phases of an update, each retried on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Lookup,
    Update,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lookup => f.write_str("record lookup"),
            Phase::Update => f.write_str("record update"),
        }
    }
}

/// Update engine
///
/// Processes every configured pair sequentially. The engine owns all
/// decisions: whether an update is needed, how often to retry, and when the
/// cache may be written. Providers and IP sources only execute requests.
pub struct UpdateEngine {
    /// IP source for observing the public address
    ip_source: Box<dyn IpSource>,

    /// Builds a provider from each domain entry's credentials
    providers: Box<dyn DnsProviderFactory>,

    /// Cache of last applied IPs
    state_store: Box<dyn StateStore>,

    /// Retry and dry-run settings
    config: EngineConfig,
}

impl UpdateEngine {
    /// Create a new update engine
    pub fn new(
        ip_source: Box<dyn IpSource>,
        providers: Box<dyn DnsProviderFactory>,
        state_store: Box<dyn StateStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            ip_source,
            providers,
            state_store,
            config,
        })
    }

    /// Sync every domain for every record type
    ///
    /// Failures are logged and counted; processing always continues with the
    /// next pair. The observed IP for a family is fetched at most once per
    /// successful lookup and reused for the remaining domains.
    pub async fn run(&self, domains: &[DomainConfig], record_types: &[RecordType]) -> RunReport {
        let mut report = RunReport::default();
        let mut observed: HashMap<IpVersion, IpAddr> = HashMap::new();

        info!(
            "Checking {} domain(s) for {} record type(s){}",
            domains.len(),
            record_types.len(),
            if self.config.dry_run { " [DRY-RUN]" } else { "" }
        );

        for domain in domains {
            for &record_type in record_types {
                let version = IpVersion::from(record_type);

                let ip = match observed.get(&version) {
                    Some(ip) => *ip,
                    None => match self.observe(version).await {
                        Ok(ip) => {
                            observed.insert(version, ip);
                            ip
                        }
                        Err(e) => {
                            warn!(
                                "Skipping {} ({}): could not determine current {} address: {}",
                                domain.domain, record_type, version, e
                            );
                            report.skipped += 1;
                            continue;
                        }
                    },
                };

                match self.apply(domain, record_type, ip).await {
                    Ok(outcome) => report.record(&outcome),
                    Err(e) => {
                        error!(
                            "Failed to update {} ({}) to {}: {}",
                            domain.domain, record_type, ip, e
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        info!("Run finished: {}", report);
        report
    }

    /// Sync a single (domain, record type) pair
    ///
    /// Fetches the current IP, compares it with the cache and updates the
    /// record when they differ.
    pub async fn sync_record(
        &self,
        domain: &DomainConfig,
        record_type: RecordType,
    ) -> Result<UpdateOutcome> {
        let ip = self.observe(IpVersion::from(record_type)).await?;
        self.apply(domain, record_type, ip).await
    }

    /// Observe the current IP and check its family
    async fn observe(&self, version: IpVersion) -> Result<IpAddr> {
        let ip = self.ip_source.current(version).await?;

        if !version.matches(&ip) {
            return Err(Error::ip_source(format!(
                "{} returned {} for an {} lookup",
                self.ip_source.source_name(),
                ip,
                version
            )));
        }

        debug!("Current {} address: {}", version, ip);
        Ok(ip)
    }

    /// Decide and, if needed, perform the update for an observed IP
    async fn apply(
        &self,
        domain: &DomainConfig,
        record_type: RecordType,
        ip: IpAddr,
    ) -> Result<UpdateOutcome> {
        let record_name = domain.domain.as_str();
        let cached = self.state_store.get_last_ip(record_name, record_type).await?;

        if cached == Some(ip) {
            debug!("{} ({}) already at {}, nothing to do", record_name, record_type, ip);
            return Ok(UpdateOutcome::Unchanged { ip });
        }

        info!(
            "{} ({}) changed: {} -> {}",
            record_name,
            record_type,
            cached.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string()),
            ip
        );

        let provider = self.providers.create(domain)?;

        // Phase 1: without a record ID there is nothing to update
        let record_id = self
            .with_retry(provider.as_ref(), Phase::Lookup, record_name, || {
                provider.find_record_id(record_name, record_type)
            })
            .await?;

        let update = RecordUpdate::for_domain(domain, record_type, ip);

        if self.config.dry_run {
            info!(
                "[DRY-RUN] Would update record {} ({} {}): content={} ttl={} proxied={}",
                record_id, record_name, record_type, update.content, update.ttl, update.proxied
            );
            return Ok(UpdateOutcome::DryRun {
                previous: cached,
                new: ip,
            });
        }

        // Phase 2: on failure the cache keeps the old value
        self.with_retry(provider.as_ref(), Phase::Update, record_name, || {
            provider.update_record(&record_id, &update)
        })
        .await?;

        self.state_store.set_last_ip(record_name, record_type, ip).await?;
        info!("Updated {} ({}) -> {}", record_name, record_type, ip);

        Ok(UpdateOutcome::Updated {
            previous: cached,
            new: ip,
        })
    }

    /// Run `op` up to `max_attempts` times with a fixed delay in between
    async fn with_retry<T, F, Fut>(
        &self,
        provider: &dyn DnsProvider,
        phase: Phase,
        record_name: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let delay = Duration::from_secs(self.config.retry_delay_secs);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} for {} succeeded on attempt {}", phase, record_name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed for {}: {}",
                        phase, attempt, max_attempts, record_name, e
                    );
                    last_error = Some(e);

                    // Wait before retry (unless this was the last attempt)
                    if attempt < max_attempts && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        Err(Error::provider(
            provider.provider_name(),
            format!("{} failed after {} attempt(s): {}", phase, max_attempts, cause),
        ))
    }
}
