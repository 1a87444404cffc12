//! Configuration types for cfddns
//!
//! The config file is a single JSON document holding an ordered list of
//! domain entries:
//!
//! ```json
//! {
//!   "domains": [
//!     { "domain": "home.example.com", "cf_token": "...", "zoneid": "...",
//!       "proxied": false, "ttl": 1 }
//!   ]
//! }
//! ```
//!
//! Entries are only ever appended. Duplicates are rejected at add time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;

use crate::atomic;
use crate::error::{Error, Result};

/// Environment variable consulted when an entry has no API token
pub const ENV_API_TOKEN: &str = "CF_API_TOKEN";

/// Environment variable consulted when an entry has no zone ID
pub const ENV_ZONE_ID: &str = "CF_ZONE_ID";

/// Cloudflare's "automatic" TTL
pub const TTL_AUTO: u32 = 1;

/// The config file holds API tokens
const CONFIG_FILE_MODE: u32 = 0o600;

/// The whole config document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Domain entries, in file order
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

impl ConfigFile {
    /// Load the config document from `path`
    ///
    /// A missing file is reported as [`Error::ConfigMissing`] so the caller
    /// can tell it apart from a malformed one.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigMissing(path.display().to_string()));
            }
            Err(e) => {
                return Err(Error::config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(
            "Loaded {} domain(s) from {}",
            config.domains.len(),
            path.display()
        );
        Ok(config)
    }

    /// Write the document to `path` atomically
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            atomic::ensure_dir(parent).await?;
        }

        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        atomic::write_atomic(path, json.as_bytes(), CONFIG_FILE_MODE).await
    }

    /// Append `entry` to the config file at `path`
    ///
    /// Starts a fresh document when the file does not exist yet. A domain
    /// that is already present is rejected and the file is left untouched.
    pub async fn add_domain<P: AsRef<Path>>(path: P, entry: DomainConfig) -> Result<Self> {
        let path = path.as_ref();

        let mut config = match Self::load(path).await {
            Ok(config) => config,
            Err(Error::ConfigMissing(_)) => {
                tracing::info!("Creating new config file {}", path.display());
                Self::default()
            }
            Err(e) => return Err(e),
        };

        config.push(entry)?;
        config.save(path).await?;
        Ok(config)
    }

    /// Append an entry in memory, rejecting duplicates and invalid entries
    pub fn push(&mut self, entry: DomainConfig) -> Result<()> {
        if self.contains(&entry.domain) {
            return Err(Error::DuplicateDomain(entry.domain));
        }
        entry.validate()?;
        tracing::info!("Adding domain {}", entry.domain);
        self.domains.push(entry);
        Ok(())
    }

    /// Whether `domain` already has an entry (case-insensitive)
    pub fn contains(&self, domain: &str) -> bool {
        self.domains
            .iter()
            .any(|d| d.domain.eq_ignore_ascii_case(domain))
    }

    /// Narrow the run to the entry for `domain`
    pub fn select(&self, domain: &str) -> Result<Vec<DomainConfig>> {
        self.domains
            .iter()
            .find(|d| d.domain.eq_ignore_ascii_case(domain))
            .cloned()
            .map(|d| vec![d])
            .ok_or_else(|| Error::not_found(format!("Domain {} is not configured", domain)))
    }
}

/// One managed domain
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Fully qualified record name (e.g. "home.example.com")
    pub domain: String,

    /// Cloudflare API token; falls back to `CF_API_TOKEN`
    #[serde(rename = "cf_token", default)]
    pub api_token: String,

    /// Cloudflare zone ID; falls back to `CF_ZONE_ID`
    #[serde(rename = "zoneid", default)]
    pub zone_id: String,

    /// Whether traffic goes through Cloudflare's edge
    #[serde(default)]
    pub proxied: bool,

    /// Record TTL in seconds, 1 meaning automatic
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

// Keeps the API token out of logs and panics
impl fmt::Debug for DomainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainConfig")
            .field("domain", &self.domain)
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("proxied", &self.proxied)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl DomainConfig {
    /// Create an entry with automatic TTL, not proxied, and no credentials
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            api_token: String::new(),
            zone_id: String::new(),
            proxied: false,
            ttl: TTL_AUTO,
        }
    }

    /// Set the API token
    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = api_token.into();
        self
    }

    /// Set the zone ID
    pub fn with_zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = zone_id.into();
        self
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Validate the entry
    ///
    /// Credentials are not checked here, they may come from the
    /// environment at run time.
    pub fn validate(&self) -> Result<()> {
        validate_domain_name(&self.domain)?;

        if self.ttl != TTL_AUTO && !(60..=86400).contains(&self.ttl) {
            return Err(Error::config(format!(
                "TTL for {} must be 1 (automatic) or between 60 and 86400 seconds. Got: {}",
                self.domain, self.ttl
            )));
        }

        Ok(())
    }

    /// Fill missing credentials from the process environment
    pub fn resolve_credentials_from_env(&self) -> Result<Self> {
        self.resolve_credentials(|key| std::env::var(key).ok())
    }

    /// Fill missing credentials using `lookup` for environment values
    ///
    /// Values present in the entry always win. Credentials that are still
    /// empty afterwards are a configuration error.
    pub fn resolve_credentials<F>(&self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved = self.clone();

        if resolved.api_token.trim().is_empty() {
            resolved.api_token = lookup(ENV_API_TOKEN).unwrap_or_default();
        }
        if resolved.zone_id.trim().is_empty() {
            resolved.zone_id = lookup(ENV_ZONE_ID).unwrap_or_default();
        }

        if resolved.api_token.trim().is_empty() {
            return Err(Error::config(format!(
                "No API token for {}. Set cf_token in the config file or export {}",
                self.domain, ENV_API_TOKEN
            )));
        }
        if resolved.zone_id.trim().is_empty() {
            return Err(Error::config(format!(
                "No zone ID for {}. Set zoneid in the config file or export {}",
                self.domain, ENV_ZONE_ID
            )));
        }

        Ok(resolved)
    }
}

fn default_ttl() -> u32 {
    TTL_AUTO
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, label characters.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for (index, label) in domain.split('.').enumerate() {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Wildcard records are allowed as the leftmost label
        if index == 0 && label == "*" {
            continue;
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name used by the Cloudflare API and in cache file names
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Whether `ip` belongs to this record type's address family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            RecordType::A => ip.is_ipv4(),
            RecordType::Aaaa => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" | "4" | "IPV4" => Ok(RecordType::A),
            "AAAA" | "6" | "IPV6" => Ok(RecordType::Aaaa),
            _ => Err(Error::invalid_input(format!(
                "Unknown record type '{}'. Supported: A, AAAA",
                s
            ))),
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts per API phase (lookup, update); at least 1
    pub max_attempts: usize,

    /// Delay between attempts (in seconds)
    pub retry_delay_secs: u64,

    /// Log intended updates instead of sending them; never writes the cache
    pub dry_run: bool,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("Retry attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            dry_run: false,
        }
    }
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_config_document() {
        let json = r#"{
            "domains": [
                {"domain": "home.example.com", "cf_token": "tok", "zoneid": "zone",
                 "proxied": true, "ttl": 120},
                {"domain": "vpn.example.com"}
            ]
        }"#;

        let config: ConfigFile = serde_json::from_str(json).unwrap();
        assert_eq!(config.domains.len(), 2);
        assert_eq!(config.domains[0].api_token, "tok");
        assert_eq!(config.domains[0].zone_id, "zone");
        assert!(config.domains[0].proxied);
        assert_eq!(config.domains[0].ttl, 120);

        // Missing optional fields take defaults
        assert_eq!(config.domains[1].ttl, TTL_AUTO);
        assert!(!config.domains[1].proxied);
        assert!(config.domains[1].api_token.is_empty());
    }

    #[test]
    fn test_serialize_uses_file_keys() {
        let entry = DomainConfig::new("home.example.com")
            .with_api_token("tok")
            .with_zone_id("zone");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["cf_token"], "tok");
        assert_eq!(json["zoneid"], "zone");
        assert!(json.get("api_token").is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let entry = DomainConfig::new("home.example.com").with_api_token("secret_token_12345");
        let debug_str = format!("{:?}", entry);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("home.example.com"));
    }

    #[test]
    fn test_validate_ttl() {
        assert!(DomainConfig::new("example.com").validate().is_ok());
        assert!(DomainConfig::new("example.com").with_ttl(300).validate().is_ok());
        assert!(DomainConfig::new("example.com").with_ttl(30).validate().is_err());
        assert!(DomainConfig::new("example.com").with_ttl(90000).validate().is_err());
    }

    #[test]
    fn test_validate_domain_name() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("*.example.com").is_ok());
        assert!(validate_domain_name("my-host.example.com").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("bad..example.com").is_err());
        assert!(validate_domain_name("-bad.example.com").is_err());
        assert!(validate_domain_name("bad_label.example.com").is_err());
        assert!(validate_domain_name(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_wildcard_only_as_leftmost_label() {
        assert!(validate_domain_name("*.home.example.com").is_ok());
        assert!(validate_domain_name("a.*.example.com").is_err());
        assert!(validate_domain_name("example.*").is_err());
        assert!(validate_domain_name("*.*.example.com").is_err());
    }

    #[test]
    fn test_credentials_fall_back_to_env() {
        let vars = env(&[(ENV_API_TOKEN, "env-token"), (ENV_ZONE_ID, "env-zone")]);
        let entry = DomainConfig::new("example.com");

        let resolved = entry.resolve_credentials(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(resolved.api_token, "env-token");
        assert_eq!(resolved.zone_id, "env-zone");
    }

    #[test]
    fn test_config_credentials_win_over_env() {
        let vars = env(&[(ENV_API_TOKEN, "env-token"), (ENV_ZONE_ID, "env-zone")]);
        let entry = DomainConfig::new("example.com")
            .with_api_token("file-token")
            .with_zone_id("file-zone");

        let resolved = entry.resolve_credentials(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(resolved.api_token, "file-token");
        assert_eq!(resolved.zone_id, "file-zone");
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let entry = DomainConfig::new("example.com").with_zone_id("zone");
        let err = entry.resolve_credentials(|_| None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(ENV_API_TOKEN));
    }

    #[test]
    fn test_record_type_parsing() {
        assert_eq!("a".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!("AAAA".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert_eq!("ipv6".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert!("MX".parse::<RecordType>().is_err());
        assert_eq!(RecordType::Aaaa.to_string(), "AAAA");
    }

    #[test]
    fn test_record_type_family() {
        let v4: IpAddr = "203.0.113.7".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(RecordType::A.matches(&v4));
        assert!(!RecordType::A.matches(&v6));
        assert!(RecordType::Aaaa.matches(&v6));
    }

    #[test]
    fn test_select_domain() {
        let config = ConfigFile {
            domains: vec![
                DomainConfig::new("a.example.com"),
                DomainConfig::new("b.example.com"),
            ],
        };
        let selected = config.select("B.example.com").unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].domain, "b.example.com");
        assert!(config.select("c.example.com").is_err());
    }

    #[test]
    fn test_engine_config_requires_an_attempt() {
        let config = EngineConfig {
            max_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = ConfigFile::load(dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, Error::ConfigMissing(_)));
    }

    #[tokio::test]
    async fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").await.unwrap();

        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_add_domain_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        ConfigFile::add_domain(&path, DomainConfig::new("home.example.com"))
            .await
            .unwrap();

        let loaded = ConfigFile::load(&path).await.unwrap();
        assert_eq!(loaded.domains.len(), 1);
        assert_eq!(loaded.domains[0].domain, "home.example.com");
    }

    #[tokio::test]
    async fn test_add_domain_keeps_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        for name in ["c.example.com", "a.example.com", "b.example.com"] {
            ConfigFile::add_domain(&path, DomainConfig::new(name)).await.unwrap();
        }

        let loaded = ConfigFile::load(&path).await.unwrap();
        let names: Vec<_> = loaded.domains.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(names, ["c.example.com", "a.example.com", "b.example.com"]);
    }

    #[tokio::test]
    async fn test_add_invalid_entry_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let err = ConfigFile::add_domain(&path, DomainConfig::new("bad..name"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!path.exists());
    }
}
