// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of the two-phase `DnsProvider` interface.
//
// ## Behavior
//
// - One HTTP request per trait call; retry and delays belong to `UpdateEngine`
// - HTTP timeout of 30 seconds
// - HTTP status codes mapped to specific errors (401/403, 404, 409, 429, 5xx)
// - The Cloudflare envelope's `success` flag is checked on every response
// - The API token never appears in `Debug` output, logs or error messages
//
// ## API Reference
//
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::traits::{DnsProvider, DnsProviderFactory, RecordUpdate};
use cfddns_core::{DomainConfig, Error, RecordType, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare DNS provider bound to one zone and token
///
/// Stateless and single-shot. The Debug implementation does not expose the
/// API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone holding the records
    zone_id: String,

    /// API base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider against the public Cloudflare API
    ///
    /// Fails on an empty token or zone ID, or if the HTTP client cannot be
    /// built.
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_token, zone_id, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against a different API base URL
    pub fn with_base_url(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token is required"));
        }
        if zone_id.trim().is_empty() {
            return Err(Error::config("Cloudflare zone ID is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    /// Send an authenticated request and unwrap the Cloudflare envelope
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("failed to read {} response: {}", action, e)))?;

        if !status.is_success() {
            return Err(status_error(status, action, &error_detail(&body)));
        }

        let envelope: CloudflareResponse<T> = serde_json::from_str(&body).map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("invalid {} response: {}", action, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} rejected: {}", action, render_errors(&envelope.errors)),
            ));
        }

        Ok(envelope.result)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn find_record_id(&self, record_name: &str, record_type: RecordType) -> Result<String> {
        tracing::debug!("Looking up record ID: {} (type: {})", record_name, record_type);

        let request = self
            .client
            .get(self.records_url())
            .query(&[("type", record_type.as_str()), ("name", record_name)]);

        let records: Vec<DnsRecord> = self
            .execute(request, "record lookup")
            .await?
            .unwrap_or_default();

        let record = records.into_iter().next().ok_or_else(|| {
            Error::not_found(format!(
                "DNS record not found: {} (type: {})",
                record_name, record_type
            ))
        })?;

        tracing::debug!("Found record ID: {}", record.id);
        Ok(record.id)
    }

    async fn update_record(&self, record_id: &str, update: &RecordUpdate) -> Result<()> {
        let payload = UpdateRecordRequest {
            record_type: update.record_type.as_str(),
            name: &update.name,
            content: update.content.to_string(),
            ttl: update.ttl,
            proxied: update.proxied,
        };

        let request = self
            .client
            .put(format!("{}/{}", self.records_url(), record_id))
            .json(&payload);

        self.execute::<serde_json::Value>(request, "record update")
            .await?;

        tracing::debug!(
            "Cloudflare accepted update of {} ({}) -> {}",
            update.name,
            update.record_type,
            update.content
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory building one provider per domain entry
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    base_url: String,
}

impl CloudflareFactory {
    /// Factory for the public Cloudflare API
    pub fn new() -> Self {
        Self::with_base_url(CLOUDFLARE_API_BASE)
    }

    /// Factory whose providers talk to `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for CloudflareFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, domain: &DomainConfig) -> Result<Box<dyn DnsProvider>> {
        let provider = CloudflareProvider::with_base_url(
            domain.api_token.clone(),
            domain.zone_id.clone(),
            self.base_url.clone(),
        )?;
        Ok(Box::new(provider))
    }
}

/// Map a non-2xx status to an error
fn status_error(status: StatusCode, action: &str, detail: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: invalid API token or insufficient permissions ({}): {}",
            action, status, detail
        )),
        404 => Error::not_found(format!("{} failed ({}): {}", action, status, detail)),
        409 => Error::provider(
            PROVIDER_NAME,
            format!(
                "Conflict: record is being modified by another request ({}): {}",
                status, detail
            ),
        ),
        429 => Error::rate_limited(format!(
            "{} rate limited by Cloudflare ({}): {}",
            action, status, detail
        )),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("Cloudflare server error (transient) ({}): {}", status, detail),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{} failed ({}): {}", action, status, detail),
        ),
    }
}

/// Best description of a failed response: envelope errors, else raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| render_errors(&envelope.errors))
        .filter(|rendered| !rendered.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Render envelope errors as `code: message`, comma separated
fn render_errors(errors: &[CloudflareError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<CloudflareError>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
}

#[derive(Debug, Serialize)]
struct UpdateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let factory = CloudflareFactory::new();
        let domain = DomainConfig::new("home.example.com")
            .with_api_token("test_token")
            .with_zone_id("test_zone");

        let provider = factory.create(&domain);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().provider_name(), "cloudflare");
    }

    #[test]
    fn test_factory_missing_token() {
        let factory = CloudflareFactory::new();
        let domain = DomainConfig::new("home.example.com").with_zone_id("test_zone");

        let result = factory.create(&domain);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_zone_id() {
        let result = CloudflareProvider::new("token", "  ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider =
            CloudflareProvider::with_base_url("token", "zone", "http://localhost:1234/").unwrap();
        assert_eq!(
            provider.records_url(),
            "http://localhost:1234/zones/zone/dns_records"
        );
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = CloudflareProvider::new("secret_token_12345", "zone").unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareProvider"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "record lookup", ""),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "record lookup", ""),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "record update", ""),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "record update", ""),
            Error::RateLimited(_)
        ));

        let conflict = status_error(StatusCode::CONFLICT, "record update", "busy");
        assert!(conflict.to_string().contains("Conflict"));

        let transient = status_error(StatusCode::BAD_GATEWAY, "record update", "upstream");
        assert!(transient.to_string().contains("transient"));
        assert!(transient.to_string().contains("upstream"));
    }

    #[test]
    fn test_error_detail_prefers_envelope() {
        let body = r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}],"result":null}"#;
        assert_eq!(error_detail(body), "9109: Invalid access token");

        assert_eq!(error_detail("  bad gateway \n"), "bad gateway");
        assert_eq!(error_detail(r#"{"success":false,"errors":[]}"#), r#"{"success":false,"errors":[]}"#);
    }

    #[test]
    fn test_update_payload_shape() {
        let payload = UpdateRecordRequest {
            record_type: "AAAA",
            name: "home.example.com",
            content: "2001:db8::1".to_string(),
            ttl: 1,
            proxied: true,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "AAAA",
                "name": "home.example.com",
                "content": "2001:db8::1",
                "ttl": 1,
                "proxied": true
            })
        );
    }
}
