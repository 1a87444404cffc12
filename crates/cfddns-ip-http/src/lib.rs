// # HTTP IP Source
//
// Observes the public IP address by asking an IP echo service, one URL per
// address family. The service answers a plain GET with the caller's address
// as a bare text body (e.g. icanhazip.com).
//
// ## Behavior
//
// - One request per `current()` call, no caching and no polling
// - 10 second timeout
// - Non-2xx status, unparsable body or wrong-family address is an error

use async_trait::async_trait;
use cfddns_core::traits::{IpSource, IpVersion};
use cfddns_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default IPv4 echo service
pub const DEFAULT_IPV4_URL: &str = "https://ipv4.icanhazip.com";

/// Default IPv6 echo service
pub const DEFAULT_IPV6_URL: &str = "https://ipv6.icanhazip.com";

/// Default HTTP timeout for echo requests (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL answering with the IPv4 address
    ipv4_url: String,

    /// URL answering with the IPv6 address
    ipv6_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source using the default icanhazip endpoints
    pub fn new() -> Result<Self> {
        Self::with_urls(DEFAULT_IPV4_URL, DEFAULT_IPV6_URL)
    }

    /// Create a source with custom per-family URLs
    pub fn with_urls(ipv4_url: impl Into<String>, ipv6_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        })
    }

    fn url_for(&self, version: IpVersion) -> &str {
        match version {
            IpVersion::V4 => &self.ipv4_url,
            IpVersion::V6 => &self.ipv6_url,
        }
    }
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self, version: IpVersion) -> Result<IpAddr> {
        let url = self.url_for(version);
        tracing::debug!("Fetching current {} address from {}", version, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "{} answered with HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("failed to read response from {}: {}", url, e)))?;

        parse_echo(&body, version)
    }

    fn source_name(&self) -> &str {
        "http"
    }
}

/// Parse an echo body into an address of the requested family
fn parse_echo(body: &str, version: IpVersion) -> Result<IpAddr> {
    let text = body.trim();

    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::ip_source(format!("invalid IP address in response: {:?}", text)))?;

    if !version.matches(&ip) {
        return Err(Error::ip_source(format!("expected {}, got {}", version, ip)));
    }

    Ok(ip)
}
