//! Public IP resolution.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default lookup service, answering `{"ip": "<dotted quad>"}`.
pub const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

/// Something that can tell us our current public IPv4 address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpResolver: Send + Sync {
    async fn resolve(&self) -> Result<Ipv4Addr>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: String,
}

/// Resolver backed by a JSON "what is my IP" endpoint.
pub struct HttpIpResolver {
    client: reqwest::Client,
    url: String,
}

impl HttpIpResolver {
    /// Create a resolver for the default lookup service.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_LOOKUP_URL.to_string())
    }

    /// Create a resolver for a custom lookup URL.
    pub fn with_url(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpIpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(DdnsError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body = response.text().await?;
        let lookup: LookupResponse = serde_json::from_str(&body).map_err(|e| {
            DdnsError::Network(format!("Malformed response from {}: {}", self.url, e))
        })?;

        let ip = lookup
            .ip
            .trim()
            .parse()
            .map_err(|_| DdnsError::Network(format!("Invalid IPv4 address: {}", lookup.ip)))?;

        tracing::debug!("Resolved public IP {} via {}", ip, self.url);
        Ok(ip)
    }
}
