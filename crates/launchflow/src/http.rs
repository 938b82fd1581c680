//! HTTP collaborators: smoke test probe and public nameserver lookup

use async_trait::async_trait;
use launchflow_cloud::{GatewayError, GatewayResult, HttpProbe, ProbeResult, PublicResolver};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("launchflow/", env!("CARGO_PKG_VERSION"));

/// DNS-over-HTTPS JSON endpoint
pub const DOH_ENDPOINT: &str = "https://dns.google/resolve";

/// NS record type
const TYPE_NS: u16 = 2;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Plain GET probe
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new() -> Self {
        Self { client: client() }
    }
}

impl Default for ReqwestProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str, timeout: Duration) -> ProbeResult {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => ProbeResult::Status(response.status().as_u16()),
            Err(e) => {
                tracing::debug!(url, error = %e, "probe failed");
                ProbeResult::Unreachable(e.to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// NS values from a DoH JSON answer, normalized to lowercase without the
/// trailing dot
fn nameservers_from(body: &str) -> GatewayResult<Vec<String>> {
    let response: DohResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::other("ResolveNameservers", e.to_string()))?;
    if response.status != 0 {
        return Err(GatewayError::other(
            "ResolveNameservers",
            format!("resolver returned status {}", response.status),
        ));
    }
    let mut servers: Vec<String> = response
        .answer
        .into_iter()
        .filter(|a| a.record_type == TYPE_NS)
        .map(|a| a.data.trim_end_matches('.').to_ascii_lowercase())
        .collect();
    servers.sort();
    servers.dedup();
    Ok(servers)
}

/// Resolves public delegation through DNS-over-HTTPS
pub struct DohResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl DohResolver {
    pub fn new() -> Self {
        Self {
            client: client(),
            endpoint: DOH_ENDPOINT.to_string(),
        }
    }
}

impl Default for DohResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PublicResolver for DohResolver {
    async fn nameservers(&self, domain: &str) -> GatewayResult<Vec<String>> {
        let name = domain.trim_end_matches('.');
        tracing::debug!(domain = name, "resolving public nameservers");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "NS")])
            .header("accept", "application/dns-json")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GatewayError::other("ResolveNameservers", e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::other(
                "ResolveNameservers",
                format!("HTTP {}", response.status()),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::other("ResolveNameservers", e.to_string()))?;
        nameservers_from(&body)
    }
}
