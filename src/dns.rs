//! DNS record publisher.
//!
//! Publishes the roster's private addresses under a configured record so that
//! clients (and the health monitor) can discover the cluster by name. This is
//! a best-effort side channel: failure aborts only the DNS update, never the
//! bootstrap itself.

use std::net::IpAddr;

use anyhow::{ensure, Context, Result};
use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Serialize)]
struct UpsertRecordRequest<'a> {
    addresses: &'a [IpAddr],
}

/// Typed client for the DNS API used to publish roster addresses.
pub struct DnsClient {
    http: reqwest::Client,
    endpoint: String,
    record: String,
}

impl DnsClient {
    /// Build a client when DNS publishing is configured, `None` otherwise.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let (endpoint, record) = match (&config.dns_api_endpoint, &config.dns_record) {
            (Some(endpoint), Some(record)) => (endpoint.clone(), record.clone()),
            _ => {
                tracing::debug!("DNS publishing is not configured, skipping");
                return Ok(None);
            }
        };
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .context("error building DNS API HTTP client")?;
        Ok(Some(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            record,
        }))
    }

    /// Upsert the configured record with the given addresses.
    pub async fn upsert(&self, addresses: &[IpAddr]) -> Result<()> {
        let url = format!("{}/v1/records/{}", self.endpoint, self.record);
        let res = self
            .http
            .put(&url)
            .json(&UpsertRecordRequest { addresses })
            .send()
            .await
            .with_context(|| format!("error issuing DNS upsert to {}", url))?;
        ensure!(res.status().is_success(), "DNS API returned status {} for record {}", res.status(), self.record);
        tracing::info!(record = %self.record, addresses = addresses.len(), "published roster addresses to DNS");
        Ok(())
    }
}
