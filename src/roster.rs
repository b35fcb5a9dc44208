//! Compute group roster & instance metadata clients.
//!
//! The roster is the authoritative set of live instances belonging to this
//! instance's compute group, and is the single source of ground truth for
//! valid cluster membership. It is fetched once per bootstrap as a snapshot.

use std::net::IpAddr;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::config::Config;
use crate::error::BootError;

/// A live compute instance belonging to the group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    /// The instance's unique identifier, stable for the instance lifetime.
    pub id: String,
    /// The instance's private network address.
    pub private_address: IpAddr,
}

/// A point-in-time snapshot of the group's live instances.
#[derive(Clone, Debug, Default)]
pub struct Roster(Vec<Instance>);

impl Roster {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self(instances)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if the given instance identifier appears in this roster.
    pub fn contains_id(&self, id: &str) -> bool {
        self.0.iter().any(|instance| instance.id == id)
    }

    /// Check if the given address belongs to a live instance of this roster.
    pub fn contains_address(&self, addr: &IpAddr) -> bool {
        self.0.iter().any(|instance| &instance.private_address == addr)
    }

    /// All instances other than the local one, preserving roster order.
    pub fn peers_of(&self, local: &Instance) -> Vec<Instance> {
        self.0.iter().filter(|instance| instance.id != local.id).cloned().collect()
    }

    /// The private addresses of all roster instances, preserving roster order.
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.0.iter().map(|instance| instance.private_address).collect()
    }
}

#[derive(Debug, Deserialize)]
struct InstancesResponse {
    instances: Vec<InstanceRecord>,
}

#[derive(Debug, Deserialize)]
struct InstanceRecord {
    instance_id: String,
    private_address: IpAddr,
}

/// Typed client for the instance metadata service.
pub struct MetadataClient {
    http: reqwest::Client,
    endpoint: String,
}

impl MetadataClient {
    /// Construct a new instance.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .context("error building metadata service HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.metadata_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch this instance's identity from the metadata service.
    pub async fn identity(&self) -> Result<Instance> {
        let id = self.get_text("instance-id").await?;
        let raw_addr = self.get_text("local-ipv4").await?;
        let private_address = raw_addr
            .trim()
            .parse()
            .with_context(|| format!("error parsing local-ipv4 '{}' from metadata service", raw_addr.trim()))?;
        Ok(Instance { id: id.trim().to_string(), private_address })
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.endpoint, path);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("error querying metadata service at {}", url))?;
        ensure!(res.status().is_success(), "metadata service returned status {} for {}", res.status(), url);
        res.text().await.context("error reading metadata service response body")
    }
}

/// Typed client for the compute group API, which owns the live-instance roster.
pub struct RosterClient {
    http: reqwest::Client,
    endpoint: String,
    region: String,
    access_key: String,
    secret_key: String,
}

impl RosterClient {
    /// Construct a new instance, verifying the region & credentials preconditions.
    pub fn new(config: &Config) -> Result<Self> {
        let region = config.region.clone().ok_or(BootError::MissingRegion)?;
        let (access_key, secret_key) = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => (access.clone(), secret.clone()),
            _ => return Err(BootError::MissingCredentials.into()),
        };
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .context("error building compute group API HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.group_api_endpoint.trim_end_matches('/').to_string(),
            region,
            access_key,
            secret_key,
        })
    }

    /// Fetch the current roster of live instances for this instance's group.
    ///
    /// An empty roster is fatal: an instance must always see itself in its own group.
    pub async fn fetch(&self) -> Result<Roster> {
        let url = format!("{}/v1/groups/self/instances", self.endpoint);
        let res = self
            .http
            .get(&url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .header("x-region", &self.region)
            .send()
            .await
            .with_context(|| format!("error querying compute group API at {}", url))?;
        ensure!(res.status().is_success(), "compute group API returned status {}", res.status());
        let body: InstancesResponse = res.json().await.context("error decoding compute group API response")?;
        let roster = Roster::new(
            body.instances
                .into_iter()
                .map(|rec| Instance { id: rec.instance_id, private_address: rec.private_address })
                .collect(),
        );
        if roster.is_empty() {
            return Err(BootError::EmptyRoster.into());
        }
        tracing::debug!(instances = roster.len(), "fetched compute group roster");
        Ok(roster)
    }
}
