//! Cluster membership types & the peer membership API client.

pub mod probe;
#[cfg(test)]
mod probe_test;
pub mod reconcile;
pub mod registrar;
#[cfg(test)]
mod mod_test;

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::roster::Instance;

/// The address at which a cluster member exposes its inter-member protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerUrl {
    pub scheme: String,
    pub address: IpAddr,
    pub port: u16,
}

impl PeerUrl {
    /// Derive the peer URL of a roster instance from the configured scheme & server port.
    pub fn from_instance(instance: &Instance, scheme: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_string(),
            address: instance.private_address,
            port,
        }
    }

    /// Parse a peer URL from its string form.
    pub fn parse(raw: &str) -> Result<Self> {
        let uri: http::Uri = raw.parse().with_context(|| format!("error parsing peer URL '{}'", raw))?;
        let scheme = uri.scheme_str().unwrap_or("http").to_string();
        let host = uri.host().with_context(|| format!("peer URL '{}' has no host", raw))?;
        let address = host
            .trim_matches(|c| c == '[' || c == ']')
            .parse()
            .with_context(|| format!("peer URL host '{}' is not an IP address", host))?;
        let port = uri.port_u16().with_context(|| format!("peer URL '{}' has no port", raw))?;
        Ok(Self { scheme, address, port })
    }
}

impl fmt::Display for PeerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.address, self.port)
    }
}

/// A cluster member as reported by a live peer.
///
/// The member id is opaque and assigned by the storage engine; the name is
/// expected to equal a compute instance identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterMember {
    pub id: String,
    pub name: String,
    pub peer_urls: Vec<PeerUrl>,
}

impl ClusterMember {
    /// The addresses at which this member reports its peer protocol.
    pub fn addresses(&self) -> impl Iterator<Item = &IpAddr> {
        self.peer_urls.iter().map(|url| &url.address)
    }
}

/// The bootstrap classification: founding a new cluster vs joining an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// Founding a new cluster.
    New,
    /// Joining an already-running cluster.
    Existing,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Existing => write!(f, "existing"),
        }
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(val: &str) -> Result<Self> {
        match val {
            "new" => Ok(Self::New),
            "existing" => Ok(Self::Existing),
            _ => bail!("unknown cluster bootstrap state '{}', expected new | existing", val),
        }
    }
}

/// The membership API exposed by every live cluster member.
#[async_trait]
pub trait PeerApi {
    /// Fetch the peer's view of current cluster members.
    async fn list_members(&self, peer: &PeerUrl) -> Result<Vec<ClusterMember>>;

    /// Issue an add-member request, returning the raw response status.
    async fn add_member(&self, peer: &PeerUrl, name: &str, peer_url: &PeerUrl) -> Result<StatusCode>;

    /// Issue a remove-member request, returning the raw response status.
    async fn remove_member(&self, peer: &PeerUrl, member_id: &str) -> Result<StatusCode>;
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    members: Vec<MemberRecord>,
}

#[derive(Debug, Deserialize)]
struct MemberRecord {
    id: String,
    name: String,
    #[serde(default)]
    peer_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AddMemberRequest<'a> {
    name: &'a str,
    peer_urls: Vec<String>,
}

/// `PeerApi` implementation speaking HTTP/JSON to cluster members.
pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    /// Construct a new instance using the configured per-call timeout.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .context("error building peer API HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PeerApi for HttpPeerClient {
    async fn list_members(&self, peer: &PeerUrl) -> Result<Vec<ClusterMember>> {
        let url = format!("{}/v1/members", peer);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("error querying members endpoint at {}", url))?;
        anyhow::ensure!(res.status().is_success(), "members endpoint at {} returned status {}", url, res.status());
        let body: MembersResponse = res.json().await.context("error decoding members listing")?;
        let members = body
            .members
            .into_iter()
            .map(|rec| {
                let peer_urls = rec
                    .peer_urls
                    .iter()
                    .filter_map(|raw| match PeerUrl::parse(raw) {
                        Ok(url) => Some(url),
                        Err(err) => {
                            tracing::warn!(error = ?err, member = %rec.id, "skipping unparseable reported peer URL");
                            None
                        }
                    })
                    .collect();
                ClusterMember { id: rec.id, name: rec.name, peer_urls }
            })
            .collect();
        Ok(members)
    }

    async fn add_member(&self, peer: &PeerUrl, name: &str, peer_url: &PeerUrl) -> Result<StatusCode> {
        let url = format!("{}/v1/members", peer);
        let req = AddMemberRequest { name, peer_urls: vec![peer_url.to_string()] };
        let res = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("error issuing add-member request to {}", url))?;
        Ok(res.status())
    }

    async fn remove_member(&self, peer: &PeerUrl, member_id: &str) -> Result<StatusCode> {
        let url = format!("{}/v1/members/{}", peer, member_id);
        let res = self
            .http
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("error issuing remove-member request to {}", url))?;
        Ok(res.status())
    }
}
