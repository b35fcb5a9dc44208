//! The one-time bootstrap marker & storage engine handoff.
//!
//! The marker file is the sole idempotency gate: its presence at startup
//! short-circuits the whole bootstrap, and the previous launch parameters are
//! reproduced from its contents. It is written exactly once, atomically,
//! right before process handoff.

use std::net::IpAddr;

use anyhow::{bail, Context, Result};

use crate::cluster::reconcile::Reconciliation;
use crate::cluster::{PeerUrl, Scenario};
use crate::config::Config;

pub const KEY_STATE: &str = "CLUSTER_BOOTSTRAP_STATE";
pub const KEY_LOCAL_NAME: &str = "LOCAL_NAME";
pub const KEY_INITIAL_CLUSTER: &str = "INITIAL_CLUSTER";

/// The one-time idempotency-guard record written before process handoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterStateMarker {
    pub scenario: Scenario,
    pub local_name: String,
    pub initial_cluster: String,
}

impl ClusterStateMarker {
    /// Build the marker from a reconciliation plan.
    pub fn from_reconciliation(plan: &Reconciliation, local_name: &str) -> Self {
        Self {
            scenario: plan.scenario,
            local_name: local_name.to_string(),
            initial_cluster: initial_cluster_string(&plan.initial_cluster),
        }
    }

    /// Serialize to the marker's key/value line format.
    pub fn serialize(&self) -> String {
        format!(
            "{}={}\n{}={}\n{}={}\n",
            KEY_STATE, self.scenario, KEY_LOCAL_NAME, self.local_name, KEY_INITIAL_CLUSTER, self.initial_cluster,
        )
    }

    /// Parse marker file contents.
    ///
    /// Unknown lines are ignored; a marker missing any required key is
    /// corrupt, which is fatal rather than guessed at.
    pub fn parse(raw: &str) -> Result<Self> {
        let (mut scenario, mut local_name, mut initial_cluster) = (None, None, None);
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // Only the first '=' splits key from value: the initial cluster
            // value itself contains '=' separators.
            let (key, val) = match line.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            match key {
                KEY_STATE => scenario = Some(val.parse::<Scenario>()?),
                KEY_LOCAL_NAME => local_name = Some(val.to_string()),
                KEY_INITIAL_CLUSTER => initial_cluster = Some(val.to_string()),
                _ => continue,
            }
        }
        match (scenario, local_name, initial_cluster) {
            (Some(scenario), Some(local_name), Some(initial_cluster)) => Ok(Self { scenario, local_name, initial_cluster }),
            _ => bail!("bootstrap marker is missing one or more required keys"),
        }
    }
}

/// Render the comma-joined `name=peer_url` initial cluster string.
pub fn initial_cluster_string(pairs: &[(String, PeerUrl)]) -> String {
    pairs
        .iter()
        .map(|(name, url)| format!("{}={}", name, url))
        .collect::<Vec<_>>()
        .join(",")
}

/// Load the marker written by a previous run, if any.
pub async fn load_marker(path: &str) -> Result<Option<ClusterStateMarker>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => ClusterStateMarker::parse(&raw)
            .map(Some)
            .with_context(|| format!("error parsing existing bootstrap marker at {}", path)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("error reading bootstrap marker at {}", path)),
    }
}

/// Write the marker atomically: write a temp file, then rename into place.
pub async fn write_marker(path: &str, marker: &ClusterStateMarker) -> Result<()> {
    let tmp = format!("{}.tmp", path);
    tokio::fs::write(&tmp, marker.serialize())
        .await
        .with_context(|| format!("error writing bootstrap marker temp file at {}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("error moving bootstrap marker into place at {}", path))?;
    tracing::info!(path, "bootstrap marker written");
    Ok(())
}

/// Fully derived argv for the storage engine process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchParams {
    pub bin: String,
    pub args: Vec<String>,
}

impl LaunchParams {
    /// Derive engine launch parameters from the marker & the local private address.
    pub fn derive(marker: &ClusterStateMarker, local_addr: IpAddr, config: &Config) -> Self {
        let scheme = &config.scheme;
        let args = vec![
            "--name".into(),
            marker.local_name.clone(),
            "--data-dir".into(),
            config.data_dir.clone(),
            "--listen-peer-urls".into(),
            format!("{}://0.0.0.0:{}", scheme, config.server_port),
            "--listen-client-urls".into(),
            format!("{}://0.0.0.0:{}", scheme, config.client_port),
            "--initial-advertise-peer-urls".into(),
            format!("{}://{}:{}", scheme, local_addr, config.server_port),
            "--advertise-client-urls".into(),
            format!("{}://{}:{}", scheme, local_addr, config.client_port),
            "--initial-cluster".into(),
            marker.initial_cluster.clone(),
            "--initial-cluster-state".into(),
            marker.scenario.to_string(),
        ];
        Self { bin: config.engine_bin.clone(), args }
    }
}

/// Replace this process with the storage engine. Only returns on exec failure.
pub fn exec_engine(params: &LaunchParams) -> Result<()> {
    use std::os::unix::process::CommandExt;
    tracing::info!(bin = %params.bin, args = ?params.args, "handing off to storage engine");
    let err = std::process::Command::new(&params.bin).args(&params.args).exec();
    Err(anyhow::Error::from(err)).with_context(|| format!("error executing storage engine at {}", params.bin))
}
