//! Bootstrap orchestration.
//!
//! The one-shot bootstrap sequence: marker gate, instance identity, roster
//! fetch, peer probing, membership reconciliation, eviction & registration,
//! marker write, and finally the exec handoff to the storage engine. Every
//! network call is awaited to completion (or its own timeout) before the
//! next step begins; the only concurrent task is the DNS publish.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::bootstrap::{self, ClusterStateMarker, LaunchParams};
use crate::cluster::reconcile::reconcile;
use crate::cluster::{probe, registrar, HttpPeerClient, PeerUrl, Scenario};
use crate::config::Config;
use crate::dns::DnsClient;
use crate::error::BootError;
use crate::roster::{MetadataClient, RosterClient};

/// Run the one-shot bootstrap sequence, ending in an exec of the storage engine.
pub async fn run_bootstrap(config: Arc<Config>) -> Result<()> {
    // Idempotency gate: a marker from a previous run short-circuits the whole
    // bootstrap, and no roster/peer/registrar calls are made.
    if let Some(marker) = bootstrap::load_marker(&config.marker_path).await? {
        tracing::info!(path = %config.marker_path, scenario = %marker.scenario, "bootstrap marker found, launching engine from prior state");
        let local = MetadataClient::new(&config)?
            .identity()
            .await
            .context("error fetching instance identity from metadata service")?;
        let params = LaunchParams::derive(&marker, local.private_address, &config);
        return bootstrap::exec_engine(&params);
    }

    let local = MetadataClient::new(&config)?
        .identity()
        .await
        .context("error fetching instance identity from metadata service")?;
    tracing::info!(instance = %local.id, address = %local.private_address, "resolved local instance identity");

    // Region & credential preconditions are verified during client construction.
    let roster = RosterClient::new(&config)?.fetch().await?;
    if !roster.contains_id(&local.id) {
        return Err(BootError::SelfNotInRoster(local.id.clone()).into());
    }

    // Publish roster addresses to DNS in parallel with the membership work.
    let dns_task = DnsClient::from_config(&config)?.map(|client| {
        let addresses = roster.addresses();
        tokio::spawn(async move { client.upsert(&addresses).await })
    });

    let peer_api = HttpPeerClient::new(&config)?;
    let candidates: Vec<PeerUrl> = roster
        .peers_of(&local)
        .iter()
        .map(|instance| PeerUrl::from_instance(instance, &config.scheme, config.server_port))
        .collect();
    let probe_result = probe::probe_peers(&peer_api, &candidates).await;

    let plan = reconcile(&local, &roster, probe_result.as_ref(), &config.scheme, config.server_port)?;
    tracing::info!(
        scenario = %plan.scenario,
        members = plan.initial_cluster.len(),
        evictions = plan.evicted_member_ids.len(),
        "membership reconciled",
    );

    if plan.scenario == Scenario::Existing {
        let peer = plan
            .responding_peer
            .clone()
            .context("joining an existing cluster requires a responding peer")?;
        registrar::join(
            &peer_api,
            &peer,
            &local.id,
            &plan.self_peer_url,
            &plan.evicted_member_ids,
            config.retry_attempts,
            config.retry_delay(),
        )
        .await?;
    }

    let marker = ClusterStateMarker::from_reconciliation(&plan, &local.id);
    bootstrap::write_marker(&config.marker_path, &marker).await?;

    if let Some(task) = dns_task {
        match task.await {
            Ok(Ok(())) => (),
            Ok(Err(err)) => tracing::error!(error = ?err, "DNS record update failed, bootstrap continues"),
            Err(err) => tracing::error!(error = ?err, "error joining DNS update task"),
        }
    }

    let params = LaunchParams::derive(&marker, local.private_address, &config);
    bootstrap::exec_engine(&params)
}

/// Exec the configured shell. Only returns on exec failure.
pub fn run_shell(config: &Config) -> Result<()> {
    use std::os::unix::process::CommandExt;
    let err = std::process::Command::new(&config.shell_bin).exec();
    Err(anyhow::Error::from(err)).with_context(|| format!("error executing shell at {}", config.shell_bin))
}
