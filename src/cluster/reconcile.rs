//! Membership reconciliation.
//!
//! This is the core of the bootstrap sequence: given the local instance, the
//! authoritative roster and the probed view of an existing cluster (if any),
//! classify the bootstrap scenario, compute the stale members to evict and
//! produce the initial cluster descriptor. The function is pure; all network
//! effects happen before (probing) or after (registrar) this step.

use anyhow::Result;

use crate::cluster::probe::ProbeResult;
use crate::cluster::{PeerUrl, Scenario};
use crate::error::BootError;
use crate::roster::{Instance, Roster};

/// The reconciled bootstrap plan for this instance.
#[derive(Clone, Debug)]
pub struct Reconciliation {
    /// The bootstrap classification.
    pub scenario: Scenario,
    /// Ordered `(name, peer URL)` pairs forming the initial cluster.
    pub initial_cluster: Vec<(String, PeerUrl)>,
    /// IDs of reported members with no live instance in the roster.
    pub evicted_member_ids: Vec<String>,
    /// The peer URL this instance will advertise.
    pub self_peer_url: PeerUrl,
    /// The peer whose membership view was used, when joining.
    pub responding_peer: Option<PeerUrl>,
}

/// Reconcile cluster membership against the authoritative roster.
///
/// Decision rule:
/// - no peer responded: scenario `new`, initial cluster built from the roster alone;
/// - a peer responded and the local identifier is absent from the reported
///   names: scenario `existing`, reported members carried in order with self
///   appended last, stale members marked for eviction;
/// - a peer responded and the local identifier is already listed: scenario
///   `new` (the member list is being bootstrapped for the first time and the
///   node is re-observing itself).
pub fn reconcile(
    local: &Instance, roster: &Roster, probe: Option<&ProbeResult>, scheme: &str, server_port: u16,
) -> Result<Reconciliation> {
    if roster.is_empty() {
        return Err(BootError::EmptyRoster.into());
    }
    if !roster.contains_id(&local.id) {
        return Err(BootError::SelfNotInRoster(local.id.clone()).into());
    }
    let self_peer_url = PeerUrl::from_instance(local, scheme, server_port);

    let probe = match probe {
        Some(probe) => probe,
        None => {
            tracing::info!(instance = %local.id, "no reachable peer, founding a new cluster from the roster");
            return Ok(new_cluster(roster, scheme, server_port, self_peer_url));
        }
    };

    if probe.members.iter().any(|member| member.name == local.id) {
        // This may equally indicate a previous partial run, so it gets a
        // distinct warning for operator review.
        tracing::warn!(
            instance = %local.id,
            peer = %probe.peer,
            "local instance already listed by responding peer, treating as fresh cluster bootstrap",
        );
        return Ok(new_cluster(roster, scheme, server_port, self_peer_url));
    }

    // Joining an existing cluster: carry the reported membership in order,
    // drop stale members, then append self last.
    let mut initial_cluster = Vec::with_capacity(probe.members.len() + 1);
    let mut evicted_member_ids = Vec::new();
    for member in &probe.members {
        let stale = !member.addresses().any(|addr| roster.contains_address(addr));
        if stale {
            tracing::info!(member = %member.id, name = %member.name, "member has no live instance in the roster, marking for eviction");
            evicted_member_ids.push(member.id.clone());
            continue;
        }
        if let Some(url) = member.peer_urls.first() {
            initial_cluster.push((member.name.clone(), url.clone()));
        }
    }
    initial_cluster.push((local.id.clone(), self_peer_url.clone()));

    Ok(Reconciliation {
        scenario: Scenario::Existing,
        initial_cluster,
        evicted_member_ids,
        self_peer_url,
        responding_peer: Some(probe.peer.clone()),
    })
}

/// Build a new-cluster plan directly from the roster, independent of any other service.
fn new_cluster(roster: &Roster, scheme: &str, server_port: u16, self_peer_url: PeerUrl) -> Reconciliation {
    let initial_cluster = roster
        .instances()
        .iter()
        .map(|instance| (instance.id.clone(), PeerUrl::from_instance(instance, scheme, server_port)))
        .collect();
    Reconciliation {
        scenario: Scenario::New,
        initial_cluster,
        evicted_member_ids: Vec::new(),
        self_peer_url,
        responding_peer: None,
    }
}
