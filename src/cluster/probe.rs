//! Sequential first-responder peer probing.

use crate::cluster::{ClusterMember, PeerApi, PeerUrl};

/// The membership view reported by the first responding peer.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    /// The peer which answered the probe.
    pub peer: PeerUrl,
    /// That peer's view of current cluster members.
    pub members: Vec<ClusterMember>,
}

/// Probe the candidates in order, returning the first peer which answers with
/// its membership listing.
///
/// `None` is the "no reachable peer" signal: either the candidate list was
/// empty (this instance is alone in its group) or every candidate failed.
/// Neither case is an error; classification of the result belongs to the
/// reconciler. Correctness depends only on at least one live existing member
/// answering truthfully, so first success short-circuits the scan.
pub async fn probe_peers<A: PeerApi>(api: &A, candidates: &[PeerUrl]) -> Option<ProbeResult> {
    if candidates.is_empty() {
        tracing::info!("no candidate peers to probe, this instance is alone in its group");
        return None;
    }
    for peer in candidates {
        match api.list_members(peer).await {
            Ok(members) => {
                tracing::info!(peer = %peer, members = members.len(), "peer responded with membership listing");
                return Some(ProbeResult { peer: peer.clone(), members });
            }
            Err(err) => {
                tracing::debug!(error = ?err, peer = %peer, "candidate peer did not respond, trying next");
            }
        }
    }
    tracing::info!(candidates = candidates.len(), "no candidate peer responded to membership probe");
    None
}
