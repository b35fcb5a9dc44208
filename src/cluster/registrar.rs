//! Idempotent eviction & self-registration against a responding peer.
//!
//! Both operations share one bounded-retry helper: a fixed attempt budget
//! with a fixed inter-attempt delay. Races between concurrently-bootstrapping
//! instances are resolved by the idempotent terminal statuses ("already a
//! member", "already gone") rather than by locking.

use std::time::Duration;

use anyhow::Result;
use futures::Future;
use http::StatusCode;

use crate::cluster::{PeerApi, PeerUrl};
use crate::error::BootError;

/// The outcome of a single remote call, as judged by its response status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// Terminal success, including idempotent "already done" statuses.
    Done,
    /// Any other status; retried until the budget is spent.
    Retry(String),
}

/// The outcome of a retried operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded,
    ExhaustedRetries(String),
}

/// Drive `op` until it reports `Done`, up to `attempts` tries with a fixed
/// delay between them. Network errors count as retryable, with the error text
/// carried as the last observed status.
pub async fn retry_with_budget<F, Fut>(desc: &str, attempts: u32, delay: Duration, mut op: F) -> RetryOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CallOutcome>>,
{
    let mut last_status = String::from("no attempts made");
    for attempt in 1..=attempts {
        match op().await {
            Ok(CallOutcome::Done) => return RetryOutcome::Succeeded,
            Ok(CallOutcome::Retry(status)) => {
                tracing::debug!(op = desc, attempt, status = %status, "call not yet successful, will retry");
                last_status = status;
            }
            Err(err) => {
                tracing::debug!(op = desc, attempt, error = ?err, "call failed, will retry");
                last_status = err.to_string();
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    RetryOutcome::ExhaustedRetries(last_status)
}

/// Evict the given member from the cluster via the responding peer.
///
/// "Deleted" (204) and "already gone" (410) are both terminal successes.
/// Exhausting the budget is fatal: proceeding to registration with a
/// known-bad peer left in the cluster could re-admit a split view.
pub async fn evict<A: PeerApi>(api: &A, peer: &PeerUrl, member_id: &str, attempts: u32, delay: Duration) -> Result<()> {
    tracing::info!(member = member_id, peer = %peer, "evicting stale member");
    let outcome = retry_with_budget("evict member", attempts, delay, || async move {
        let status = api.remove_member(peer, member_id).await?;
        Ok(status_outcome(status, &[StatusCode::NO_CONTENT, StatusCode::GONE]))
    })
    .await;
    match outcome {
        RetryOutcome::Succeeded => {
            tracing::info!(member = member_id, "stale member evicted");
            Ok(())
        }
        RetryOutcome::ExhaustedRetries(last_status) => Err(BootError::EvictionFailed {
            member_id: member_id.to_string(),
            last_status,
        }
        .into()),
    }
}

/// Register this instance as a new cluster member via the responding peer.
///
/// "Created" (201) and "already a member" (409) are both terminal successes.
/// Exhausting the budget is fatal: starting the storage engine without a
/// confirmed seat risks the new process being unreachable to quorum.
pub async fn register<A: PeerApi>(
    api: &A, peer: &PeerUrl, name: &str, self_url: &PeerUrl, attempts: u32, delay: Duration,
) -> Result<()> {
    tracing::info!(name, peer_url = %self_url, peer = %peer, "registering self with the cluster");
    let outcome = retry_with_budget("register member", attempts, delay, || async move {
        let status = api.add_member(peer, name, self_url).await?;
        Ok(status_outcome(status, &[StatusCode::CREATED, StatusCode::CONFLICT]))
    })
    .await;
    match outcome {
        RetryOutcome::Succeeded => {
            tracing::info!(name, "registered with the cluster");
            Ok(())
        }
        RetryOutcome::ExhaustedRetries(last_status) => Err(BootError::RegistrationFailed { last_status }.into()),
    }
}

/// Join an existing cluster through the responding peer: evict every stale
/// member, then register self.
///
/// Evictions run first so the subsequent add does not miscount quorum, and a
/// failed eviction aborts the join before any registration is attempted.
pub async fn join<A: PeerApi>(
    api: &A, peer: &PeerUrl, name: &str, self_url: &PeerUrl, evicted_member_ids: &[String], attempts: u32, delay: Duration,
) -> Result<()> {
    for member_id in evicted_member_ids {
        evict(api, peer, member_id, attempts, delay).await?;
    }
    register(api, peer, name, self_url, attempts, delay).await
}

fn status_outcome(status: StatusCode, terminal: &[StatusCode]) -> CallOutcome {
    if terminal.contains(&status) {
        CallOutcome::Done
    } else {
        CallOutcome::Retry(status.to_string())
    }
}
