use super::probe::probe_peers;
use crate::fixtures::{self, RecordedCall, ScriptedPeerApi, ScriptedReply};

#[tokio::test]
async fn probe_returns_first_responding_peer_and_stops() {
    let api = ScriptedPeerApi::new(vec![
        ScriptedReply::NetworkError,
        ScriptedReply::Members(vec![fixtures::member("m1", "i-02", &["10.0.0.2"])]),
    ]);
    let candidates = vec![fixtures::peer_url("10.0.0.2", 2380), fixtures::peer_url("10.0.0.3", 2380), fixtures::peer_url("10.0.0.4", 2380)];

    let res = probe_peers(&api, &candidates).await;

    let res = res.expect("expected a responding peer");
    assert_eq!(res.peer, candidates[1], "expected the second candidate to be the responder");
    assert_eq!(res.members.len(), 1);
    assert_eq!(
        api.recorded(),
        vec![
            RecordedCall::ListMembers { peer: "http://10.0.0.2:2380".into() },
            RecordedCall::ListMembers { peer: "http://10.0.0.3:2380".into() },
        ],
        "expected probing to stop at the first success",
    );
}

#[tokio::test]
async fn probe_with_no_candidates_is_alone_signal() {
    let api = ScriptedPeerApi::new(vec![]);
    let res = probe_peers(&api, &[]).await;
    assert!(res.is_none(), "expected no probe result for an empty candidate list");
    assert_eq!(api.calls_made(), 0, "expected no calls for an empty candidate list");
}

#[tokio::test]
async fn probe_with_all_failures_returns_none() {
    let api = ScriptedPeerApi::new(vec![ScriptedReply::NetworkError, ScriptedReply::NetworkError]);
    let candidates = vec![fixtures::peer_url("10.0.0.2", 2380), fixtures::peer_url("10.0.0.3", 2380)];
    let res = probe_peers(&api, &candidates).await;
    assert!(res.is_none(), "expected no probe result when every candidate fails");
    assert_eq!(api.calls_made(), 2, "expected every candidate to be tried once");
}
