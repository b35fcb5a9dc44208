//! Shared test fixtures.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use http::StatusCode;

use crate::cluster::{ClusterMember, PeerApi, PeerUrl};
use crate::roster::{Instance, Roster};

pub fn instance(id: &str, addr: &str) -> Instance {
    Instance {
        id: id.to_string(),
        private_address: addr.parse().unwrap(),
    }
}

pub fn roster(entries: &[(&str, &str)]) -> Roster {
    Roster::new(entries.iter().map(|(id, addr)| instance(id, addr)).collect())
}

pub fn peer_url(addr: &str, port: u16) -> PeerUrl {
    PeerUrl {
        scheme: "http".into(),
        address: addr.parse().unwrap(),
        port,
    }
}

pub fn member(id: &str, name: &str, addrs: &[&str]) -> ClusterMember {
    ClusterMember {
        id: id.to_string(),
        name: name.to_string(),
        peer_urls: addrs.iter().map(|addr| peer_url(addr, 2380)).collect(),
    }
}

/// A scripted reply for one call against the fake peer API.
pub enum ScriptedReply {
    Members(Vec<ClusterMember>),
    Status(StatusCode),
    NetworkError,
}

/// A record of one call made against the fake peer API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    ListMembers { peer: String },
    AddMember { peer: String, name: String, peer_url: String },
    RemoveMember { peer: String, member_id: String },
}

/// A fake peer API driven by a FIFO script of replies, recording every call made.
#[derive(Default)]
pub struct ScriptedPeerApi {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedPeerApi {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_made(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self) -> ScriptedReply {
        self.replies.lock().unwrap().pop_front().expect("fake peer API script exhausted")
    }
}

#[async_trait]
impl PeerApi for ScriptedPeerApi {
    async fn list_members(&self, peer: &PeerUrl) -> Result<Vec<ClusterMember>> {
        self.calls.lock().unwrap().push(RecordedCall::ListMembers { peer: peer.to_string() });
        match self.next() {
            ScriptedReply::Members(members) => Ok(members),
            ScriptedReply::Status(status) => Err(anyhow!("unexpected status {}", status)),
            ScriptedReply::NetworkError => Err(anyhow!("connection refused")),
        }
    }

    async fn add_member(&self, peer: &PeerUrl, name: &str, peer_url: &PeerUrl) -> Result<StatusCode> {
        self.calls.lock().unwrap().push(RecordedCall::AddMember {
            peer: peer.to_string(),
            name: name.to_string(),
            peer_url: peer_url.to_string(),
        });
        match self.next() {
            ScriptedReply::Status(status) => Ok(status),
            ScriptedReply::NetworkError => Err(anyhow!("connection refused")),
            ScriptedReply::Members(_) => Err(anyhow!("unexpected scripted reply for add_member")),
        }
    }

    async fn remove_member(&self, peer: &PeerUrl, member_id: &str) -> Result<StatusCode> {
        self.calls.lock().unwrap().push(RecordedCall::RemoveMember {
            peer: peer.to_string(),
            member_id: member_id.to_string(),
        });
        match self.next() {
            ScriptedReply::Status(status) => Ok(status),
            ScriptedReply::NetworkError => Err(anyhow!("connection refused")),
            ScriptedReply::Members(_) => Err(anyhow!("unexpected scripted reply for remove_member")),
        }
    }
}
