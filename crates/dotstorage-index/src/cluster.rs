/*!
# IPFS Cluster Client

Minimal client for the IPFS Cluster REST API covering the peer listing and the
per-CID pin status. Requests authenticate with a pre-encoded basic auth token.
*/

use crate::{IndexError, IndexResult};
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// IPFS daemon details of a cluster peer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpfsPeer {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub addresses: Vec<String>,
}

/// A cluster peer as reported by `/peers`
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterPeer {
    pub id: String,

    #[serde(default)]
    pub peername: String,

    #[serde(default)]
    pub ipfs: IpfsPeer,

    /// Non-empty when the peer could not be contacted
    #[serde(default)]
    pub error: String,
}

impl ClusterPeer {
    /// Peer name, falling back to the peer ID
    pub fn display_name(&self) -> &str {
        if self.peername.is_empty() {
            &self.id
        } else {
            &self.peername
        }
    }

    /// First IPFS swarm address
    pub fn first_address(&self) -> Option<&str> {
        self.ipfs.addresses.first().map(String::as_str)
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Pin state of a CID on one cluster peer
#[derive(Debug, Clone, Deserialize)]
pub struct PeerPinInfo {
    #[serde(default)]
    pub peername: String,

    pub status: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub error: String,
}

/// Pin status of a CID across the cluster
#[derive(Debug, Clone, Deserialize)]
pub struct PinStatus {
    #[serde(default)]
    pub name: String,

    /// Per-peer status keyed by peer ID
    pub peer_map: BTreeMap<String, PeerPinInfo>,
}

/// Client for the IPFS Cluster REST API
pub struct ClusterClient {
    base: Url,
    http: Client,
    auth_token: String,
}

impl ClusterClient {
    /// Create a client for the API at `base_url`
    pub fn new(base_url: &str, auth_token: impl Into<String>) -> IndexResult<Self> {
        Ok(Self {
            base: Url::parse(base_url)?,
            http: Client::new(),
            auth_token: auth_token.into(),
        })
    }

    async fn get_text(&self, path: &str) -> IndexResult<String> {
        let url = self.base.join(path)?;
        debug!("Cluster request {}", url);

        let res = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, format!("Basic {}", self.auth_token))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(IndexError::Status {
                url,
                status: res.status(),
            });
        }
        Ok(res.text().await?)
    }

    /// List the peers in the cluster
    pub async fn peer_list(&self) -> IndexResult<Vec<ClusterPeer>> {
        let body = self.get_text("peers").await?;
        parse_peers(&body)
    }

    /// Pin status of `cid` on every peer
    pub async fn status(&self, cid: &str) -> IndexResult<PinStatus> {
        let body = self.get_text(&format!("pins/{}", cid)).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Peers arrive either as a JSON array or, from newer clusters, as one JSON
/// object per line.
fn parse_peers(body: &str) -> IndexResult<Vec<ClusterPeer>> {
    if body.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(body)?);
    }

    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(IndexError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER_A: &str = r#"{"id":"12D3KooWA","peername":"alpha","ipfs":{"id":"QmA","addresses":["/ip4/10.0.0.1/tcp/4001/p2p/QmA"]},"error":""}"#;
    const PEER_B: &str = r#"{"id":"12D3KooWB","peername":"","ipfs":{"id":"","addresses":[]},"error":"context deadline exceeded"}"#;

    #[test]
    fn test_parse_peer_array() {
        let body = format!("[{},{}]", PEER_A, PEER_B);
        let peers = parse_peers(&body).unwrap();

        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].display_name(), "alpha");
        assert_eq!(peers[0].first_address(), Some("/ip4/10.0.0.1/tcp/4001/p2p/QmA"));
        assert!(!peers[0].has_error());
        assert_eq!(peers[1].display_name(), "12D3KooWB");
        assert!(peers[1].has_error());
        assert_eq!(peers[1].first_address(), None);
    }

    #[test]
    fn test_parse_peer_stream() {
        let body = format!("{}\n\n{}\n", PEER_A, PEER_B);
        let peers = parse_peers(&body).unwrap();

        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1].id, "12D3KooWB");
    }

    #[test]
    fn test_parse_pin_status() {
        let body = r#"{
            "cid": "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
            "name": "upload",
            "peer_map": {
                "12D3KooWB": { "peername": "beta", "status": "pinning", "timestamp": "2022-03-01T10:00:00Z", "error": "" },
                "12D3KooWA": { "peername": "alpha", "status": "pinned", "timestamp": "2022-03-01T09:00:00.5Z" }
            }
        }"#;
        let status: PinStatus = serde_json::from_str(body).unwrap();

        assert_eq!(status.name, "upload");
        let peers: Vec<_> = status.peer_map.keys().cloned().collect();
        assert_eq!(peers, vec!["12D3KooWA", "12D3KooWB"]);
        assert_eq!(status.peer_map["12D3KooWA"].status, "pinned");
        assert_eq!(
            status.peer_map["12D3KooWB"].timestamp.to_rfc3339(),
            "2022-03-01T10:00:00+00:00"
        );
    }
}
