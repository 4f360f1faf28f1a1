use crate::config::ClusterConfig;
use anyhow::Result;
use dotstorage_index::{ClusterClient, ClusterPeer, PinStatus};

fn client() -> Result<ClusterClient> {
    let config = ClusterConfig::from_env()?;
    Ok(ClusterClient::new(&config.api_url, config.basic_auth_token)?)
}

/// Addresses of error-free peers joined by commas
fn peers_csv(peers: &[ClusterPeer]) -> String {
    peers
        .iter()
        .filter(|peer| !peer.has_error())
        .filter_map(ClusterPeer::first_address)
        .collect::<Vec<_>>()
        .join(",")
}

/// One line per peer holding the pin
fn status_lines(status: &PinStatus) -> Vec<String> {
    status
        .peer_map
        .iter()
        .map(|(id, info)| {
            let name = if info.peername.is_empty() { id } else { &info.peername };
            format!(
                "    > {}: {} | {}",
                name,
                info.status.to_uppercase(),
                info.timestamp.to_rfc3339()
            )
        })
        .collect()
}

pub async fn list_ipfs_peers(csv: bool) -> Result<()> {
    let mut peers = client()?.peer_list().await?;
    peers.sort_by(|a, b| a.peername.cmp(&b.peername));

    if csv {
        println!("{}", peers_csv(&peers));
        return Ok(());
    }

    for peer in &peers {
        println!("# {}", peer.display_name());
        if peer.has_error() {
            eprintln!("{}", peer.error);
            continue;
        }
        if let Some(address) = peer.first_address() {
            println!("{}", address);
        }
    }
    Ok(())
}

pub async fn show_cid_status(cid: &str) -> Result<()> {
    let status = client()?.status(cid).await?;
    for line in status_lines(&status) {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(json: &str) -> ClusterPeer {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_peers_csv_skips_failed_peers() {
        let peers = vec![
            peer(r#"{"id":"A","peername":"alpha","ipfs":{"addresses":["/ip4/10.0.0.1/tcp/4001","/ip4/1.2.3.4/tcp/4001"]}}"#),
            peer(r#"{"id":"B","peername":"beta","error":"dial backoff"}"#),
            peer(r#"{"id":"C","peername":"gamma","ipfs":{"addresses":["/ip4/10.0.0.3/tcp/4001"]}}"#),
        ];
        assert_eq!(peers_csv(&peers), "/ip4/10.0.0.1/tcp/4001,/ip4/10.0.0.3/tcp/4001");
    }

    #[test]
    fn test_status_lines() {
        let status: PinStatus = serde_json::from_str(
            r#"{"peer_map":{
                "12D3KooWA":{"peername":"alpha","status":"pinned","timestamp":"2022-03-01T09:00:00Z"},
                "12D3KooWB":{"peername":"","status":"pin_error","timestamp":"2022-03-01T10:30:00Z"}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            status_lines(&status),
            vec![
                "    > alpha: PINNED | 2022-03-01T09:00:00+00:00",
                "    > 12D3KooWB: PIN_ERROR | 2022-03-01T10:30:00+00:00",
            ]
        );
    }
}
