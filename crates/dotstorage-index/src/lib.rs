/*!
# dotstorage Index Clients

Clients for the services that sit next to block storage:

- the indexer advertisement chain published as JSON documents under a base
  URL, walked backwards from its head and cached on disk
- the IPFS Cluster REST API, for peer listings and per-CID pin status
*/

use thiserror::Error;

pub mod advert;
pub mod cache;
pub mod cluster;

pub use advert::{AdvertClient, AdvertEvent, Advertisement, EntryChunk, DEFAULT_ADVERT_ENDPOINT};
pub use cache::JsonCache;
pub use cluster::{ClusterClient, ClusterPeer, PinStatus};

/// Errors raised by the index clients
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to fetch: {url}, status: {status}")]
    Status {
        url: url::Url,
        status: reqwest::StatusCode,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid CID: {0}")]
    InvalidCid(#[from] cid::Error),

    #[error("Invalid advertisement: {0}")]
    InvalidAdvert(String),

    #[error("{0} not advertised")]
    NotAdvertised(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// Result type for index client operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;
