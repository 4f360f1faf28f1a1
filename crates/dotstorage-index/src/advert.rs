/*!
# Advertisement Chain

Indexer advertisements form a backward linked list: the publisher exposes the
latest advertisement at `<endpoint>/head`, and every advertisement links to its
predecessor through `PreviousID` and to a chunk of multihash entries through
`Entries`. Every document lives at `<endpoint>/<cid>`.

Advertisements and entry chunks are read through a `JsonCache`; the head is
always fetched fresh.
*/

use crate::cache::JsonCache;
use crate::{IndexError, IndexResult};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use cid::multihash::Multihash;
use cid::Cid;
use libipld::codec::Codec;
use libipld::json::DagJsonCodec;
use libipld::Ipld;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Where the advertisement chain is published by default
pub const DEFAULT_ADVERT_ENDPOINT: &str = "https://ipfs-advertisement.s3.us-west-2.amazonaws.com";

/// Multicodec code for raw bytes, used when rendering entries as CIDs
const RAW_CODE: u64 = 0x55;

/// A DAG-JSON link, `{ "/": "<cid>" }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    #[serde(rename = "/")]
    pub cid: String,
}

#[derive(Debug, Deserialize)]
struct Head {
    head: Link,
}

/// An indexer advertisement
#[derive(Debug, Clone, Deserialize)]
pub struct Advertisement {
    /// Previous advertisement, absent on the first one
    #[serde(rename = "PreviousID", default)]
    pub previous_id: Option<Link>,

    /// Peer ID of the provider
    #[serde(rename = "Provider", default)]
    pub provider: Option<String>,

    /// Chunk of multihash entries
    #[serde(rename = "Entries")]
    pub entries: Link,

    /// Whether this advertisement removes content
    #[serde(rename = "IsRm", default)]
    pub is_rm: bool,
}

/// A chunk of advertised multihashes
#[derive(Debug, Clone, Deserialize)]
pub struct EntryChunk {
    #[serde(rename = "Entries")]
    pub entries: Vec<Entry>,

    /// Next chunk, when the entries span several
    #[serde(rename = "Next", default)]
    pub next: Option<Link>,
}

/// One multihash entry, `{ "/": { "bytes": "<base64>" } }`
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(rename = "/")]
    value: EntryBytes,
}

#[derive(Debug, Clone, Deserialize)]
struct EntryBytes {
    bytes: String,
}

impl Entry {
    /// The base64 text as published
    pub fn encoded(&self) -> &str {
        &self.value.bytes
    }

    /// Decoded multihash bytes; padded and unpadded base64 are both accepted
    pub fn multihash(&self) -> IndexResult<Vec<u8>> {
        let text = self.value.bytes.as_str();
        STANDARD
            .decode(text)
            .or_else(|_| STANDARD_NO_PAD.decode(text))
            .map_err(|e| IndexError::InvalidAdvert(format!("bad entry {}: {}", text, e)))
    }
}

/// Progress reported while searching the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertEvent<'a> {
    /// An advertisement is being inspected
    Advert { index: usize, cid: &'a str },
    /// Its entries chunk was loaded
    Entries { cid: &'a str, total: usize },
    /// A non-matching entry, reported in verbose searches only
    Skipped { multihash: &'a [u8] },
}

/// Client for an advertisement chain published under a base URL
pub struct AdvertClient {
    endpoint: Url,
    http: Client,
    cache: JsonCache,
}

impl AdvertClient {
    /// Create a client for `endpoint`, caching documents in `cache`
    pub fn new(endpoint: &str, cache: JsonCache) -> IndexResult<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            http: Client::new(),
            cache,
        })
    }

    /// URL of a document published under the endpoint
    pub fn document_url(&self, name: &str) -> IndexResult<Url> {
        Ok(self.endpoint.join(name)?)
    }

    /// CID of the latest advertisement
    pub async fn head(&self) -> IndexResult<String> {
        let url = self.document_url("head")?;
        let body = self.fetch_text(&url).await?;
        let head: Head = serde_json::from_str(&body)?;
        Ok(head.head.cid)
    }

    /// Load an advertisement
    pub async fn advert(&self, cid: &str) -> IndexResult<Advertisement> {
        self.read_json(&self.document_url(cid)?).await
    }

    /// Load an entries chunk
    pub async fn entries(&self, cid: &str) -> IndexResult<EntryChunk> {
        self.read_json(&self.document_url(cid)?).await
    }

    async fn optional_advert(&self, cid: Option<&str>) -> IndexResult<Option<Advertisement>> {
        match cid {
            Some(cid) => self.advert(cid).await.map(Some),
            None => Ok(None),
        }
    }

    /// Walk back from the head until an advertisement lists the multihash of
    /// `content`, returning that advertisement's CID.
    ///
    /// The previous advertisement is fetched while the current entries are
    /// loaded. Reaching the start of the chain yields `NotAdvertised`.
    pub async fn find_advert<F>(&self, content: &Cid, verbose: bool, mut on_event: F) -> IndexResult<String>
    where
        F: FnMut(AdvertEvent<'_>),
    {
        let target = content.hash().to_bytes();
        let mut advert_cid = self.head().await?;
        let mut advert = self.advert(&advert_cid).await?;
        let mut index = 0;

        loop {
            on_event(AdvertEvent::Advert { index, cid: &advert_cid });

            let next_cid = advert.previous_id.as_ref().map(|link| link.cid.clone());
            let (entries, next) = tokio::join!(
                self.entries(&advert.entries.cid),
                self.optional_advert(next_cid.as_deref())
            );
            let entries = entries?;
            on_event(AdvertEvent::Entries {
                cid: &advert.entries.cid,
                total: entries.entries.len(),
            });

            let mut found = false;
            for entry in &entries.entries {
                let multihash = match entry.multihash() {
                    Ok(multihash) => multihash,
                    Err(e) => {
                        warn!("Skipping entry in {}: {}", advert.entries.cid, e);
                        continue;
                    }
                };
                if multihash == target {
                    found = true;
                    break;
                }
                if verbose {
                    on_event(AdvertEvent::Skipped { multihash: &multihash });
                }
            }
            if found {
                return Ok(advert_cid);
            }

            match (next_cid, next?) {
                (Some(cid), Some(previous)) => {
                    advert_cid = cid;
                    advert = previous;
                    index += 1;
                }
                _ => return Err(IndexError::NotAdvertised(content.to_string())),
            }
        }
    }

    /// Report every advertisement newer than `since`, newest first, and return
    /// how many there were. Reaching the start of the chain yields `NotFound`.
    pub async fn adverts_since<F>(&self, since: &str, mut on_advert: F) -> IndexResult<usize>
    where
        F: FnMut(usize, &str),
    {
        let mut advert_cid = self.head().await?;
        let mut index = 0;

        loop {
            if advert_cid == since {
                return Ok(index);
            }

            let advert = self.advert(&advert_cid).await?;
            on_advert(index, &advert_cid);

            advert_cid = match advert.previous_id {
                Some(link) => link.cid,
                None => return Err(IndexError::NotFound(since.to_string())),
            };
            index += 1;
        }
    }

    /// Fetch an entries chunk as DAG-JSON, bypassing the cache, and render
    /// every multihash as a raw CIDv1.
    pub async fn fetch_entry_cids(&self, url: &Url) -> IndexResult<Vec<Cid>> {
        let body = self.fetch_text(url).await?;
        entry_cids_from_dag_json(body.as_bytes())
    }

    async fn fetch_text(&self, url: &Url) -> IndexResult<String> {
        debug!("Fetching {}", url);
        let res = self.http.get(url.clone()).send().await?;
        if !res.status().is_success() {
            return Err(IndexError::Status {
                url: url.clone(),
                status: res.status(),
            });
        }
        Ok(res.text().await?)
    }

    async fn read_json<T: DeserializeOwned>(&self, url: &Url) -> IndexResult<T> {
        if let Some(body) = self.cache.get(url).await {
            match serde_json::from_str(&body) {
                Ok(value) => return Ok(value),
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", url, e),
            }
        }

        let body = self.fetch_text(url).await?;
        let value = serde_json::from_str(&body)?;
        self.cache.put(url, &body).await;
        Ok(value)
    }
}

fn entry_cids_from_dag_json(body: &[u8]) -> IndexResult<Vec<Cid>> {
    let doc: Ipld = DagJsonCodec
        .decode(body)
        .map_err(|e| IndexError::InvalidAdvert(format!("malformed entries: {}", e)))?;

    let entries = match &doc {
        Ipld::Map(fields) => match fields.get("Entries") {
            Some(Ipld::List(entries)) => entries,
            _ => return Err(IndexError::InvalidAdvert("entries chunk without Entries".to_string())),
        },
        _ => return Err(IndexError::InvalidAdvert("entries chunk is not a map".to_string())),
    };

    entries
        .iter()
        .map(|entry| match entry {
            Ipld::Bytes(bytes) => Multihash::from_bytes(bytes)
                .map(|multihash| Cid::new_v1(RAW_CODE, multihash))
                .map_err(|e| IndexError::InvalidAdvert(format!("invalid multihash: {}", e))),
            _ => Err(IndexError::InvalidAdvert("entry is not bytes".to_string())),
        })
        .collect()
}

/// base58btc rendering of multihash bytes
pub fn base58_multihash(multihash: &[u8]) -> String {
    bs58::encode(multihash).into_string()
}
