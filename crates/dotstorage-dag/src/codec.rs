/*!
# Link Extraction

Maps the codec tag of a CID to the rule for pulling child links out of the
block's bytes. The set of codecs is closed: anything not listed here cannot be
walked, because its links would go unseen.
*/

use crate::block::{DAG_CBOR_CODE, DAG_PB_CODE, RAW_CODE};
use crate::{WalkError, WalkResult};
use cid::Cid;
use libipld::cbor::DagCborCodec;
use libipld::codec::Codec;
use libipld::pb::DagPbCodec;
use libipld::Ipld;

/// Codecs the walker knows how to extract links from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCodec {
    /// Opaque application bytes, never links
    Raw,
    /// UnixFS-style node with an ordered list of named links
    DagPb,
    /// Arbitrary DAG-CBOR value with embedded CID tags
    DagCbor,
}

impl LinkCodec {
    /// Resolve a multicodec code, `None` when unsupported
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            RAW_CODE => Some(LinkCodec::Raw),
            DAG_PB_CODE => Some(LinkCodec::DagPb),
            DAG_CBOR_CODE => Some(LinkCodec::DagCbor),
            _ => None,
        }
    }

    /// The multicodec code of this codec
    pub fn code(&self) -> u64 {
        match self {
            LinkCodec::Raw => RAW_CODE,
            LinkCodec::DagPb => DAG_PB_CODE,
            LinkCodec::DagCbor => DAG_CBOR_CODE,
        }
    }

    /// Extract child links in structural order.
    ///
    /// DAG-PB links come back in link-list order. DAG-CBOR links come back in
    /// the order their tags appear in the encoding, which is a depth-first,
    /// left-to-right scan of the value.
    pub fn links(&self, bytes: &[u8]) -> Result<Vec<Cid>, String> {
        match self {
            LinkCodec::Raw => Ok(Vec::new()),
            LinkCodec::DagPb => dag_pb_links(bytes),
            LinkCodec::DagCbor => {
                let mut links = Vec::new();
                DagCborCodec
                    .references::<Ipld, _>(bytes, &mut links)
                    .map_err(|e| e.to_string())?;
                Ok(links)
            }
        }
    }
}

fn dag_pb_links(bytes: &[u8]) -> Result<Vec<Cid>, String> {
    let node: Ipld = DagPbCodec.decode(bytes).map_err(|e| e.to_string())?;

    let links = match &node {
        Ipld::Map(fields) => match fields.get("Links") {
            Some(Ipld::List(links)) => links,
            _ => return Err("DAG-PB node without a Links list".to_string()),
        },
        _ => return Err("DAG-PB node is not a map".to_string()),
    };

    links
        .iter()
        .map(|link| match link {
            Ipld::Map(fields) => match fields.get("Hash") {
                Some(Ipld::Link(cid)) => Ok(*cid),
                _ => Err("DAG-PB link without a Hash".to_string()),
            },
            _ => Err("DAG-PB link is not a map".to_string()),
        })
        .collect()
}

/// Extract the links of the block addressed by `cid`.
///
/// Fails with `UnsupportedCodec` for codecs outside the registry and with
/// `InvalidBlock` when the bytes do not decode under the CID's codec.
pub fn extract_links(cid: &Cid, bytes: &[u8]) -> WalkResult<Vec<Cid>> {
    let codec = LinkCodec::from_code(cid.codec()).ok_or(WalkError::UnsupportedCodec {
        codec: cid.codec(),
        cid: *cid,
    })?;

    codec
        .links(bytes)
        .map_err(|reason| WalkError::InvalidBlock { cid: *cid, reason })
}
