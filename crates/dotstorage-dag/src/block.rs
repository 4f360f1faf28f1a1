/*!
# Blocks

A block is the raw payload addressed by a CID, as handed back by a block source.
*/

use cid::multihash::Multihash;
use cid::Cid;
use sha2::{Digest, Sha256};

/// Multicodec code for raw (opaque) bytes
pub const RAW_CODE: u64 = 0x55;

/// Multicodec code for DAG-PB (UnixFS) nodes
pub const DAG_PB_CODE: u64 = 0x70;

/// Multicodec code for DAG-CBOR values
pub const DAG_CBOR_CODE: u64 = 0x71;

/// Multihash code for SHA2-256
const SHA2_256_CODE: u64 = 0x12;

/// A content-addressed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The CID the block was requested by
    pub cid: Cid,

    /// Raw payload bytes
    pub data: Vec<u8>,
}

impl Block {
    /// Pair a CID with its payload
    pub fn new(cid: Cid, data: Vec<u8>) -> Self {
        Self { cid, data }
    }

    /// Hash `data` with SHA2-256 and address it as a CIDv1 with the given codec
    pub fn encode(codec: u64, data: Vec<u8>) -> Self {
        let cid = Cid::new_v1(codec, sha256_multihash(&data));
        Self { cid, data }
    }

    /// Codec tag of the block's CID
    pub fn codec(&self) -> u64 {
        self.cid.codec()
    }
}

/// Create a SHA2-256 multihash over `data`
pub fn sha256_multihash(data: &[u8]) -> Multihash {
    let digest = Sha256::digest(data);
    // a 32 byte digest always fits the 64 byte multihash buffer
    Multihash::wrap(SHA2_256_CODE, digest.as_slice()).unwrap_or_default()
}
