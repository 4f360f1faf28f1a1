/*!
# dotstorage DAG

This crate answers one question: do a set of block sources together hold every
block reachable from a root CID?

It provides the block model, pluggable block sources (in-memory and indexed CAR
files), an ordered source chain with first-hit-wins fallback, link extraction
for the supported IPLD codecs, and the depth-first completeness walker.

## Architectural Tenets
- Sources are read-only and queried strictly in priority order
- The codec set is closed; an unknown codec stops the walk
- Completeness is binary: the first missing block fails the whole walk
*/

use cid::Cid;
use thiserror::Error;

pub mod block;
pub mod car;
pub mod codec;
pub mod source;
pub mod walker;

pub use block::Block;
pub use car::CarBlockSource;
pub use codec::{extract_links, LinkCodec};
pub use source::{BlockSource, MemoryBlockSource, SourceChain};
pub use walker::{walk_dag, DagWalker};

/// Errors raised by a block source while looking up a block
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid CAR file: {0}")]
    InvalidCar(String),

    #[error("Invalid CID: {0}")]
    InvalidCid(#[from] cid::Error),
}

/// Result type for block source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors that terminate a DAG walk
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("missing block: {0}")]
    MissingBlock(Cid),

    #[error("unsupported codec: {codec:#x} (block {cid})")]
    UnsupportedCodec { codec: u64, cid: Cid },

    #[error("invalid block {cid}: {reason}")]
    InvalidBlock { cid: Cid, reason: String },

    #[error("lookup failed for {cid}: {source}")]
    Source {
        cid: Cid,
        #[source]
        source: SourceError,
    },
}

impl WalkError {
    /// The CID of the block the walk stopped at
    pub fn cid(&self) -> &Cid {
        match self {
            WalkError::MissingBlock(cid) => cid,
            WalkError::UnsupportedCodec { cid, .. } => cid,
            WalkError::InvalidBlock { cid, .. } => cid,
            WalkError::Source { cid, .. } => cid,
        }
    }
}

/// Result type for DAG walks
pub type WalkResult<T> = std::result::Result<T, WalkError>;
