/*!
# Block Sources

A block source returns the bytes for a CID or reports that it does not hold
it. The `SourceChain` composes an ordered list of sources into a single lookup
where the highest-priority source holding a block always wins.
*/

use crate::{Block, SourceResult};
use async_trait::async_trait;
use cid::Cid;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// A read-only provider of blocks
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Name used when logging which source served a block
    fn name(&self) -> &str;

    /// Retrieve a block.
    ///
    /// `Ok(None)` means the source does not hold the block. An `Err` means the
    /// lookup itself failed and says nothing about presence.
    async fn get(&self, cid: &Cid) -> SourceResult<Option<Block>>;
}

/// Ordered list of block sources queried one after another
#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn BlockSource>>,
}

impl SourceChain {
    /// Create a chain; earlier sources take priority over later ones
    pub fn new(sources: Vec<Arc<dyn BlockSource>>) -> Self {
        Self { sources }
    }

    /// Append a source with the lowest priority
    pub fn push(&mut self, source: Arc<dyn BlockSource>) {
        self.sources.push(source);
    }

    /// Number of configured sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no sources are configured
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Look up a block, returning the first hit in priority order.
    ///
    /// Sources after the first hit are never queried. A lookup failure stops
    /// the search and is returned as is.
    pub async fn lookup(&self, cid: &Cid) -> SourceResult<Option<Block>> {
        for source in &self.sources {
            if let Some(block) = source.get(cid).await? {
                debug!("Block {} served by {}", cid, source.name());
                return Ok(Some(block));
            }
            trace!("Block {} not in {}", cid, source.name());
        }
        Ok(None)
    }
}

#[async_trait]
impl BlockSource for SourceChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn get(&self, cid: &Cid) -> SourceResult<Option<Block>> {
        self.lookup(cid).await
    }
}

/// Map-backed block source
pub struct MemoryBlockSource {
    name: String,
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl MemoryBlockSource {
    /// Create an empty source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a source preloaded with blocks
    pub fn with_blocks(name: impl Into<String>, blocks: impl IntoIterator<Item = Block>) -> Self {
        let source = Self::new(name);
        for block in blocks {
            source.insert(block);
        }
        source
    }

    /// Store a block, replacing any payload already held for its CID
    pub fn insert(&self, block: Block) {
        let mut blocks = self.blocks.write().unwrap_or_else(|e| e.into_inner());
        blocks.insert(block.cid, block.data);
    }

    /// Drop a block
    pub fn remove(&self, cid: &Cid) -> Option<Block> {
        let mut blocks = self.blocks.write().unwrap_or_else(|e| e.into_inner());
        blocks.remove(cid).map(|data| Block::new(*cid, data))
    }

    /// Number of blocks held
    pub fn len(&self) -> usize {
        self.blocks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the source holds no blocks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlockSource for MemoryBlockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, cid: &Cid) -> SourceResult<Option<Block>> {
        let blocks = self.blocks.read().unwrap_or_else(|e| e.into_inner());
        Ok(blocks.get(cid).map(|data| Block::new(*cid, data.clone())))
    }
}
