/*!
# DAG Completeness Walker

Walks a DAG from its root, resolving every reachable block through a
`SourceChain`. The walk is a depth-first pre-order traversal: the links of a
block are placed at the front of the work queue, ahead of siblings queued
earlier, so a child's subtree is finished before the walk returns to them.

There is no visited set. A block reachable through several paths is looked up,
decoded and counted once per path, so the returned count is the number of
resolved visits rather than the number of distinct blocks.
*/

use crate::codec::extract_links;
use crate::source::SourceChain;
use crate::{WalkError, WalkResult};
use cid::Cid;
use std::collections::VecDeque;
use tracing::debug;

/// Depth-first walker over an ordered set of block sources
pub struct DagWalker<'a> {
    sources: &'a SourceChain,
}

impl<'a> DagWalker<'a> {
    /// Create a walker over the given sources
    pub fn new(sources: &'a SourceChain) -> Self {
        Self { sources }
    }

    /// Walk from `root` and return the number of resolved visits
    pub async fn walk(&self, root: Cid) -> WalkResult<u64> {
        self.walk_with(root, |_| {}).await
    }

    /// Walk from `root`, calling `on_visit` for every resolved block in
    /// visitation order.
    ///
    /// The first missing block, lookup failure, unsupported codec or
    /// undecodable block ends the walk with an error.
    pub async fn walk_with<F>(&self, root: Cid, mut on_visit: F) -> WalkResult<u64>
    where
        F: FnMut(&Cid),
    {
        let mut queue = VecDeque::from([root]);
        let mut visited: u64 = 0;

        while let Some(cid) = queue.pop_front() {
            let block = match self.sources.lookup(&cid).await {
                Ok(Some(block)) => block,
                Ok(None) => return Err(WalkError::MissingBlock(cid)),
                Err(source) => return Err(WalkError::Source { cid, source }),
            };

            visited += 1;
            on_visit(&cid);

            let links = extract_links(&cid, &block.data)?;
            debug!("Visited {} ({} links, {} queued)", cid, links.len(), queue.len());

            // links go in front of the queue in their original order
            for link in links.into_iter().rev() {
                queue.push_front(link);
            }
        }

        Ok(visited)
    }
}

/// Walk the DAG under `root` and return the number of resolved visits
pub async fn walk_dag(root: Cid, sources: &SourceChain) -> WalkResult<u64> {
    DagWalker::new(sources).walk(root).await
}
