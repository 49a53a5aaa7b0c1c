//! Descent paths
//!
//! A path records the route from the root to a terminal data node: the
//! resolved index node and chosen child position at each level, with the
//! data node on top. Paths are short (tree depth is logarithmic) and are
//! the unit both mutation bubbling and forward iteration work over.

use crate::btree::node::{child_index, BtChild, BtNode, DataNode, IndexNode};
use crate::error::Result;
use crate::fragment::FragmentStore;
use crate::storage::ContentStore;
use crate::value::Scalar;

/// One index level of a descent: the node and the child position taken
#[derive(Debug, Clone)]
pub struct PathStep {
    pub node: IndexNode,
    pub index: usize,
}

/// A full descent ending at a data node
#[derive(Debug, Clone)]
pub struct Path {
    /// Index levels from the root downward
    pub steps: Vec<PathStep>,
    /// The terminal data node
    pub leaf: DataNode,
}

/// Descend from `root` toward `key`, recording the route
///
/// At each index node the child is chosen by derived-separator search
/// (out-of-range keys clamp to the rightmost child), so the descent
/// always terminates at a data node.
pub async fn lookup_path<S: ContentStore>(
    store: &FragmentStore<S>,
    root: &BtChild,
    key: &Scalar,
) -> Result<Path> {
    let mut steps = Vec::new();
    let mut current = root.resolve(store).await?;
    loop {
        match current {
            BtNode::Data(leaf) => return Ok(Path { steps, leaf }),
            BtNode::Index(node) => {
                let index = child_index(store, &node, key).await?;
                let next = node.children[index].resolve(store).await?;
                steps.push(PathStep { node, index });
                current = next;
            }
        }
    }
}

/// Advance a path to the next data node in key order
///
/// Walks upward to the first ancestor with an unused child to the right
/// of the chosen position, then descends along leftmost children.
/// Returns `None` when the path was already at the rightmost data node.
pub async fn right_successor<S: ContentStore>(
    store: &FragmentStore<S>,
    mut path: Path,
) -> Result<Option<Path>> {
    while let Some(PathStep { node, index }) = path.steps.pop() {
        if index + 1 >= node.children.len() {
            continue;
        }
        let mut steps = path.steps;
        let mut current = node.children[index + 1].resolve(store).await?;
        steps.push(PathStep {
            node,
            index: index + 1,
        });
        loop {
            match current {
                BtNode::Data(leaf) => return Ok(Some(Path { steps, leaf })),
                BtNode::Index(node) => {
                    let next = node.children[0].resolve(store).await?;
                    steps.push(PathStep { node, index: 0 });
                    current = next;
                }
            }
        }
    }
    Ok(None)
}
