//! Persistent red-black tree over paged fragments
//!
//! An ordered set of [`Scalar`] keys with point lookup, insertion, and
//! bounded range enumeration. Sub-trees page in and out of the fragment
//! store on demand: every child slot is either `Nil`, an inlined node, or
//! a reference to a persisted node.
//!
//! Balancing follows the classical four-pattern rewrite. While rebalancing,
//! every third level persists the pattern's four grandchild sub-trees and
//! replaces them with references, which keeps the inlined portion of the
//! tree at a constant node count regardless of total size.
//!
//! Mutation never touches persisted fragments; an insert rebuilds the
//! descent path and returns a new root handle. Publishing that handle
//! under a stable key is the caller's job (see
//! [`FragmentStore::publish_root`](crate::fragment::FragmentStore::publish_root)).

use crate::error::{Error, Result};
use crate::fragment::{Fragment, FragmentRef, FragmentStore};
use crate::storage::ContentStore;
use crate::value::Scalar;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Node color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
}

/// One red-black node: `(color, left, key, right)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbNode {
    pub color: Color,
    pub left: RbChild,
    pub key: Scalar,
    pub right: RbChild,
}

impl RbNode {
    /// A fresh red node holding one key
    pub fn singleton(key: Scalar) -> Self {
        RbNode {
            color: Color::Red,
            left: RbChild::Nil,
            key,
            right: RbChild::Nil,
        }
    }

    fn new(color: Color, left: RbChild, key: Scalar, right: RbChild) -> Self {
        RbNode {
            color,
            left,
            key,
            right,
        }
    }
}

/// A child slot: empty, inlined, or a reference to a persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RbChild {
    /// Empty sub-tree (serialized as `null`)
    Nil,
    /// Reference to a persisted node
    Ref(FragmentRef),
    /// Inlined node, not yet persisted
    Node(Box<RbNode>),
}

impl RbChild {
    /// Inline a node into a child slot
    pub fn node(node: RbNode) -> Self {
        RbChild::Node(Box::new(node))
    }

    /// Whether this slot is empty
    pub fn is_nil(&self) -> bool {
        matches!(self, RbChild::Nil)
    }

    /// Materialize this handle `depth` levels deep
    ///
    /// Level 1 is the handle's own node (loaded if it is a reference),
    /// level 2 its children, and so on. `depth == 0` returns the handle
    /// unchanged, bounding per-operation I/O.
    pub fn resolve<'a, S: ContentStore>(
        self,
        store: &'a FragmentStore<S>,
        depth: usize,
    ) -> BoxFuture<'a, Result<RbChild>> {
        Box::pin(async move {
            if depth == 0 {
                return Ok(self);
            }
            match self {
                RbChild::Nil => Ok(RbChild::Nil),
                RbChild::Ref(reference) => {
                    let fragment = store.load_ref(&reference).await?;
                    let node = fragment.as_ref().clone().into_rb()?;
                    Ok(RbChild::node(resolve_children(store, node, depth).await?))
                }
                RbChild::Node(node) => {
                    Ok(RbChild::node(resolve_children(store, *node, depth).await?))
                }
            }
        })
    }
}

async fn resolve_children<S: ContentStore>(
    store: &FragmentStore<S>,
    mut node: RbNode,
    depth: usize,
) -> Result<RbNode> {
    node.left = node.left.resolve(store, depth - 1).await?;
    node.right = node.right.resolve(store, depth - 1).await?;
    Ok(node)
}

/// Inspect a child's color without inlining it into the tree
///
/// References are peeked through the cache; empty slots count as black.
async fn child_is_red<S: ContentStore>(
    store: &FragmentStore<S>,
    child: &RbChild,
) -> Result<bool> {
    match child {
        RbChild::Nil => Ok(false),
        RbChild::Node(node) => Ok(node.color == Color::Red),
        RbChild::Ref(reference) => match store.load_ref(reference).await?.as_ref() {
            Fragment::Rb(node) => Ok(node.color == Color::Red),
            _ => Err(Error::store_inconsistent(
                "red-black child reference resolved to a foreign fragment",
            )),
        },
    }
}

/// Take the node out of a slot known to be materialized
fn expect_node(child: RbChild) -> Result<Box<RbNode>> {
    match child {
        RbChild::Node(n) => Ok(n),
        _ => Err(Error::invariant_violation(
            "expected a materialized red-black node",
        )),
    }
}

// ============================================================================
// Insert
// ============================================================================

/// Insert `key`, returning the new root handle
///
/// The returned root is always black. Inserting a key already present
/// returns an equivalent tree.
pub async fn rb_insert<S: ContentStore>(
    store: &FragmentStore<S>,
    root: RbChild,
    key: Scalar,
) -> Result<RbChild> {
    key.ensure_storable()?;
    let new_root = insert_at(store, root, &key, 0).await?;
    let mut node = expect_node(new_root)?;
    node.color = Color::Black;
    Ok(RbChild::Node(node))
}

fn insert_at<'a, S: ContentStore>(
    store: &'a FragmentStore<S>,
    child: RbChild,
    key: &'a Scalar,
    depth: usize,
) -> BoxFuture<'a, Result<RbChild>> {
    Box::pin(async move {
        let child = child.resolve(store, 1).await?;
        let mut node = match child {
            RbChild::Nil => return Ok(RbChild::node(RbNode::singleton(key.clone()))),
            RbChild::Node(node) => node,
            RbChild::Ref(_) => {
                return Err(Error::invariant_violation(
                    "reference survived single-level resolution",
                ))
            }
        };
        match key.cmp(&node.key) {
            std::cmp::Ordering::Less => {
                let left = std::mem::replace(&mut node.left, RbChild::Nil);
                node.left = insert_at(store, left, key, depth + 1).await?;
            }
            std::cmp::Ordering::Greater => {
                let right = std::mem::replace(&mut node.right, RbChild::Nil);
                node.right = insert_at(store, right, key, depth + 1).await?;
            }
            std::cmp::Ordering::Equal => return Ok(RbChild::Node(node)),
        }
        Ok(RbChild::node(balance(store, *node, depth).await?))
    })
}

// ============================================================================
// Balance
// ============================================================================

/// Re-balance a sub-tree after insertion below it
///
/// Matches the four classical patterns (a red child with a red grandchild
/// under a black node) and rewrites to
/// `red(black(a, x, b), y, black(c, z, d))`. Colors below are peeked
/// through the cache; only the pieces a matched pattern consumes are
/// materialized, and an unmatched sub-tree is returned untouched with its
/// references intact.
async fn balance<S: ContentStore>(
    store: &FragmentStore<S>,
    node: RbNode,
    depth: usize,
) -> Result<RbNode> {
    if node.color != Color::Black {
        return Ok(node);
    }

    if child_is_red(store, &node.left).await? {
        let l = expect_node(node.left.clone().resolve(store, 1).await?)?;
        if child_is_red(store, &l.left).await? {
            // black(red(red(a,x,b),y,c),z,d)
            let ll = expect_node(l.left.resolve(store, 1).await?)?;
            return rebalanced(
                store, ll.left, ll.key, ll.right, l.key, l.right, node.key, node.right, depth,
            )
            .await;
        }
        if child_is_red(store, &l.right).await? {
            // black(red(a,x,red(b,y,c)),z,d)
            let lr = expect_node(l.right.resolve(store, 1).await?)?;
            return rebalanced(
                store, l.left, l.key, lr.left, lr.key, lr.right, node.key, node.right, depth,
            )
            .await;
        }
    }

    if child_is_red(store, &node.right).await? {
        let r = expect_node(node.right.clone().resolve(store, 1).await?)?;
        if child_is_red(store, &r.left).await? {
            // black(a,x,red(red(b,y,c),z,d))
            let rl = expect_node(r.left.resolve(store, 1).await?)?;
            return rebalanced(
                store, node.left, node.key, rl.left, rl.key, rl.right, r.key, r.right, depth,
            )
            .await;
        }
        if child_is_red(store, &r.right).await? {
            // black(a,x,red(b,y,red(c,z,d)))
            let rr = expect_node(r.right.resolve(store, 1).await?)?;
            return rebalanced(
                store, node.left, node.key, r.left, r.key, rr.left, rr.key, rr.right, depth,
            )
            .await;
        }
    }

    Ok(node)
}

/// Assemble `red(black(a,x,b), y, black(c,z,d))`, flushing the grandchild
/// sub-trees to references on every third level
#[allow(clippy::too_many_arguments)]
async fn rebalanced<S: ContentStore>(
    store: &FragmentStore<S>,
    a: RbChild,
    x: Scalar,
    b: RbChild,
    y: Scalar,
    c: RbChild,
    z: Scalar,
    d: RbChild,
    depth: usize,
) -> Result<RbNode> {
    let (a, b, c, d) = if depth % 3 == 0 {
        (
            persist_child(store, a).await?,
            persist_child(store, b).await?,
            persist_child(store, c).await?,
            persist_child(store, d).await?,
        )
    } else {
        (a, b, c, d)
    };
    Ok(RbNode::new(
        Color::Red,
        RbChild::node(RbNode::new(Color::Black, a, x, b)),
        y,
        RbChild::node(RbNode::new(Color::Black, c, z, d)),
    ))
}

/// Persist an inlined node and replace it with a reference
///
/// Empty slots and existing references pass through unchanged.
async fn persist_child<S: ContentStore>(
    store: &FragmentStore<S>,
    child: RbChild,
) -> Result<RbChild> {
    match child {
        RbChild::Node(node) => {
            let reference = store.create_ref(Fragment::Rb(*node)).await?;
            Ok(RbChild::Ref(reference))
        }
        other => Ok(other),
    }
}

// ============================================================================
// Find
// ============================================================================

/// Point lookup: `Some(key)` if present, `None` otherwise
pub async fn rb_find<S: ContentStore>(
    store: &FragmentStore<S>,
    root: &RbChild,
    key: &Scalar,
) -> Result<Option<Scalar>> {
    key.ensure_searchable()?;
    let mut current = root.clone();
    loop {
        current = current.resolve(store, 1).await?;
        let node = match current {
            RbChild::Nil => return Ok(None),
            RbChild::Node(node) => node,
            RbChild::Ref(_) => {
                return Err(Error::invariant_violation(
                    "reference survived single-level resolution",
                ))
            }
        };
        match key.cmp(&node.key) {
            std::cmp::Ordering::Less => current = node.left,
            std::cmp::Ordering::Greater => current = node.right,
            std::cmp::Ordering::Equal => return Ok(Some(node.key)),
        }
    }
}

// ============================================================================
// Range
// ============================================================================

/// In-order keys `y` with `start < y < end` (exclusive at both ends)
pub async fn rb_range<S: ContentStore>(
    store: &FragmentStore<S>,
    root: &RbChild,
    start: &Scalar,
    end: &Scalar,
) -> Result<Vec<Scalar>> {
    start.ensure_searchable()?;
    end.ensure_searchable()?;
    range_at(store, root.clone(), start, end).await
}

fn range_at<'a, S: ContentStore>(
    store: &'a FragmentStore<S>,
    child: RbChild,
    start: &'a Scalar,
    end: &'a Scalar,
) -> BoxFuture<'a, Result<Vec<Scalar>>> {
    Box::pin(async move {
        let child = child.resolve(store, 1).await?;
        let node = match child {
            RbChild::Nil => return Ok(Vec::new()),
            RbChild::Node(node) => node,
            RbChild::Ref(_) => {
                return Err(Error::invariant_violation(
                    "reference survived single-level resolution",
                ))
            }
        };
        let RbNode {
            left, key, right, ..
        } = *node;
        if *start < key && key < *end {
            let mut out = range_at(store, left, start, end).await?;
            out.push(key);
            out.extend(range_at(store, right, start, end).await?);
            Ok(out)
        } else if *start >= key {
            // everything to the left is out of range
            range_at(store, right, start, end).await
        } else {
            range_at(store, left, start, end).await
        }
    })
}
