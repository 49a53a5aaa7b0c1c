//! Persistent B-tree over paged fragments
//!
//! An ordered `key -> value` map tuned for large fan-out. Nodes page in
//! and out of the fragment store on demand; every mutation rebuilds the
//! descent path out of fresh fragments and returns a reference to a new
//! root, leaving prior roots intact (shared sub-trees are immutable).
//!
//! ## Operations
//!
//! - [`bt_new`]: persist an empty tree, returning its root reference
//! - [`bt_lookup`]: point lookup
//! - [`bt_insert`]: upsert with split propagation (the root grows a new
//!   index level when it overflows)
//! - [`bt_delete`]: removal with merge/redistribution (an index root left
//!   with a single child collapses, shrinking the tree)
//! - [`bt_forward`]: lazy ascending iteration from a key
//!
//! Callers publish the returned root reference under a stable key with
//! [`FragmentStore::publish_root`]; serializing those publications is
//! what makes a sequence of operations linearizable.

pub mod config;
pub mod iter;
pub mod node;
pub mod path;

pub use config::BtreeConfig;
pub use iter::ForwardIter;
pub use node::{child_index, last_key, BtChild, BtNode, DataNode, IndexNode};
pub use path::{lookup_path, right_successor, Path, PathStep};

use crate::error::Result;
use crate::fragment::{Fragment, FragmentRef, FragmentStore};
use crate::storage::ContentStore;
use crate::value::Scalar;
use path::PathStep as Step;
use tracing::debug;

/// Create an empty tree, returning the reference to its root
pub async fn bt_new<S: ContentStore>(
    store: &FragmentStore<S>,
    cfg: BtreeConfig,
) -> Result<FragmentRef> {
    cfg.validate()?;
    store.create_ref(Fragment::Data(DataNode::empty(cfg))).await
}

/// Look up `key`, returning its value if present
pub async fn bt_lookup<S: ContentStore>(
    store: &FragmentStore<S>,
    root: &FragmentRef,
    key: &Scalar,
) -> Result<Option<Scalar>> {
    key.ensure_searchable()?;
    let path = lookup_path(store, &BtChild::Ref(*root), key).await?;
    Ok(path.leaf.get(key).cloned())
}

/// Insert or overwrite `key -> value`, returning the new root reference
pub async fn bt_insert<S: ContentStore>(
    store: &FragmentStore<S>,
    root: &FragmentRef,
    key: Scalar,
    value: Scalar,
) -> Result<FragmentRef> {
    key.ensure_storable()?;
    value.ensure_storable()?;

    let Path { mut steps, mut leaf } = lookup_path(store, &BtChild::Ref(*root), &key).await?;
    leaf.insert_entry(key, value);
    let mut current = BtNode::Data(leaf);

    // Bubble up, splitting overflowing nodes into two persisted halves.
    while let Some(Step { mut node, index }) = steps.pop() {
        if current.is_overflow() {
            let (left, right) = current.split(store).await?;
            let left_ref = store.create_ref(left.into()).await?;
            let right_ref = store.create_ref(right.into()).await?;
            node.children.splice(
                index..=index,
                [BtChild::Ref(left_ref), BtChild::Ref(right_ref)],
            );
        } else {
            let child_ref = store.create_ref(current.into()).await?;
            node.children[index] = BtChild::Ref(child_ref);
        }
        current = BtNode::Index(node);
    }

    if current.is_overflow() {
        // The root itself split: grow a new index level above the halves.
        let cfg = *current.cfg();
        let (left, right) = current.split(store).await?;
        let left_ref = store.create_ref(left.into()).await?;
        let right_ref = store.create_ref(right.into()).await?;
        let new_root = IndexNode::new(cfg, vec![BtChild::Ref(left_ref), BtChild::Ref(right_ref)]);
        debug!("root split; tree height increased");
        store.create_ref(Fragment::Index(new_root)).await
    } else {
        store.create_ref(current.into()).await
    }
}

/// Remove `key`, returning the new root reference
///
/// Deleting an absent key returns the root unchanged.
pub async fn bt_delete<S: ContentStore>(
    store: &FragmentStore<S>,
    root: &FragmentRef,
    key: &Scalar,
) -> Result<FragmentRef> {
    key.ensure_searchable()?;

    let Path { mut steps, mut leaf } = lookup_path(store, &BtChild::Ref(*root), key).await?;
    if !leaf.remove_entry(key) {
        return Ok(*root);
    }
    let mut current = BtNode::Data(leaf);

    while let Some(Step { mut node, index }) = steps.pop() {
        if !current.is_underflow() || node.children.len() < 2 {
            // Healthy (or no sibling to merge with): persist in place.
            let child_ref = store.create_ref(current.into()).await?;
            node.children[index] = BtChild::Ref(child_ref);
        } else {
            merge_into_parent(store, &mut node, index, current).await?;
        }
        current = BtNode::Index(node);
    }

    if let BtNode::Index(node) = &current {
        if node.children.len() == 1 {
            // Height decrease: the lone child becomes the root.
            debug!("root collapse; tree height decreased");
            return match node.children[0].clone() {
                BtChild::Ref(reference) => Ok(reference),
                BtChild::Node(child) => store.create_ref((*child).into()).await,
            };
        }
    }
    store.create_ref(current.into()).await
}

/// Merge an underflowing child with its larger neighboring sibling,
/// re-splitting when the combined node overflows
async fn merge_into_parent<S: ContentStore>(
    store: &FragmentStore<S>,
    parent: &mut IndexNode,
    index: usize,
    current: BtNode,
) -> Result<()> {
    let last = parent.children.len() - 1;
    let sibling_index = if index == 0 {
        1
    } else if index == last {
        index - 1
    } else {
        // Interior position: the right sibling wins only when strictly
        // larger; ties go left.
        let left_len = parent.children[index - 1].resolve(store).await?.len();
        let right_len = parent.children[index + 1].resolve(store).await?.len();
        if right_len > left_len {
            index + 1
        } else {
            index - 1
        }
    };
    let sibling = parent.children[sibling_index].resolve(store).await?;

    // Ascending order: the left of the pair merges first.
    let merged = if sibling_index < index {
        sibling.merge(current)?
    } else {
        current.merge(sibling)?
    };

    let lo = index.min(sibling_index);
    let hi = index.max(sibling_index);
    if merged.is_overflow() {
        // Redistribution: the pair still holds too much for one node.
        let (left, right) = merged.split(store).await?;
        let left_ref = store.create_ref(left.into()).await?;
        let right_ref = store.create_ref(right.into()).await?;
        parent
            .children
            .splice(lo..=hi, [BtChild::Ref(left_ref), BtChild::Ref(right_ref)]);
        debug!("underflow redistributed across two nodes");
    } else {
        let merged_ref = store.create_ref(merged.into()).await?;
        parent.children.splice(lo..=hi, [BtChild::Ref(merged_ref)]);
        debug!("underflow merged; parent child count decreased");
    }
    Ok(())
}

/// Lazy ascending iteration over entries with key >= `key`
pub async fn bt_forward<'a, S: ContentStore>(
    store: &'a FragmentStore<S>,
    root: &FragmentRef,
    key: &Scalar,
) -> Result<ForwardIter<'a, S>> {
    key.ensure_searchable()?;
    let path = lookup_path(store, &BtChild::Ref(*root), key).await?;
    let pos = path.leaf.seek(key);
    Ok(ForwardIter::new(store, path, pos))
}
