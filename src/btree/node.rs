//! B-tree node types and the node contract
//!
//! Two node kinds make up the tree:
//!
//! - [`DataNode`]: a sorted `key -> value` mapping (the leaves)
//! - [`IndexNode`]: an ordered run of child handles plus an opaque
//!   operation buffer
//!
//! Index nodes store no separator keys. The separator between adjacent
//! children is *derived*: it is the last key reachable beneath the left
//! child (see [`last_key`]). This keeps persisted index nodes small at
//! the cost of resolving children during [`child_index`] search, which
//! the fragment cache absorbs.

use crate::btree::config::BtreeConfig;
use crate::error::{Error, Result};
use crate::fragment::{FragmentRef, FragmentStore};
use crate::storage::ContentStore;
use crate::value::Scalar;
use serde::{Deserialize, Serialize};

/// Leaf node: sorted entries between `data_b` and `2*data_b - 1` in count
/// (root exempt from the lower bound)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNode {
    /// Tree configuration, carried in every node
    pub cfg: BtreeConfig,
    /// Entries sorted strictly ascending by key
    pub entries: Vec<(Scalar, Scalar)>,
}

impl DataNode {
    /// An empty data node (only valid as a tree root)
    pub fn empty(cfg: BtreeConfig) -> Self {
        DataNode {
            cfg,
            entries: Vec::new(),
        }
    }

    /// Look up a value by key
    pub fn get(&self, key: &Scalar) -> Option<&Scalar> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    /// Insert or overwrite an entry, keeping the mapping sorted
    pub fn insert_entry(&mut self, key: Scalar, value: Scalar) {
        match self.entries.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => self.entries[i].1 = value,
            Err(i) => self.entries.insert(i, (key, value)),
        }
    }

    /// Remove an entry; returns whether the key was present
    pub fn remove_entry(&mut self, key: &Scalar) -> bool {
        match self.entries.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Index of the first entry with key >= `key`
    pub fn seek(&self, key: &Scalar) -> usize {
        self.entries.partition_point(|(k, _)| k < key)
    }

    /// Split at `data_b`; the separating key is the last key of the left half
    pub fn split(mut self) -> Result<(DataNode, DataNode)> {
        let b = self.cfg.data_b;
        if self.entries.len() <= b {
            return Err(Error::invariant_violation(format!(
                "cannot split a data node of {} entries at {b}",
                self.entries.len()
            )));
        }
        let right = self.entries.split_off(b);
        Ok((
            DataNode {
                cfg: self.cfg,
                entries: self.entries,
            },
            DataNode {
                cfg: self.cfg,
                entries: right,
            },
        ))
    }

    /// Validate decoded state: entries strictly ascending
    pub fn validate(&self) -> Result<()> {
        let sorted = self.entries.windows(2).all(|w| w[0].0 < w[1].0);
        if !sorted {
            return Err(Error::store_inconsistent(
                "data node entries are not strictly ascending",
            ));
        }
        Ok(())
    }
}

/// Internal node: ordered child handles plus the operation buffer
///
/// The buffer is reserved for write-optimized batching; this layer
/// preserves it verbatim and never populates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Tree configuration, carried in every node
    pub cfg: BtreeConfig,
    /// Between `index_b` and `2*index_b - 1` children (root exempt)
    pub children: Vec<BtChild>,
    /// Buffered operations keyed by target key, opaque payload
    pub ops: Vec<(Scalar, serde_json::Value)>,
}

impl IndexNode {
    /// Build an index node over existing children
    pub fn new(cfg: BtreeConfig, children: Vec<BtChild>) -> Self {
        IndexNode {
            cfg,
            children,
            ops: Vec::new(),
        }
    }

    /// Split at `index_b` children, partitioning buffered ops at the
    /// derived median
    pub async fn split<S: ContentStore>(
        self,
        store: &FragmentStore<S>,
    ) -> Result<(IndexNode, IndexNode)> {
        let IndexNode { cfg, mut children, ops } = self;
        let b = cfg.index_b;
        if children.len() <= b {
            return Err(Error::invariant_violation(format!(
                "cannot split an index node of {} children at {b}",
                children.len()
            )));
        }
        let right_children = children.split_off(b);
        let (left_ops, right_ops) = if ops.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let median = last_key(store, children.last().expect("left half is non-empty")).await?;
            let mut left_ops = Vec::new();
            let mut right_ops = Vec::new();
            for (key, op) in ops {
                if key <= median {
                    left_ops.push((key, op));
                } else {
                    right_ops.push((key, op));
                }
            }
            (left_ops, right_ops)
        };
        Ok((
            IndexNode {
                cfg,
                children,
                ops: left_ops,
            },
            IndexNode {
                cfg,
                children: right_children,
                ops: right_ops,
            },
        ))
    }

    /// Validate decoded state: at least one child
    pub fn validate(&self) -> Result<()> {
        if self.children.is_empty() {
            return Err(Error::store_inconsistent("index node has no children"));
        }
        Ok(())
    }
}

/// Either node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BtNode {
    Data(DataNode),
    Index(IndexNode),
}

impl BtNode {
    /// Whether this is an index node
    pub fn is_index(&self) -> bool {
        matches!(self, BtNode::Index(_))
    }

    /// Configuration carried by the node
    pub fn cfg(&self) -> &BtreeConfig {
        match self {
            BtNode::Data(d) => &d.cfg,
            BtNode::Index(ix) => &ix.cfg,
        }
    }

    /// Entry count (entries for data nodes, children for index nodes)
    pub fn len(&self) -> usize {
        match self {
            BtNode::Data(d) => d.entries.len(),
            BtNode::Index(ix) => ix.children.len(),
        }
    }

    /// Whether the node is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The occupancy bound that applies to this node kind
    fn bound(&self) -> usize {
        match self {
            BtNode::Data(d) => d.cfg.data_b,
            BtNode::Index(ix) => ix.cfg.index_b,
        }
    }

    /// Entry count has reached `2b`: the node must split
    pub fn is_overflow(&self) -> bool {
        self.len() >= 2 * self.bound()
    }

    /// Entry count fell below `b`: the node must merge
    pub fn is_underflow(&self) -> bool {
        self.len() < self.bound()
    }

    /// Split into two halves at position `b`
    ///
    /// The separating key is not returned; it is recoverable as
    /// `last_key` of the left half, which is how readers derive it.
    pub async fn split<S: ContentStore>(
        self,
        store: &FragmentStore<S>,
    ) -> Result<(BtNode, BtNode)> {
        match self {
            BtNode::Data(d) => {
                let (l, r) = d.split()?;
                Ok((BtNode::Data(l), BtNode::Data(r)))
            }
            BtNode::Index(ix) => {
                let (l, r) = ix.split(store).await?;
                Ok((BtNode::Index(l), BtNode::Index(r)))
            }
        }
    }

    /// Combine with the sibling to this node's right
    ///
    /// The caller guarantees `right` really is the adjacent right
    /// sibling; ascending order is preserved by plain concatenation.
    /// Buffered ops concatenate in the same order.
    pub fn merge(self, right: BtNode) -> Result<BtNode> {
        match (self, right) {
            (BtNode::Data(mut a), BtNode::Data(b)) => {
                a.entries.extend(b.entries);
                Ok(BtNode::Data(a))
            }
            (BtNode::Index(mut a), BtNode::Index(b)) => {
                a.children.extend(b.children);
                a.ops.extend(b.ops);
                Ok(BtNode::Index(a))
            }
            _ => Err(Error::invariant_violation(
                "cannot merge a data node with an index node",
            )),
        }
    }
}

/// A child handle inside an index node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BtChild {
    /// Reference to a persisted node
    Ref(FragmentRef),
    /// Inlined node, not yet persisted
    Node(Box<BtNode>),
}

impl BtChild {
    /// Materialize the node this handle denotes (one level)
    pub async fn resolve<S: ContentStore>(&self, store: &FragmentStore<S>) -> Result<BtNode> {
        match self {
            BtChild::Node(node) => Ok((**node).clone()),
            BtChild::Ref(reference) => store.load_ref(reference).await?.as_ref().clone().into_bt(),
        }
    }
}

/// Rightmost key reachable beneath a child handle
///
/// For an index node this descends along rightmost children, resolving
/// references as needed; for a data node it is the last entry's key.
pub async fn last_key<S: ContentStore>(
    store: &FragmentStore<S>,
    child: &BtChild,
) -> Result<Scalar> {
    let mut node = child.resolve(store).await?;
    loop {
        node = match node {
            BtNode::Data(d) => {
                return d
                    .entries
                    .last()
                    .map(|(k, _)| k.clone())
                    .ok_or_else(|| {
                        Error::invariant_violation("empty data node has no last key")
                    })
            }
            BtNode::Index(ix) => {
                let rightmost = ix
                    .children
                    .last()
                    .ok_or_else(|| Error::invariant_violation("index node has no children"))?;
                rightmost.resolve(store).await?
            }
        };
    }
}

/// Binary search over derived separators: the smallest `i` such that
/// `key <= last_key(children[i])`, clamped to the last child when the key
/// exceeds every separator
pub async fn child_index<S: ContentStore>(
    store: &FragmentStore<S>,
    node: &IndexNode,
    key: &Scalar,
) -> Result<usize> {
    if node.children.is_empty() {
        return Err(Error::invariant_violation("index node has no children"));
    }
    let mut lo = 0usize;
    let mut hi = node.children.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let separator = last_key(store, &node.children[mid]).await?;
        if *key <= separator {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo.min(node.children.len() - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Fragment;
    use crate::storage::MemoryStore;

    fn cfg() -> BtreeConfig {
        BtreeConfig::new(3, 3, 2)
    }

    fn data(range: std::ops::RangeInclusive<i64>) -> DataNode {
        DataNode {
            cfg: cfg(),
            entries: range.map(|i| (Scalar::Long(i), Scalar::Long(i))).collect(),
        }
    }

    fn store() -> FragmentStore<MemoryStore> {
        FragmentStore::new(MemoryStore::new())
    }

    #[test]
    fn test_data_node_upsert_and_remove() {
        let mut node = DataNode::empty(cfg());
        node.insert_entry(Scalar::Long(2), Scalar::from("b"));
        node.insert_entry(Scalar::Long(1), Scalar::from("a"));
        node.insert_entry(Scalar::Long(2), Scalar::from("b2"));

        assert_eq!(node.entries.len(), 2);
        assert_eq!(node.get(&Scalar::Long(2)), Some(&Scalar::from("b2")));
        assert!(node.validate().is_ok());

        assert!(node.remove_entry(&Scalar::Long(1)));
        assert!(!node.remove_entry(&Scalar::Long(1)));
    }

    #[test]
    fn test_data_node_split_median() {
        let node = data(1..=6);
        let (left, right) = node.split().unwrap();
        assert_eq!(left.entries.len(), 3);
        assert_eq!(right.entries.len(), 3);
        // the derived separator is the last key of the left half
        assert_eq!(left.entries.last().unwrap().0, Scalar::Long(3));
        assert_eq!(right.entries.first().unwrap().0, Scalar::Long(4));
    }

    #[test]
    fn test_overflow_underflow_bounds() {
        let node = BtNode::Data(data(1..=5));
        assert!(!node.is_overflow()); // 5 == 2b - 1
        assert!(!node.is_underflow());

        let node = BtNode::Data(data(1..=6));
        assert!(node.is_overflow()); // 6 == 2b

        let node = BtNode::Data(data(1..=2));
        assert!(node.is_underflow()); // 2 < b
    }

    #[test]
    fn test_merge_preserves_order_and_ops() {
        let a = BtNode::Data(data(1..=3));
        let b = BtNode::Data(data(4..=6));
        let merged = a.merge(b).unwrap();
        assert_eq!(merged.len(), 6);
        if let BtNode::Data(d) = &merged {
            d.validate().unwrap();
        }

        let mut left = IndexNode::new(cfg(), vec![]);
        left.ops.push((Scalar::Long(1), serde_json::json!("op1")));
        let mut right = IndexNode::new(cfg(), vec![]);
        right.ops.push((Scalar::Long(9), serde_json::json!("op2")));
        let merged = BtNode::Index(left).merge(BtNode::Index(right)).unwrap();
        if let BtNode::Index(ix) = merged {
            assert_eq!(ix.ops.len(), 2);
            assert_eq!(ix.ops[0].0, Scalar::Long(1));
        } else {
            panic!("expected an index node");
        }
    }

    #[test]
    fn test_mixed_merge_rejected() {
        let a = BtNode::Data(data(1..=3));
        let b = BtNode::Index(IndexNode::new(cfg(), vec![]));
        assert!(a.merge(b).is_err());
    }

    #[tokio::test]
    async fn test_child_index_over_derived_separators() {
        let store = store();
        let d1 = store
            .create_ref(Fragment::Data(data(1..=5)))
            .await
            .unwrap();
        let d2 = store
            .create_ref(Fragment::Data(data(6..=10)))
            .await
            .unwrap();
        let node = IndexNode::new(cfg(), vec![BtChild::Ref(d1), BtChild::Ref(d2)]);

        assert_eq!(child_index(&store, &node, &Scalar::Long(3)).await.unwrap(), 0);
        assert_eq!(child_index(&store, &node, &Scalar::Long(5)).await.unwrap(), 0);
        assert_eq!(child_index(&store, &node, &Scalar::Long(6)).await.unwrap(), 1);
        // beyond every separator: clamped to the rightmost child
        assert_eq!(
            child_index(&store, &node, &Scalar::Long(100)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_last_key_descends_references() {
        let store = store();
        let d2 = store
            .create_ref(Fragment::Data(data(6..=10)))
            .await
            .unwrap();
        let d1 = store
            .create_ref(Fragment::Data(data(1..=5)))
            .await
            .unwrap();
        let inner = IndexNode::new(cfg(), vec![BtChild::Ref(d1), BtChild::Ref(d2)]);
        let inner_ref = store
            .create_ref(Fragment::Index(inner))
            .await
            .unwrap();
        let root = IndexNode::new(cfg(), vec![BtChild::Ref(inner_ref)]);

        let k = last_key(&store, root.children.last().unwrap()).await.unwrap();
        assert_eq!(k, Scalar::Long(10));
    }
}
