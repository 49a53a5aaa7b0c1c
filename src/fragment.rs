//! Fragments, references, and the fragment store
//!
//! A **fragment** is one tree node at rest: a red-black node, a B-tree
//! data node, or a B-tree index node. Fragments are immutable once
//! persisted; mutation always produces fresh fragments with fresh FIDs.
//!
//! A **reference** is a lightweight tagged handle carrying exactly one
//! FID, standing in for a child fragment not yet resolved. On the wire a
//! reference is the object `{"#ref": "<hex fid>"}`; node shapes have
//! disjoint field sets, so the decoder can tell every form apart without
//! an outer tag.
//!
//! [`FragmentStore`] binds a [`ContentStore`] to its own LRU
//! [`FragmentCache`] and provides the persistence operations every tree
//! layer builds on:
//!
//! - [`FragmentStore::create_ref`]: persist a fragment (idempotent,
//!   content-addressed) and return a reference
//! - [`FragmentStore::load_ref`]: resolve a reference via cache then store
//! - [`FragmentStore::publish_root`] / [`FragmentStore::resolve_root`]:
//!   read/write a reference under a caller-chosen stable key

use crate::btree::node::{BtNode, DataNode, IndexNode};
use crate::cache::{CacheStats, FragmentCache, DEFAULT_CACHE_CAPACITY};
use crate::error::{Error, Result};
use crate::fid::Fid;
use crate::rbt::RbNode;
use crate::storage::ContentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// A persisted-or-persistable tree node
///
/// The variants have disjoint JSON shapes:
/// red-black nodes carry `color`/`left`/`key`/`right`, data nodes carry
/// `cfg`/`entries`, index nodes carry `cfg`/`children`/`ops`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    /// Red-black tree node
    Rb(RbNode),
    /// B-tree data (leaf) node
    Data(DataNode),
    /// B-tree index (internal) node
    Index(IndexNode),
}

impl Fragment {
    /// Canonical encoded form (the bytes the FID is derived from)
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and validate a fragment fetched from storage
    pub fn decode(bytes: &[u8]) -> Result<Fragment> {
        let fragment: Fragment = serde_json::from_slice(bytes)
            .map_err(|e| Error::store_inconsistent(format!("fragment failed to decode: {e}")))?;
        fragment.validate()?;
        Ok(fragment)
    }

    /// Content-derived identifier of this fragment
    pub fn fid(&self) -> Result<Fid> {
        Ok(Fid::from_content(&self.encode()?))
    }

    /// Structural checks applied to every loaded fragment
    fn validate(&self) -> Result<()> {
        match self {
            Fragment::Rb(_) => Ok(()),
            Fragment::Data(d) => d.validate(),
            Fragment::Index(ix) => ix.validate(),
        }
    }

    /// View as a red-black node, or fail with a store-inconsistency
    pub fn into_rb(self) -> Result<RbNode> {
        match self {
            Fragment::Rb(node) => Ok(node),
            other => Err(Error::store_inconsistent(format!(
                "expected a red-black fragment, found {}",
                other.kind_name()
            ))),
        }
    }

    /// View as a B-tree node (data or index), or fail
    pub fn into_bt(self) -> Result<BtNode> {
        match self {
            Fragment::Data(d) => Ok(BtNode::Data(d)),
            Fragment::Index(ix) => Ok(BtNode::Index(ix)),
            Fragment::Rb(_) => Err(Error::store_inconsistent(
                "expected a B-tree fragment, found a red-black node",
            )),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Fragment::Rb(_) => "a red-black node",
            Fragment::Data(_) => "a data node",
            Fragment::Index(_) => "an index node",
        }
    }
}

impl From<BtNode> for Fragment {
    fn from(node: BtNode) -> Self {
        match node {
            BtNode::Data(d) => Fragment::Data(d),
            BtNode::Index(ix) => Fragment::Index(ix),
        }
    }
}

impl From<RbNode> for Fragment {
    fn from(node: RbNode) -> Self {
        Fragment::Rb(node)
    }
}

/// Reference to a persisted fragment: a FID wrapped in the `#ref` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentRef {
    /// The identified fragment
    #[serde(rename = "#ref")]
    pub fid: Fid,
}

impl FragmentRef {
    /// Wrap a FID in the reference tag
    pub fn new(fid: Fid) -> Self {
        Self { fid }
    }
}

impl std::fmt::Display for FragmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#ref:{}", self.fid)
    }
}

/// A content store handle with its attached fragment cache
///
/// All tree operations take a `FragmentStore` parameter; the store itself
/// holds no tree state. Cache lifetime equals the handle's lifetime.
#[derive(Debug)]
pub struct FragmentStore<S> {
    store: S,
    cache: FragmentCache,
}

impl<S: ContentStore> FragmentStore<S> {
    /// Wrap a content store with a default-capacity cache
    pub fn new(store: S) -> Self {
        Self::with_cache_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap a content store with a cache bounded at `capacity` fragments
    pub fn with_cache_capacity(store: S, capacity: usize) -> Self {
        Self {
            store,
            cache: FragmentCache::new(capacity),
        }
    }

    /// Underlying content store
    pub fn storage(&self) -> &S {
        &self.store
    }

    /// Snapshot of the cache's hit/miss/eviction counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of fragments currently cached
    pub fn cached_fragments(&self) -> usize {
        self.cache.len()
    }

    /// Persist a fragment and return a reference to it
    ///
    /// Computes the fragment's FID; if the fragment is in neither the
    /// cache nor the durable store, writes it under the FID and fills the
    /// cache. Persisting the same content twice is idempotent and causes
    /// at most one durable write. A store failure propagates; the write
    /// never partially succeeds.
    pub async fn create_ref(&self, fragment: Fragment) -> Result<FragmentRef> {
        let bytes = fragment.encode()?;
        let fid = Fid::from_content(&bytes);
        if self.cache.get(&fid).is_none() {
            let key = fid.storage_key();
            if !self.store.exists(&key).await? {
                self.store.put(&key, &bytes).await?;
                trace!(%fid, bytes = bytes.len(), "persisted fragment");
            }
            self.cache.insert(fid, Arc::new(fragment));
        }
        Ok(FragmentRef::new(fid))
    }

    /// Resolve a reference to its fragment
    ///
    /// Consults the cache first; on miss, fetches from the durable store
    /// and fills the cache. A reference with no backing fragment means
    /// the index is corrupt and fails with
    /// [`Error::StoreInconsistent`].
    pub async fn load_ref(&self, reference: &FragmentRef) -> Result<Arc<Fragment>> {
        let fid = reference.fid;
        if let Some(fragment) = self.cache.get(&fid) {
            return Ok(fragment);
        }
        let bytes = self
            .store
            .get(&fid.storage_key())
            .await?
            .ok_or_else(|| {
                Error::store_inconsistent(format!("reference {fid} has no backing fragment"))
            })?;
        let fragment = Arc::new(Fragment::decode(&bytes)?);
        trace!(%fid, "loaded fragment");
        self.cache.insert(fid, fragment.clone());
        Ok(fragment)
    }

    /// Publish a root reference under a stable, caller-chosen key
    ///
    /// The key holds the serialized reference, not the fragment itself.
    /// Atomicity is the store's per-key write guarantee; callers that
    /// need linearizable history must serialize their publications.
    pub async fn publish_root(&self, name: &str, reference: &FragmentRef) -> Result<()> {
        let bytes = serde_json::to_vec(reference)?;
        self.store.put(name, &bytes).await
    }

    /// Read back a previously published root reference
    pub async fn resolve_root(&self, name: &str) -> Result<Option<FragmentRef>> {
        match self.store.get(name).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                Error::store_inconsistent(format!("root key {name:?} does not hold a reference: {e}"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::value::Scalar;

    fn store() -> FragmentStore<MemoryStore> {
        FragmentStore::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_create_then_load_round_trip() {
        let store = store();
        let fragment = Fragment::Rb(RbNode::singleton(Scalar::Long(7)));

        let reference = store.create_ref(fragment.clone()).await.unwrap();
        let loaded = store.load_ref(&reference).await.unwrap();
        assert_eq!(*loaded, fragment);
    }

    #[tokio::test]
    async fn test_create_ref_idempotent() {
        let store = store();
        let fragment = Fragment::Rb(RbNode::singleton(Scalar::Long(7)));

        let r1 = store.create_ref(fragment.clone()).await.unwrap();
        let r2 = store.create_ref(fragment).await.unwrap();
        assert_eq!(r1, r2);
        // one fragment key in the underlying store
        assert_eq!(store.storage().len(), 1);
    }

    #[tokio::test]
    async fn test_dangling_reference_is_inconsistency() {
        let store = store();
        let reference = FragmentRef::new(Fid::from_content(b"never persisted"));
        let err = store.load_ref(&reference).await.unwrap_err();
        assert!(matches!(err, Error::StoreInconsistent(_)));
    }

    #[tokio::test]
    async fn test_reference_wire_tag() {
        let store = store();
        let reference = store
            .create_ref(Fragment::Rb(RbNode::singleton(Scalar::Long(1))))
            .await
            .unwrap();
        let json = serde_json::to_value(reference).unwrap();
        assert_eq!(json["#ref"], reference.fid.to_string());
    }

    #[tokio::test]
    async fn test_publish_and_resolve_root() {
        let store = store();
        let reference = store
            .create_ref(Fragment::Rb(RbNode::singleton(Scalar::Long(1))))
            .await
            .unwrap();

        assert_eq!(store.resolve_root("root").await.unwrap(), None);
        store.publish_root("root", &reference).await.unwrap();
        assert_eq!(store.resolve_root("root").await.unwrap(), Some(reference));
    }

    #[tokio::test]
    async fn test_garbage_fragment_fails_decode() {
        let store = store();
        let fid = Fid::from_content(b"junk");
        store
            .storage()
            .put(&fid.storage_key(), b"{\"what\": true}")
            .await
            .unwrap();
        let err = store.load_ref(&FragmentRef::new(fid)).await.unwrap_err();
        assert!(matches!(err, Error::StoreInconsistent(_)));
    }
}
