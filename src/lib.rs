//! # canopy-db
//!
//! Durable persistent ordered-map indices over a minimal external
//! key-value store.
//!
//! The crate maintains balanced search trees (a red-black tree and a
//! B-tree) whose nodes are **content-addressed fragments**, paged in and
//! out of durable storage on demand through a bounded LRU cache. Every
//! mutation builds fresh fragments and returns a new root reference;
//! publishing that reference under a stable key gives the index the
//! semantics of a versioned, immutable-by-default container with
//! arbitrarily large working sets.
//!
//! ## Design principles
//!
//! 1. **Async at the I/O seam only**: the sole suspension points are
//!    [`ContentStore`] calls; comparisons and balancing are synchronous.
//! 2. **Immutable fragments**: persisted nodes are never updated in
//!    place, so concurrent readers of old roots are always safe and a
//!    cache hit is observationally equivalent to a store fetch.
//! 3. **Store handle owns its cache**: no global state; multiple
//!    independently cached stores can coexist in one process.
//!
//! ## Example
//!
//! ```ignore
//! use canopy_db::prelude::*;
//!
//! let store = FragmentStore::new(MemoryStore::new());
//! let root = bt_new(&store, BtreeConfig::default()).await?;
//! let root = bt_insert(&store, &root, 1i64.into(), "one".into()).await?;
//! store.publish_root("root", &root).await?;
//! assert_eq!(bt_lookup(&store, &root, &1i64.into()).await?, Some("one".into()));
//! ```

pub mod btree;
pub mod cache;
pub mod error;
pub mod fid;
pub mod fragment;
pub mod rbt;
pub mod storage;
pub mod value;

// Re-export main types
pub use btree::{
    bt_delete, bt_forward, bt_insert, bt_lookup, bt_new, BtChild, BtNode, BtreeConfig, DataNode,
    ForwardIter, IndexNode, Path,
};
pub use cache::{CacheStats, FragmentCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Error, Result};
pub use fid::Fid;
pub use fragment::{Fragment, FragmentRef, FragmentStore};
pub use rbt::{rb_find, rb_insert, rb_range, Color, RbChild, RbNode};
pub use storage::{ContentStore, MemoryStore};
#[cfg(feature = "native")]
pub use storage::FileStore;
pub use value::Scalar;

/// Prelude for convenient imports of the store traits and tree operations
pub mod prelude {
    pub use crate::btree::{
        bt_delete, bt_forward, bt_insert, bt_lookup, bt_new, BtreeConfig, ForwardIter,
    };
    pub use crate::error::{Error, Result};
    pub use crate::fragment::{Fragment, FragmentRef, FragmentStore};
    pub use crate::rbt::{rb_find, rb_insert, rb_range, RbChild};
    pub use crate::storage::{ContentStore, MemoryStore};
    #[cfg(feature = "native")]
    pub use crate::storage::FileStore;
    pub use crate::value::Scalar;
}
