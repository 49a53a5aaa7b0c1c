//! Forward iteration
//!
//! [`ForwardIter`] yields `(key, value)` pairs in ascending key order,
//! lazily: it drains the current data node and only then pages in the
//! next one via the right successor of its path.

use crate::btree::path::{right_successor, Path};
use crate::error::Result;
use crate::fragment::FragmentStore;
use crate::storage::ContentStore;
use crate::value::Scalar;

/// Lazy ascending cursor over a B-tree
pub struct ForwardIter<'a, S: ContentStore> {
    store: &'a FragmentStore<S>,
    path: Option<Path>,
    pos: usize,
}

impl<'a, S: ContentStore> ForwardIter<'a, S> {
    pub(crate) fn new(store: &'a FragmentStore<S>, path: Path, pos: usize) -> Self {
        Self {
            store,
            path: Some(path),
            pos,
        }
    }

    /// Next entry in ascending key order, or `None` when exhausted
    pub async fn next(&mut self) -> Result<Option<(Scalar, Scalar)>> {
        loop {
            let Some(path) = &self.path else {
                return Ok(None);
            };
            if self.pos < path.leaf.entries.len() {
                let entry = path.leaf.entries[self.pos].clone();
                self.pos += 1;
                return Ok(Some(entry));
            }
            let exhausted = self.path.take().expect("checked above");
            self.path = right_successor(self.store, exhausted).await?;
            self.pos = 0;
        }
    }

    /// Drain the cursor into a vector
    pub async fn collect_entries(mut self) -> Result<Vec<(Scalar, Scalar)>> {
        let mut out = Vec::new();
        while let Some(entry) = self.next().await? {
            out.push(entry);
        }
        Ok(out)
    }

    /// Drain the cursor, keeping keys only
    pub async fn collect_keys(mut self) -> Result<Vec<Scalar>> {
        let mut out = Vec::new();
        while let Some((key, _)) = self.next().await? {
            out.push(key);
        }
        Ok(out)
    }
}
