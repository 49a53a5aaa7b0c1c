//! B-tree configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Branching configuration, carried inside every persisted B-tree node
/// so that a loaded node knows its own invariants.
///
/// A node with bound `b` holds between `b` and `2b - 1` entries (the root
/// is exempt from the lower bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtreeConfig {
    /// Minimum children per index node
    ///
    /// Index nodes split when they reach `2 * index_b` children.
    /// Default: 100
    pub index_b: usize,

    /// Minimum entries per data node
    ///
    /// Data nodes split when they reach `2 * data_b` entries.
    /// Default: 100
    pub data_b: usize,

    /// Capacity reserved for the per-node operation buffer
    ///
    /// The buffer is carried for write-optimized extensions; the core
    /// preserves it across load/split/merge but never populates it.
    /// Default: 5
    pub op_buf_size: usize,
}

impl Default for BtreeConfig {
    fn default() -> Self {
        Self {
            index_b: 100,
            data_b: 100,
            op_buf_size: 5,
        }
    }
}

impl BtreeConfig {
    /// Create a configuration with explicit bounds
    pub fn new(index_b: usize, data_b: usize, op_buf_size: usize) -> Self {
        Self {
            index_b,
            data_b,
            op_buf_size,
        }
    }

    /// Small fan-out, useful for exercising splits and merges in tests
    pub fn small() -> Self {
        Self {
            index_b: 4,
            data_b: 4,
            op_buf_size: 2,
        }
    }

    /// Large fan-out for bulk workloads
    pub fn large() -> Self {
        Self {
            index_b: 500,
            data_b: 500,
            op_buf_size: 5,
        }
    }

    /// Builder method to set the index-node bound
    pub fn with_index_b(mut self, index_b: usize) -> Self {
        self.index_b = index_b;
        self
    }

    /// Builder method to set the data-node bound
    pub fn with_data_b(mut self, data_b: usize) -> Self {
        self.data_b = data_b;
        self
    }

    /// Builder method to set the op-buffer capacity
    pub fn with_op_buf_size(mut self, op_buf_size: usize) -> Self {
        self.op_buf_size = op_buf_size;
        self
    }

    /// Check the bounds are usable
    ///
    /// `b < 2` cannot satisfy the `[b, 2b - 1]` occupancy window across
    /// splits and merges.
    pub fn validate(&self) -> Result<()> {
        if self.index_b < 2 || self.data_b < 2 {
            return Err(Error::invariant_violation(
                "index_b and data_b must be at least 2",
            ));
        }
        Ok(())
    }
}
