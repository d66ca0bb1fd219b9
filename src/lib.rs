//! # Arena-Indexed AVL Tree Store
//!
//! This library implements a self-balancing binary search tree (AVL)
//! over unsigned integer keys, with node storage addressed by stable
//! integer handles instead of memory pointers.
//!
//! ## Core design
//!
//! 1. **Handle/arena storage**: Nodes live in an append-only arena and
//!    reference each other by [`Handle`]; handle 0 is the reserved
//!    empty sentinel and handles are never reused
//! 2. **Descend-then-rebalance insertion**: Heights are recomputed and
//!    rotations applied bottom-up while the recursion unwinds
//! 3. **Auditability**: Any external component can read nodes by handle
//!    and re-check the balance and ordering invariants via [`audit`]
//!
//! Result: O(log n) insert and search, with a tree shape that can be
//! exported, persisted, and independently verified.
//!
//! ## Usage Example
//!
//! ```
//! use alder::{AvlTree, Handle};
//!
//! let mut tree = AvlTree::new();
//! assert_eq!(tree.root(), Handle::EMPTY);
//!
//! tree.insert(50)?;
//! tree.insert(40)?;
//! assert!(tree.search(50));
//! assert!(!tree.search(41));
//! # Ok::<(), alder::TreeError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules - each implements one layer of the store
pub mod arena; // Handle minting and append-only node storage
pub mod audit; // Invariant verification and snapshots
pub mod tree; // The AVL tree: insert, search, rotations

// Re-exports for convenience
pub use arena::{Arena, Handle};
pub use audit::{AuditReport, AuditViolation, TreeSnapshot};
pub use tree::{AvlTree, InOrderIter, InsertOutcome, Node};

use thiserror::Error;

/// Configuration parameters for a tree instance
///
/// Each tree is an explicitly constructed instance with its own arena
/// and counters; there is no shared global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeConfig {
    /// What `insert` does when the key is already present
    pub duplicate_policy: DuplicatePolicy,
}

impl TreeConfig {
    /// Configuration that reports duplicate inserts as errors
    pub fn rejecting_duplicates() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

/// Behavior of `insert` for a key that is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Leave the tree untouched and report the existing node (default)
    #[default]
    Ignore,
    /// Fail the call with [`TreeError::DuplicateKey`]
    Reject,
}

/// Errors reported by tree operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// A handle did not resolve to a stored node
    ///
    /// Handles are only minted by the owning arena, so this indicates
    /// an internal-consistency violation; the mutating call aborts
    /// instead of persisting a corrupt tree.
    #[error("invalid handle {0}: no node stored at this slot")]
    InvalidHandle(Handle),

    /// Key already present, under [`DuplicatePolicy::Reject`]
    #[error("duplicate key {0}")]
    DuplicateKey(u64),

    /// Handle space is exhausted
    #[error("handle space exhausted after {0} nodes")]
    CapacityExhausted(usize),
}
