//! Invariant verification and snapshots
//!
//! External auditors read nodes by handle and re-check the structural
//! invariants: AVL balance, strict BST ordering, height freshness, and
//! root/emptiness agreement. A corrupted tree must fail loudly here
//! rather than be persisted or restored.

use thiserror::Error;

use crate::arena::{Arena, Handle};
use crate::tree::{AvlTree, Node};
use crate::{TreeConfig, TreeError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A structural invariant that failed verification
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuditViolation {
    /// Balance factor outside [-1, 1]
    #[error("node {handle} has balance factor {balance}, outside [-1, 1]")]
    Unbalanced {
        /// Offending node
        handle: Handle,
        /// Its computed balance factor
        balance: i64,
    },

    /// A key placed outside the range its ancestors allow
    #[error("node {handle} with key {key} violates BST ordering")]
    OutOfOrder {
        /// Offending node
        handle: Handle,
        /// Its key
        key: u64,
    },

    /// Stored height disagrees with the recomputed height
    #[error("node {handle} stores height {stored}, recomputed {computed}")]
    StaleHeight {
        /// Offending node
        handle: Handle,
        /// Height recorded on the node
        stored: u32,
        /// Height recomputed from its subtrees
        computed: u32,
    },

    /// Root sentinel and node count disagree
    #[error("root {root} inconsistent with {nodes} stored nodes")]
    RootMismatch {
        /// Current root handle
        root: Handle,
        /// Number of stored nodes
        nodes: usize,
    },

    /// Stored nodes not reachable from the root
    #[error("{reachable} nodes reachable from root, {stored} stored")]
    Unreachable {
        /// Nodes found by walking from the root
        reachable: usize,
        /// Nodes held in the arena
        stored: usize,
    },

    /// Snapshot counter does not match its node table
    #[error("snapshot next_handle {next_handle} does not fit {nodes} nodes")]
    CounterMismatch {
        /// Counter carried by the snapshot
        next_handle: u32,
        /// Number of nodes in the snapshot
        nodes: usize,
    },

    /// A child handle failed to resolve during the walk
    #[error(transparent)]
    Storage(#[from] TreeError),
}

/// Summary of a successful verification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditReport {
    /// Nodes reachable from the root
    pub nodes: usize,
    /// Verified tree height
    pub height: u32,
}

impl AuditReport {
    /// Theoretical AVL height bound, 1.45 * log2(n + 2)
    pub fn height_bound(&self) -> f64 {
        1.45 * ((self.nodes + 2) as f64).log2()
    }

    /// Whether the verified height respects the theoretical bound
    pub fn within_height_bound(&self) -> bool {
        f64::from(self.height) <= self.height_bound()
    }
}

/// Verify every structural invariant of `tree`
///
/// Walks all reachable nodes; O(n). Returns the first violation found,
/// with the offending handle attached.
pub fn verify(tree: &AvlTree) -> Result<AuditReport, AuditViolation> {
    if tree.root().is_empty() != (tree.len() == 0) {
        return Err(AuditViolation::RootMismatch {
            root: tree.root(),
            nodes: tree.len(),
        });
    }

    let (height, reachable) = check_subtree(tree, tree.root(), None, None)?;
    if reachable != tree.len() {
        return Err(AuditViolation::Unreachable {
            reachable,
            stored: tree.len(),
        });
    }

    Ok(AuditReport {
        nodes: reachable,
        height,
    })
}

/// Check one subtree against the open key interval (lower, upper);
/// returns its recomputed height and node count
///
/// The intervals nest strictly, so a handle cycle re-enters a node
/// whose key its own descent has excluded and fails the ordering
/// check instead of looping.
fn check_subtree(
    tree: &AvlTree,
    handle: Handle,
    lower: Option<u64>,
    upper: Option<u64>,
) -> Result<(u32, usize), AuditViolation> {
    if handle.is_empty() {
        return Ok((0, 0));
    }

    let node = tree.node(handle)?;
    let below_lower = lower.is_some_and(|bound| node.key <= bound);
    let above_upper = upper.is_some_and(|bound| node.key >= bound);
    if below_lower || above_upper {
        return Err(AuditViolation::OutOfOrder {
            handle,
            key: node.key,
        });
    }

    let (left_height, left_count) = check_subtree(tree, node.left, lower, Some(node.key))?;
    let (right_height, right_count) = check_subtree(tree, node.right, Some(node.key), upper)?;

    let computed = 1 + left_height.max(right_height);
    if node.height != computed {
        return Err(AuditViolation::StaleHeight {
            handle,
            stored: node.height,
            computed,
        });
    }

    let balance = i64::from(left_height) - i64::from(right_height);
    if !(-1..=1).contains(&balance) {
        return Err(AuditViolation::Unbalanced { handle, balance });
    }

    Ok((computed, 1 + left_count + right_count))
}

/// Persisted tree state: root handle, handle counter, full node table
///
/// Node `#h` sits at `nodes[h - 1]`, in mint order. This is the whole
/// state needed to rebuild the tree deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeSnapshot {
    /// Root handle at capture time
    pub root: Handle,
    /// Handle the next insertion would mint
    pub next_handle: u32,
    /// All nodes, indexed by handle minus one
    pub nodes: Vec<Node>,
}

impl TreeSnapshot {
    /// Export the persisted state of `tree`
    pub fn capture(tree: &AvlTree) -> Self {
        Self {
            root: tree.root(),
            next_handle: tree.arena().next_handle(),
            nodes: tree.arena().iter().map(|(_, node)| *node).collect(),
        }
    }

    /// Rebuild a tree from persisted state, verifying invariants first
    ///
    /// A snapshot that fails verification is rejected wholesale; a
    /// corrupt tree must not come back to life.
    pub fn restore(self, config: TreeConfig) -> Result<AvlTree, AuditViolation> {
        let nodes = self.nodes.len();
        let arena = Arena::from_parts(self.nodes, self.next_handle).ok_or(
            AuditViolation::CounterMismatch {
                next_handle: self.next_handle,
                nodes,
            },
        )?;

        let tree = AvlTree::from_parts(arena, self.root, config);
        verify(&tree)?;
        Ok(tree)
    }
}
