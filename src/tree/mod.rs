//! Self-balancing AVL tree over arena-stored nodes
//!
//! Insertion descends to the leaf position, then recomputes heights
//! and applies rotations bottom-up while the recursion unwinds. The
//! balance factor `height(left) - height(right)` stays within [-1, 1]
//! at every node, so all descents are O(log n).

mod node;
mod traversal;

pub use node::Node;
pub use traversal::InOrderIter;

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::arena::{Arena, Handle};
use crate::{DuplicatePolicy, TreeConfig, TreeError};

/// Result of a successful `insert` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A fresh node was created under this handle
    Inserted(Handle),
    /// The key was already present; the tree is unchanged
    Duplicate(Handle),
}

impl InsertOutcome {
    /// Handle of the node holding the key, fresh or pre-existing
    pub fn handle(self) -> Handle {
        match self {
            InsertOutcome::Inserted(handle) | InsertOutcome::Duplicate(handle) => handle,
        }
    }

    /// Whether a fresh node was created
    pub fn is_inserted(self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// AVL tree keyed by `u64`, with nodes addressed by stable handles
///
/// The empty tree has `root() == Handle::EMPTY`. Nodes are created
/// only by insertion and never destroyed, so every handle handed out
/// stays resolvable for the tree's lifetime.
#[derive(Debug, Clone)]
pub struct AvlTree {
    arena: Arena<Node>,
    root: Handle,
    config: TreeConfig,
}

impl AvlTree {
    /// Create an empty tree with the default configuration
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create an empty tree with an explicit configuration
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            arena: Arena::new(),
            root: Handle::EMPTY,
            config,
        }
    }

    /// Current root handle ([`Handle::EMPTY`] iff the tree is empty)
    pub fn root(&self) -> Handle {
        self.root
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the tree holds no keys
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Height of the whole tree (0 when empty)
    pub fn height(&self) -> u32 {
        self.node(self.root).map(|node| node.height).unwrap_or(0)
    }

    /// Read a node by handle
    ///
    /// This is the auditor surface: external components reconstruct
    /// and verify tree shape by chasing child handles from [`root`].
    ///
    /// [`root`]: AvlTree::root
    pub fn node(&self, handle: Handle) -> Result<&Node, TreeError> {
        self.arena.get(handle)
    }

    /// Insert `key`, rebalancing as needed
    ///
    /// The root handle may change when a rotation happens at the top
    /// of the tree. Under [`DuplicatePolicy::Ignore`] re-inserting a
    /// present key is a no-op reported as `Duplicate`; under
    /// [`DuplicatePolicy::Reject`] it fails with
    /// [`TreeError::DuplicateKey`] and the tree is left untouched.
    pub fn insert(&mut self, key: u64) -> Result<InsertOutcome, TreeError> {
        if self.root.is_empty() {
            let handle = self.arena.mint(Node::leaf(key))?;
            self.root = handle;
            debug!(key, node = %handle, "inserted first node");
            return Ok(InsertOutcome::Inserted(handle));
        }

        let (new_root, outcome) = self.insert_at(self.root, key)?;
        self.root = new_root;
        debug!(key, node = %outcome.handle(), fresh = outcome.is_inserted(), "insert done");
        Ok(outcome)
    }

    /// Whether `key` is present; pure read, O(height)
    pub fn search(&self, key: u64) -> bool {
        self.find(key).is_some()
    }

    /// Handle of the node holding `key`, if present
    pub fn find(&self, key: u64) -> Option<Handle> {
        let mut current = self.root;
        while !current.is_empty() {
            let node = self.arena.get(current).ok()?;
            current = match key.cmp(&node.key) {
                Ordering::Equal => return Some(current),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }

    /// Smallest stored key
    pub fn min(&self) -> Option<u64> {
        self.extremum(|node| node.left)
    }

    /// Largest stored key
    pub fn max(&self) -> Option<u64> {
        self.extremum(|node| node.right)
    }

    /// In-order traversal yielding `(handle, key)` in ascending key
    /// order; used to verify BST ordering
    pub fn iter_in_order(&self) -> InOrderIter<'_> {
        InOrderIter::new(self)
    }

    pub(crate) fn arena(&self) -> &Arena<Node> {
        &self.arena
    }

    pub(crate) fn from_parts(arena: Arena<Node>, root: Handle, config: TreeConfig) -> Self {
        Self {
            arena,
            root,
            config,
        }
    }

    // Follow one child direction to the end of the spine.
    fn extremum(&self, next: impl Fn(&Node) -> Handle) -> Option<u64> {
        let mut current = self.root;
        let mut key = None;
        while !current.is_empty() {
            let node = self.arena.get(current).ok()?;
            key = Some(node.key);
            current = next(node);
        }
        key
    }

    /// Recursive descent; returns the subtree's new root handle after
    /// rebalancing, which the caller re-links into its own child slot
    fn insert_at(&mut self, handle: Handle, key: u64) -> Result<(Handle, InsertOutcome), TreeError> {
        let current = self.arena.get(handle)?;
        let (node_key, left, right) = (current.key, current.left, current.right);

        let outcome = match key.cmp(&node_key) {
            Ordering::Equal => match self.config.duplicate_policy {
                DuplicatePolicy::Ignore => {
                    return Ok((handle, InsertOutcome::Duplicate(handle)));
                }
                DuplicatePolicy::Reject => return Err(TreeError::DuplicateKey(key)),
            },
            Ordering::Less => {
                if left.is_empty() {
                    let child = self.arena.mint(Node::leaf(key))?;
                    self.arena.get_mut(handle)?.left = child;
                    InsertOutcome::Inserted(child)
                } else {
                    let (subroot, outcome) = self.insert_at(left, key)?;
                    if let InsertOutcome::Duplicate(_) = outcome {
                        return Ok((handle, outcome));
                    }
                    self.arena.get_mut(handle)?.left = subroot;
                    outcome
                }
            }
            Ordering::Greater => {
                if right.is_empty() {
                    let child = self.arena.mint(Node::leaf(key))?;
                    self.arena.get_mut(handle)?.right = child;
                    InsertOutcome::Inserted(child)
                } else {
                    let (subroot, outcome) = self.insert_at(right, key)?;
                    if let InsertOutcome::Duplicate(_) = outcome {
                        return Ok((handle, outcome));
                    }
                    self.arena.get_mut(handle)?.right = subroot;
                    outcome
                }
            }
        };

        self.update_height(handle)?;
        let new_root = self.rebalance(handle)?;
        Ok((new_root, outcome))
    }

    /// Restore the balance invariant at `handle` after an insertion
    /// below it; returns the handle now rooting this subtree
    fn rebalance(&mut self, handle: Handle) -> Result<Handle, TreeError> {
        let balance = self.balance_of(handle)?;
        if (-1..=1).contains(&balance) {
            return Ok(handle);
        }

        if balance > 1 {
            let left = self.arena.get(handle)?.left;
            if self.balance_of(left)? >= 0 {
                trace!(node = %handle, "left-left case, single right rotation");
                self.rotate_right(handle)
            } else {
                trace!(node = %handle, "left-right case, double rotation");
                let new_left = self.rotate_left(left)?;
                self.arena.get_mut(handle)?.left = new_left;
                self.rotate_right(handle)
            }
        } else {
            let right = self.arena.get(handle)?.right;
            if self.balance_of(right)? <= 0 {
                trace!(node = %handle, "right-right case, single left rotation");
                self.rotate_left(handle)
            } else {
                trace!(node = %handle, "right-left case, double rotation");
                let new_right = self.rotate_right(right)?;
                self.arena.get_mut(handle)?.right = new_right;
                self.rotate_left(handle)
            }
        }
    }

    /// Right rotation: the left child becomes the subtree root
    ///
    /// Heights are recomputed demoted-node-first, since the old root
    /// now sits below its former child.
    fn rotate_right(&mut self, handle: Handle) -> Result<Handle, TreeError> {
        let pivot = self.arena.get(handle)?.left;
        let carry = self.arena.get(pivot)?.right;

        self.arena.get_mut(handle)?.left = carry;
        self.arena.get_mut(pivot)?.right = handle;

        self.update_height(handle)?;
        self.update_height(pivot)?;
        Ok(pivot)
    }

    /// Left rotation: mirror of [`rotate_right`](AvlTree::rotate_right)
    fn rotate_left(&mut self, handle: Handle) -> Result<Handle, TreeError> {
        let pivot = self.arena.get(handle)?.right;
        let carry = self.arena.get(pivot)?.left;

        self.arena.get_mut(handle)?.right = carry;
        self.arena.get_mut(pivot)?.left = handle;

        self.update_height(handle)?;
        self.update_height(pivot)?;
        Ok(pivot)
    }

    fn update_height(&mut self, handle: Handle) -> Result<(), TreeError> {
        let node = self.arena.get(handle)?;
        let (left, right) = (node.left, node.right);
        let height = 1 + self.height_of(left)?.max(self.height_of(right)?);
        self.arena.get_mut(handle)?.height = height;
        Ok(())
    }

    /// Height of a possibly-empty subtree; the sentinel has height 0
    /// so balance arithmetic at leaf level stays well-defined
    fn height_of(&self, handle: Handle) -> Result<u32, TreeError> {
        if handle.is_empty() {
            Ok(0)
        } else {
            Ok(self.arena.get(handle)?.height)
        }
    }

    fn balance_of(&self, handle: Handle) -> Result<i64, TreeError> {
        let node = self.arena.get(handle)?;
        Ok(i64::from(self.height_of(node.left)?) - i64::from(self.height_of(node.right)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_in_order(tree: &AvlTree) -> Vec<u64> {
        tree.iter_in_order().map(|(_, key)| key).collect()
    }

    #[test]
    fn test_first_insert_sets_root() {
        let mut tree = AvlTree::new();
        let outcome = tree.insert(50).unwrap();

        assert!(outcome.is_inserted());
        assert_eq!(tree.root(), outcome.handle());
        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.key, 50);
        assert_eq!(root.height, 1);
    }

    #[test]
    fn test_left_child_without_rotation() {
        let mut tree = AvlTree::new();
        tree.insert(50).unwrap();
        let root_before = tree.root();
        tree.insert(40).unwrap();

        assert_eq!(tree.root(), root_before);
        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.key, 50);
        assert_eq!(root.height, 2);
        assert_eq!(tree.node(root.left).unwrap().key, 40);
        assert!(root.right.is_empty());
    }

    #[test]
    fn test_decreasing_run_triggers_right_rotation() {
        let mut tree = AvlTree::new();
        for key in [50, 40, 30] {
            tree.insert(key).unwrap();
        }

        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.key, 40);
        assert_eq!(root.height, 2);
        assert_eq!(tree.node(root.left).unwrap().key, 30);
        assert_eq!(tree.node(root.right).unwrap().key, 50);
    }

    #[test]
    fn test_increasing_run_triggers_left_rotation() {
        let mut tree = AvlTree::new();
        for key in [30, 40, 50] {
            tree.insert(key).unwrap();
        }

        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.key, 40);
        assert_eq!(tree.node(root.left).unwrap().key, 30);
        assert_eq!(tree.node(root.right).unwrap().key, 50);
    }

    #[test]
    fn test_left_right_double_rotation() {
        let mut tree = AvlTree::new();
        for key in [10, 20, 15] {
            tree.insert(key).unwrap();
        }

        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.key, 15);
        assert_eq!(tree.node(root.left).unwrap().key, 10);
        assert_eq!(tree.node(root.right).unwrap().key, 20);
    }

    #[test]
    fn test_right_left_double_rotation() {
        let mut tree = AvlTree::new();
        for key in [20, 10, 15] {
            tree.insert(key).unwrap();
        }

        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.key, 15);
        assert_eq!(tree.node(root.left).unwrap().key, 10);
        assert_eq!(tree.node(root.right).unwrap().key, 20);
    }

    #[test]
    fn test_duplicate_is_noop_by_default() {
        let mut tree = AvlTree::new();
        tree.insert(50).unwrap();
        tree.insert(40).unwrap();
        let root_before = tree.root();
        let len_before = tree.len();

        let outcome = tree.insert(40).unwrap();

        assert!(!outcome.is_inserted());
        assert_eq!(outcome.handle(), tree.find(40).unwrap());
        assert_eq!(tree.root(), root_before);
        assert_eq!(tree.len(), len_before);
    }

    #[test]
    fn test_duplicate_rejected_under_reject_policy() {
        let mut tree = AvlTree::with_config(TreeConfig::rejecting_duplicates());
        tree.insert(50).unwrap();

        assert_eq!(tree.insert(50), Err(TreeError::DuplicateKey(50)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_search_and_find() {
        let mut tree = AvlTree::new();
        for key in [8, 3, 10, 1, 6, 14, 4, 7, 13] {
            tree.insert(key).unwrap();
        }

        for key in [8, 3, 10, 1, 6, 14, 4, 7, 13] {
            assert!(tree.search(key), "key {key} should be present");
        }
        for key in [0, 2, 5, 9, 11, 12, 15, u64::MAX] {
            assert!(!tree.search(key), "key {key} should be absent");
        }
        assert!(tree.find(6).is_some());
        assert!(tree.find(5).is_none());
    }

    #[test]
    fn test_min_max() {
        let mut tree = AvlTree::new();
        assert_eq!(tree.min(), None);
        assert_eq!(tree.max(), None);

        for key in [8, 3, 10, 1, 14] {
            tree.insert(key).unwrap();
        }
        assert_eq!(tree.min(), Some(1));
        assert_eq!(tree.max(), Some(14));
    }

    #[test]
    fn test_in_order_is_sorted() {
        let mut tree = AvlTree::new();
        for key in [9, 4, 14, 2, 7, 11, 17, 1, 3] {
            tree.insert(key).unwrap();
        }

        assert_eq!(keys_in_order(&tree), vec![1, 2, 3, 4, 7, 9, 11, 14, 17]);
    }
}
