use types::primitives::{Epoch, Gwei, Slot, H256};

/// Signed change to the attesting weight of a block, in gwei.
pub type Difference = i64;

/// One block in the arena.
///
/// `parent`, `best_child` and `best_descendant` are arena indices rather than
/// references. Indices are assigned in insertion order and stay valid for the
/// lifetime of the store.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProtoNode {
    pub slot: Slot,
    pub root: H256,
    pub parent: Option<usize>,
    /// Justified epoch declared by the block when it was inserted.
    pub justified_epoch: Epoch,
    /// Finalized epoch declared by the block when it was inserted.
    pub finalized_epoch: Epoch,
    /// Cumulative attesting weight of the subtree rooted at this node.
    pub weight: Gwei,
    /// Child currently favored by the fork choice rule.
    pub best_child: Option<usize>,
    /// Leaf reached by following `best_child` links.
    /// The head candidate for this node's subtree.
    pub best_descendant: Option<usize>,
}
