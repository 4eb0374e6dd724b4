use anyhow::{ensure, Result};
use hash_hasher::HashedMap;
use log::debug;
use tap::Pipe as _;
use types::{
    consts::GENESIS_EPOCH,
    primitives::{Epoch, Gwei, Slot, H256},
};

use crate::{
    error::Error,
    misc::{Difference, ProtoNode},
};

// Weights are surfaced in error messages at this scale.
const WEIGHT_DISPLAY_DIVISOR: Gwei = 10_000_000_000;

/// Arena of unfinalized blocks with cached head selection.
///
/// The store tracks one justified and one finalized epoch at a time. Subtrees
/// whose blocks declared a different pair are filtered out of head selection
/// until the tracked pair matches them again. [`GENESIS_EPOCH`] on the store
/// side matches any declared epoch.
pub struct Store {
    justified_epoch: Epoch,
    finalized_epoch: Epoch,
    finalized_root: H256,
    nodes: Vec<ProtoNode>,
    indices: HashedMap<H256, usize>,
}

impl Store {
    #[must_use]
    pub fn new(justified_epoch: Epoch, finalized_epoch: Epoch, finalized_root: H256) -> Self {
        Self {
            justified_epoch,
            finalized_epoch,
            finalized_root,
            nodes: vec![],
            indices: HashedMap::default(),
        }
    }

    #[must_use]
    pub const fn justified_epoch(&self) -> Epoch {
        self.justified_epoch
    }

    #[must_use]
    pub const fn finalized_epoch(&self) -> Epoch {
        self.finalized_epoch
    }

    #[must_use]
    pub const fn finalized_root(&self) -> H256 {
        self.finalized_root
    }

    #[must_use]
    pub fn nodes(&self) -> &[ProtoNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains_block(&self, block_root: H256) -> bool {
        self.indices.contains_key(&block_root)
    }

    #[must_use]
    pub fn node_index(&self, block_root: H256) -> Option<usize> {
        self.indices.get(&block_root).copied()
    }

    /// Adds a block to the arena. Inserting a known root changes nothing.
    ///
    /// An unknown or absent `parent_root` makes the new node a tree root.
    /// A resolved parent has its best child re-examined immediately: a fresh
    /// child with zero weight can still win the selection when the parent had
    /// no best child or its best child no longer leads to a viable head.
    pub fn insert(
        &mut self,
        slot: Slot,
        block_root: H256,
        parent_root: Option<H256>,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) {
        if self.contains_block(block_root) {
            debug!("block {block_root:?} is already in the fork choice store");
            return;
        }

        let node_index = self.nodes.len();
        let parent = parent_root.and_then(|parent_root| self.node_index(parent_root));

        self.nodes.push(ProtoNode {
            slot,
            root: block_root,
            parent,
            justified_epoch,
            finalized_epoch,
            weight: 0,
            best_child: None,
            best_descendant: None,
        });

        self.indices.insert(block_root, node_index);

        if let Some(parent_index) = parent {
            self.update_best_child_and_descendant(parent_index, node_index);
        }
    }

    /// Applies per-node weight changes and re-selects every parent's best
    /// child and best descendant.
    ///
    /// `deltas` must contain exactly one entry per arena node. The weight pass
    /// must finish for the whole arena before the selection pass examines
    /// sibling weights, so the two run as separate descending sweeps.
    pub fn apply_weight_changes(
        &mut self,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
        mut deltas: Vec<Difference>,
    ) -> Result<()> {
        ensure!(
            deltas.len() == self.nodes.len(),
            "there must be exactly one weight change per node \
             (changes: {}, nodes: {})",
            deltas.len(),
            self.nodes.len(),
        );

        if (self.justified_epoch, self.finalized_epoch) != (justified_epoch, finalized_epoch) {
            self.justified_epoch = justified_epoch;
            self.finalized_epoch = finalized_epoch;
        }

        // Children are processed before parents, so by the time a node is
        // reached its delta already includes the contributions of its subtree.
        for index in (0..self.nodes.len()).rev() {
            let delta = deltas[index];
            let node = &mut self.nodes[index];

            node.weight = node.weight.saturating_add_signed(delta);

            if let Some(parent_index) = node.parent {
                deltas[parent_index] += delta;
            }
        }

        for index in (0..self.nodes.len()).rev() {
            if let Some(parent_index) = self.nodes[index].parent {
                self.update_best_child_and_descendant(parent_index, index);
            }
        }

        Ok(())
    }

    /// Finds the head starting from the justified block.
    ///
    /// The candidate is the justified block's cached best descendant (or the
    /// justified block itself while it has none) and must agree with the
    /// epochs the store currently tracks.
    pub fn head(&self, justified_root: H256) -> Result<H256> {
        let justified_index = self
            .node_index(justified_root)
            .ok_or(Error::UnknownJustifiedRoot { justified_root })?;

        let justified_node = &self.nodes[justified_index];

        let best_descendant_index = justified_node.best_descendant.unwrap_or(justified_index);
        let best_node = &self.nodes[best_descendant_index];

        if !self.viable_for_head(best_node) {
            return Err(Error::HeadNotViable {
                slot: best_node.slot,
                scaled_weight: best_node.weight / WEIGHT_DISPLAY_DIVISOR,
                justified_epoch: best_node.justified_epoch,
                finalized_epoch: best_node.finalized_epoch,
                expected_justified_epoch: self.justified_epoch,
                expected_finalized_epoch: self.finalized_epoch,
            }
            .into());
        }

        best_node.root.pipe(Ok)
    }

    /// Re-examines `child_index` as a candidate for `parent_index`'s best
    /// child.
    ///
    /// The selection prefers, in order: leading to a viable head, heavier
    /// cumulative weight, larger root. Roots are compared over all 32 bytes.
    /// When neither the examined child nor the current best child leads to a
    /// viable head, the parent is left as it is.
    fn update_best_child_and_descendant(&mut self, parent_index: usize, child_index: usize) {
        let child = &self.nodes[child_index];
        let parent = &self.nodes[parent_index];

        let child_leads_to_viable_head = self.leads_to_viable_head(child);

        let to_child = (
            Some(child_index),
            Some(child.best_descendant.unwrap_or(child_index)),
        );
        let to_none = (None, None);
        let unchanged = (parent.best_child, parent.best_descendant);

        let (best_child, best_descendant) = match parent.best_child {
            Some(best_child_index) if best_child_index == child_index => {
                if child_leads_to_viable_head {
                    // Re-selecting the current best child refreshes the cached
                    // best descendant.
                    to_child
                } else {
                    to_none
                }
            }
            Some(best_child_index) => {
                let best_child_node = &self.nodes[best_child_index];

                match (
                    child_leads_to_viable_head,
                    self.leads_to_viable_head(best_child_node),
                ) {
                    (true, false) => to_child,
                    (false, _) => unchanged,
                    (true, true) => {
                        let child_wins = (child.weight, child.root)
                            > (best_child_node.weight, best_child_node.root);

                        if child_wins {
                            to_child
                        } else {
                            unchanged
                        }
                    }
                }
            }
            None => {
                if child_leads_to_viable_head {
                    to_child
                } else {
                    unchanged
                }
            }
        };

        let parent = &mut self.nodes[parent_index];
        parent.best_child = best_child;
        parent.best_descendant = best_descendant;
    }

    fn viable_for_head(&self, node: &ProtoNode) -> bool {
        let justified = self.justified_epoch == node.justified_epoch
            || self.justified_epoch == GENESIS_EPOCH;
        let finalized = self.finalized_epoch == node.finalized_epoch
            || self.finalized_epoch == GENESIS_EPOCH;

        justified && finalized
    }

    fn leads_to_viable_head(&self, node: &ProtoNode) -> bool {
        match node.best_descendant {
            Some(best_descendant_index) => {
                self.viable_for_head(&self.nodes[best_descendant_index])
            }
            None => self.viable_for_head(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use types::consts::ZERO_HASH;

    use super::*;

    const ROOT_1: H256 = H256::repeat_byte(1);
    const ROOT_2: H256 = H256::repeat_byte(2);
    const ROOT_3: H256 = H256::repeat_byte(3);

    #[test]
    fn test_accessors_track_store_state() {
        let mut store = Store::new(1, 1, ZERO_HASH);

        assert!(store.is_empty());
        assert_eq!(store.finalized_root(), ZERO_HASH);
        assert!(!store.contains_block(ROOT_1));

        store.insert(0, ZERO_HASH, None, 1, 1);
        store.insert(0, ROOT_1, Some(ZERO_HASH), 1, 1);

        assert!(!store.is_empty());
        assert_eq!(store.len(), 2);
        assert!(store.contains_block(ROOT_1));
        assert_eq!(store.justified_epoch(), 1);
        assert_eq!(store.finalized_epoch(), 1);

        store
            .apply_weight_changes(2, 1, vec![0, 0])
            .expect("delta count matches node count");

        assert_eq!(store.justified_epoch(), 2);
        assert_eq!(store.finalized_epoch(), 1);
    }

    #[test]
    fn test_insert_with_a_known_root_is_a_no_op() {
        let mut store = new_test_store();

        store.insert(0, ROOT_1, Some(ZERO_HASH), 1, 1);
        let before = store.nodes().to_vec();

        store.insert(5, ROOT_1, None, 2, 2);

        assert_eq!(store.len(), 2);
        assert_eq!(before, store.nodes());
    }

    #[test]
    fn test_insert_with_an_unknown_parent_starts_a_new_tree() {
        let mut store = new_test_store();

        store.insert(0, ROOT_1, Some(ROOT_3), 1, 1);

        let index = store.node_index(ROOT_1).expect("block was just inserted");

        assert_eq!(store.nodes()[index].parent, None);
    }

    #[test]
    fn test_insert_immediately_adopts_a_fresh_child() {
        let mut store = new_test_store();

        store.insert(0, ROOT_1, Some(ZERO_HASH), 1, 1);

        let genesis = &store.nodes()[0];

        assert_eq!(genesis.best_child, Some(1));
        assert_eq!(genesis.best_descendant, Some(1));
    }

    #[test]
    fn test_insert_fills_in_for_a_non_viable_best_child() {
        let mut store = new_test_store();

        store.insert(0, ROOT_1, Some(ZERO_HASH), 1, 1);

        // Justification moves on and the only child becomes non-viable.
        store
            .apply_weight_changes(2, 1, vec![0, 0])
            .expect("delta count matches node count");

        assert_eq!(store.nodes()[0].best_child, None);

        store.insert(0, ROOT_2, Some(ZERO_HASH), 2, 1);

        assert_eq!(store.nodes()[0].best_child, Some(2));
        assert_eq!(store.nodes()[0].best_descendant, Some(2));
    }

    #[test]
    fn test_apply_weight_changes_requires_one_delta_per_node() {
        let mut store = new_test_store();

        assert!(store.apply_weight_changes(1, 1, vec![]).is_err());
        assert!(store.apply_weight_changes(1, 1, vec![0, 0]).is_err());
        assert!(store.apply_weight_changes(1, 1, vec![0]).is_ok());
    }

    #[test]
    fn test_weight_subtraction_saturates_at_zero() {
        let mut store = new_test_store();

        store
            .apply_weight_changes(1, 1, vec![5])
            .expect("delta count matches node count");

        assert_eq!(store.nodes()[0].weight, 5);

        store
            .apply_weight_changes(1, 1, vec![-8])
            .expect("delta count matches node count");

        assert_eq!(store.nodes()[0].weight, 0);
    }

    #[test]
    fn test_deltas_accumulate_toward_the_root() {
        let mut store = new_test_store();

        store.insert(0, ROOT_1, Some(ZERO_HASH), 1, 1);
        store.insert(0, ROOT_2, Some(ROOT_1), 1, 1);

        store
            .apply_weight_changes(1, 1, vec![0, 2, 7])
            .expect("delta count matches node count");

        assert_eq!(store.nodes()[2].weight, 7);
        assert_eq!(store.nodes()[1].weight, 9);
        assert_eq!(store.nodes()[0].weight, 9);
    }

    #[test]
    fn test_an_epoch_change_reclassifies_viability() {
        let mut store = new_test_store();

        store.insert(0, ROOT_1, Some(ZERO_HASH), 1, 1);

        store
            .apply_weight_changes(2, 1, vec![0, 0])
            .expect("delta count matches node count");

        assert_eq!(store.nodes()[0].best_child, None);
        assert_eq!(store.nodes()[0].best_descendant, None);

        store
            .apply_weight_changes(1, 1, vec![0, 0])
            .expect("delta count matches node count");

        assert_eq!(store.nodes()[0].best_child, Some(1));
        assert_eq!(store.nodes()[0].best_descendant, Some(1));
    }

    #[test]
    fn test_head_with_an_unknown_justified_root_fails() {
        let store = new_test_store();

        let error = store
            .head(ROOT_3)
            .expect_err("the root was never inserted")
            .downcast::<Error>()
            .expect("fork choice failures carry a fork choice error");

        assert_eq!(
            error,
            Error::UnknownJustifiedRoot {
                justified_root: ROOT_3,
            },
        );
    }

    #[test]
    fn test_head_with_a_non_viable_candidate_fails() {
        let mut store = Store::new(1, 1, ZERO_HASH);

        store.insert(3, ZERO_HASH, None, 2, 2);

        store
            .apply_weight_changes(1, 1, vec![25_000_000_000])
            .expect("delta count matches node count");

        let error = store
            .head(ZERO_HASH)
            .expect_err("the candidate declared later epochs than the store tracks")
            .downcast::<Error>()
            .expect("fork choice failures carry a fork choice error");

        assert_eq!(
            error,
            Error::HeadNotViable {
                slot: 3,
                scaled_weight: 2,
                justified_epoch: 2,
                finalized_epoch: 2,
                expected_justified_epoch: 1,
                expected_finalized_epoch: 1,
            },
        );
    }

    #[test]
    fn test_equal_weight_ties_resolve_over_full_roots() {
        // These roots agree in every byte a short prefix comparison would
        // look at.
        let low = H256::from_low_u64_be(1);
        let high = H256::from_low_u64_be(2);

        for (first, second) in [(low, high), (high, low)] {
            let mut store = new_test_store();

            store.insert(0, first, Some(ZERO_HASH), 1, 1);
            store.insert(0, second, Some(ZERO_HASH), 1, 1);

            assert_eq!(
                store.head(ZERO_HASH).expect("the tree has a viable head"),
                high,
            );
        }
    }

    fn new_test_store() -> Store {
        let mut store = Store::new(1, 1, ZERO_HASH);
        store.insert(0, ZERO_HASH, None, 1, 1);
        store
    }
}
