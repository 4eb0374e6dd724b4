use anyhow::Result;
use fork_choice_store::{Difference, Store};
use log::debug;
use types::{
    consts::ZERO_HASH,
    primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
};

use crate::misc::VoteTracker;

/// Stateful facade over the fork choice store.
///
/// Owns the store, the balances snapshot from the previous head request, and
/// the vote table. Accepted blocks and attestations only affect the store
/// when [`Controller::head`] folds them into node weights.
pub struct Controller {
    store: Store,
    justified_balances: Vec<Gwei>,
    votes: Vec<Option<VoteTracker>>,
}

impl Controller {
    /// The caller is expected to insert the block identified by
    /// `finalized_root` before requesting a head.
    #[must_use]
    pub fn new(justified_epoch: Epoch, finalized_epoch: Epoch, finalized_root: H256) -> Self {
        Self {
            store: Store::new(justified_epoch, finalized_epoch, finalized_root),
            justified_balances: vec![],
            votes: vec![],
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub fn process_block(
        &mut self,
        slot: Slot,
        block_root: H256,
        parent_root: Option<H256>,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) {
        self.store.insert(slot, block_root, parent_root, justified_epoch, finalized_epoch);
    }

    /// Records the target of an attestation for each attesting validator.
    ///
    /// The target only replaces a validator's pending vote if it is the
    /// validator's first or targets a strictly later epoch. The block does not
    /// have to be known yet; the vote takes effect on the first subsequent
    /// [`Controller::head`] call that finds it in the store.
    pub fn process_attestation(
        &mut self,
        validator_indices: &[ValidatorIndex],
        block_root: H256,
        target_epoch: Epoch,
    ) {
        for validator_index in validator_indices.iter().copied() {
            let Ok(index) = usize::try_from(validator_index) else {
                continue;
            };

            if index >= self.votes.len() {
                self.votes.resize(index + 1, None);
            }

            let vote = self.votes[index].get_or_insert_with(VoteTracker::default);

            if vote.next_root == ZERO_HASH || target_epoch > vote.next_epoch {
                vote.next_root = block_root;
                vote.next_epoch = target_epoch;
            } else {
                debug!(
                    "attestation from validator {validator_index} ignored \
                     (target epoch: {target_epoch}, pending epoch: {})",
                    vote.next_epoch,
                );
            }
        }
    }

    /// Finds the current head.
    ///
    /// This is a read-modify-read compound: pending votes and balance changes
    /// are folded into node weights and the selection caches are refreshed
    /// before the head is read. Repeating the call with the same inputs and
    /// no intervening blocks or attestations returns the same root.
    pub fn head(
        &mut self,
        justified_epoch: Epoch,
        justified_root: H256,
        new_balances: &[Gwei],
        finalized_epoch: Epoch,
    ) -> Result<H256> {
        let deltas = self.compute_deltas(new_balances);

        self.store.apply_weight_changes(justified_epoch, finalized_epoch, deltas)?;

        self.justified_balances = new_balances.to_vec();

        self.store.head(justified_root)
    }

    /// Translates vote and balance movements into one signed change per node.
    ///
    /// A vote swinging from one block to another moves the validator's old
    /// balance off the former and its new balance onto the latter. A block
    /// missing from the arena contributes nothing on its side. Every examined
    /// vote has its applied target advanced to the pending one whether or not
    /// a change was produced; only the never-attested guard returns before
    /// the advancement.
    fn compute_deltas(&mut self, new_balances: &[Gwei]) -> Vec<Difference> {
        let mut deltas = vec![0; self.store.len()];

        for (validator_index, vote) in self.votes.iter_mut().enumerate() {
            let Some(vote) = vote else {
                continue;
            };

            if vote.current_root == ZERO_HASH && vote.next_root == ZERO_HASH {
                continue;
            }

            let old_balance = self
                .justified_balances
                .get(validator_index)
                .copied()
                .unwrap_or_default();

            let new_balance = new_balances
                .get(validator_index)
                .copied()
                .unwrap_or_default();

            if vote.current_root != vote.next_root || old_balance != new_balance {
                if let Some(index) = self.store.node_index(vote.next_root) {
                    deltas[index] += balance_difference(new_balance);
                }

                if let Some(index) = self.store.node_index(vote.current_root) {
                    deltas[index] -= balance_difference(old_balance);
                }
            }

            vote.current_root = vote.next_root;
        }

        deltas
    }
}

fn balance_difference(balance: Gwei) -> Difference {
    balance
        .try_into()
        .expect("the effective balance of a single validator should fit in i64")
}
