use crate::primitives::{Epoch, Slot, H256};

/// The all-zero root. Aliases the finalized genesis entry and marks an unset
/// vote target.
pub const ZERO_HASH: H256 = H256::zero();

pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;
