use types::primitives::{Epoch, H256};

/// Latest attestation targets of a single validator.
///
/// A tracker is only allocated on the validator's first attestation.
/// `Default` yields the unattested state with both roots zeroed.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct VoteTracker {
    /// Target already counted in node weights.
    pub current_root: H256,
    /// Latest attested target, to be counted on the next weight update.
    pub next_root: H256,
    /// Target epoch of `next_root`.
    pub next_epoch: Epoch,
}
