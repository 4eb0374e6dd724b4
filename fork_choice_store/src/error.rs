use static_assertions::assert_eq_size;
use thiserror::Error;
use types::primitives::{Epoch, Gwei, Slot, H256};

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("justified root is not present in the fork choice store: {justified_root:?}")]
    UnknownJustifiedRoot { justified_root: H256 },
    #[error(
        "best descendant of the justified block is not viable for head \
         (slot: {slot}, scaled weight: {scaled_weight}, \
         justified epoch: {justified_epoch}, expected: {expected_justified_epoch}, \
         finalized epoch: {finalized_epoch}, expected: {expected_finalized_epoch})"
    )]
    HeadNotViable {
        slot: Slot,
        /// Weight divided by 10 * 10^9, floored.
        scaled_weight: Gwei,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
        expected_justified_epoch: Epoch,
        expected_finalized_epoch: Epoch,
    },
}

assert_eq_size!(Error, [usize; 7]);
