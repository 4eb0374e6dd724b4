use sha2::{Digest as _, Sha256};
use types::primitives::{Epoch, Gwei, H256};

use crate::controller::Controller;

/// Block `k` is identified by the hash of its little-endian encoding.
pub fn block_hash(number: u64) -> H256 {
    H256::from_slice(Sha256::digest(number.to_le_bytes()).as_slice())
}

/// Requests a head the scenario expects to exist.
pub fn head_root(
    controller: &mut Controller,
    justified_epoch: Epoch,
    justified_root: H256,
    balances: &[Gwei],
    finalized_epoch: Epoch,
) -> H256 {
    controller
        .head(justified_epoch, justified_root, balances, finalized_epoch)
        .expect("the tree has a viable head")
}
