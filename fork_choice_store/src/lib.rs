//! Implementation of [LMD-GHOST] head selection over a flat block arena.
//!
//! Unfinalized blocks live in a single growable arena ordered by insertion.
//! Every parent is inserted before its children, so iterating the arena from
//! the highest index down is a valid reverse-topological order. Both passes of
//! [`Store::apply_weight_changes`] rely on this.
//!
//! Each node caches the child currently favored by the fork choice rule and
//! the leaf that following those links leads to. Reading the head is then a
//! single lookup from the justified block. The caches are refreshed wholesale
//! on every weight update rather than incrementally; the sweeps are linear in
//! the arena, which is expected to stay small between finalizations.
//!
//! Nodes are never removed. Reclaiming pre-finalization subtrees is left to a
//! layer above this crate.
//!
//! This implementation follows [`proto_array`].
//!
//! [LMD-GHOST]:     https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/fork-choice.md
//! [`proto_array`]: https://github.com/protolambda/lmd-ghost/tree/242f0dced3b34feed0d4e9d2fd0e5e66e448c359#array-based-stateful-dag-proto_array

pub use crate::{
    error::Error,
    misc::{Difference, ProtoNode},
    store::Store,
};

mod error;
mod misc;
mod store;
