//! Driving code for the fork choice store.
//!
//! This crate owns what the store itself must not: the per-validator vote
//! table and the balances snapshot that weight changes are computed against.
//! The store only ever sees finished per-node weight changes.
//!
//! All operations are synchronous and complete in time linear in the arena
//! and vote table sizes. A single caller is expected to own the controller;
//! callers that share it across threads must serialize access themselves.

pub use crate::{controller::Controller, misc::VoteTracker};

mod controller;
mod misc;

#[cfg(test)]
mod helpers;
