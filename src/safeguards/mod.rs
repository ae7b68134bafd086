//! Safeguards: preconditions gating whether a step may touch a repository
//!
//! A safeguard map is split into two [`SafeguardSet`]s by consequence:
//! - `hard_stop`: failure raises [`RepositorySkipped`](crate::errors::RepositorySkipped)
//!   and the repository is excluded for the rest of the run
//! - `soft_skip`: failure skips the current step only
//!
//! The default bucket for a map without explicit `hard_stop` / `soft_skip`
//! keys is chosen by the caller, see [`DefaultBucket`].

mod config;
mod evaluate;

#[cfg(test)]
mod tests;

pub use config::{CleanRequirement, DefaultBucket, SafeguardBuckets, SafeguardSet};
pub use evaluate::{dirty_paths, enforce, evaluate_safeguards, Verdict};
