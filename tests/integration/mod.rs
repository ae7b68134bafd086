//! Integration tests for heddle runs
//!
//! These tests drive the run coordinator end to end over real throwaway
//! git repositories: workflow parsing, stage ordering, repository
//! isolation, per-repository variables and outcome reporting.

pub mod helpers;
pub mod isolation;
pub mod outcomes;
pub mod variables;
