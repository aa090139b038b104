//! Keeper integration tests over the JSON store and chain snapshot.

pub mod common;
pub mod reconciliation_tests;
