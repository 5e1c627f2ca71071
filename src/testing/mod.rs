//! Test helpers: tree dumps and small fixture trees.
//!
//! Use [`dump_tree`] to capture a live component tree as plain text for
//! snapshot assertions, and the [`fixtures`] builders for the small trees
//! most engine tests start from.

pub mod fixtures;
pub mod snapshot;

pub use snapshot::dump_tree;
