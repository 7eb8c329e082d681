//! Shared backend integration tests.
//!
//! Tests the TreeStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod tree_store_tests;
