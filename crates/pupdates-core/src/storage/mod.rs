//! # Storage Module
//!
//! Persistent snapshot store backends.

pub mod redb_store;

pub use redb_store::RedbSnapshotStore;
