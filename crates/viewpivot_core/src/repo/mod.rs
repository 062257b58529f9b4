//! Persistence of view state.
//!
//! # Responsibility
//! - Define the key-value storage contract and its in-memory and SQLite
//!   backends.
//! - Map `ViewState` to and from its persisted JSON shape.
//!
//! # Invariants
//! - Storage failures are reported to callers of `KeyValueStore`, but
//!   `ViewStateStore` swallows them after logging.

pub mod kv_repo;
pub mod view_state_repo;
