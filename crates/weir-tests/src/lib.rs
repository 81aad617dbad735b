//! Integration test suite for the Weir engines.
//!
//! The engine crates' unit tests cover each ledger in isolation; the
//! suites here wire emission and treasury together the way a hosting
//! ledger would, replay migrations against a live predecessor, and attack
//! the combined system's invariants with hostile inputs.

pub mod helpers;
