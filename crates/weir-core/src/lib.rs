//! # weir-core
//! Foundation types and capability traits for the Weir ledger engines.

pub mod clock;
pub mod constants;
pub mod custody;
pub mod error;
pub mod math;
pub mod store;
pub mod traits;
pub mod types;
