//! # armada-core
//! Foundation types and traits for the Armada protocol.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
