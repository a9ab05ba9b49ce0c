//! # armada-fleet — Fleet allocation engine.
//!
//! Routes user deposits into a buffer Ark, serves withdrawals buffer-first
//! with an uncapped forced exit across Arks, and executes keeper-driven
//! rebalances under per-Ark caps, batch limits, and a cooldown.
//!
//! All batch operations are staged: the whole batch is validated against a
//! balance snapshot before any fund moves, so a rejected batch leaves every
//! balance untouched.

pub mod config;
pub mod engine;
pub mod shared;

pub use config::{ArkConfig, ArkRegistry, FleetConfig, Roles, VaultArk};
pub use engine::FleetCommander;
pub use shared::SharedFleet;
