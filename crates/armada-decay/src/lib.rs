//! # armada-decay — Voting-power decay engine.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! This crate implements time-based, delegation-aware decay of governance
//! voting power:
//! - **Dual decay curves**: linear (`factor - rate * t`) and exponential
//!   (`factor * (1 - rate)^t` via fixed-point binary exponentiation), both
//!   clamped to `[0, WAD]`.
//! - **Decay-free window**: a grace period after each qualifying governance
//!   action during which no decay accrues.
//! - **Bounded delegation-chain walk**: effective power follows the delegate
//!   chain up to a configured depth, with explicit cycle and depth-overflow
//!   policies.
//! - **Checkpointed history**: append-only per-account `(timestamp, factor)`
//!   records with latest-at-or-before binary search.

pub mod gov;
pub mod math;
pub mod power;
pub mod state;

pub use gov::GovernanceLedger;
pub use math::{exponential_decay, fixed_pow, linear_decay, mul_div, mul_div_up};
pub use power::VotingPowerView;
pub use state::{ChainResolution, DecayParams, DecayState};
