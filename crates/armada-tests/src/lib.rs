//! Integration and adversarial test suite for Armada.
//!
//! This crate contains cross-crate tests that exercise the decay engine and
//! the fleet allocation engine together, plus adversarial tests that attempt
//! to break protocol invariants from an attacker's perspective.

pub mod helpers;
