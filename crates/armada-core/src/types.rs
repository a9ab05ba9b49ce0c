//! Core protocol types: addresses, decay bookkeeping, rebalance operations.
//!
//! All amounts are u64 in token base units. All timestamps are u64 Unix
//! seconds, injected explicitly by the caller (no wall-clock reads in core).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::WAD;

/// A 20-byte account address.
///
/// Identifies governance accounts, Arks, fleets, and role holders.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Used as the "no delegate" / "no commander" marker
    /// at external boundaries.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create an Address from a byte array.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Which decay curve the engine applies to inactive accounts.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DecayFunction {
    /// `factor - rate * elapsed`, saturating at zero.
    #[default]
    Linear,
    /// `factor * (1 - rate)^elapsed`, compounding per second.
    Exponential,
}

/// Per-account decay bookkeeping.
///
/// Created lazily on first touch with full power; never destroyed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecayInfo {
    /// Retained fraction of voting power, in `[0, WAD]`.
    pub decay_factor: u64,
    /// Unix seconds of the last update or qualifying action.
    pub last_update_timestamp: u64,
}

impl DecayInfo {
    /// Fresh info at full power, anchored at `now`.
    pub fn new_at(now: u64) -> Self {
        Self {
            decay_factor: WAD,
            last_update_timestamp: now,
        }
    }
}

/// A recorded `(timestamp, decay_factor)` pair for historical lookups.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Unix seconds at which the factor was recorded.
    pub timestamp: u64,
    /// Decay factor at that time, in `[0, WAD]`.
    pub decay_factor: u64,
}

/// An asset amount, with an explicit "everything available" sentinel.
///
/// Replaces the magic `type(uint256).max` convention: `All` resolves against
/// the available balance at validation time. Some operations (adjust-buffer)
/// reject `All` and require an explicit figure.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetAmount {
    /// An exact amount in token base units.
    Exact(u64),
    /// Move or withdraw the entire available balance.
    All,
}

impl AssetAmount {
    /// Resolve against an available balance. `All` yields the full balance.
    pub fn resolve(&self, available: u64) -> u64 {
        match self {
            Self::Exact(n) => *n,
            Self::All => available,
        }
    }

    /// Whether this is the move-everything sentinel.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::All => write!(f, "all"),
        }
    }
}

/// A single fund movement between two Arks.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebalanceOperation {
    /// Ark funds leave.
    pub from_ark: Address,
    /// Ark funds enter.
    pub to_ark: Address,
    /// Amount to move; `All` means the source Ark's full balance.
    pub amount: AssetAmount,
}

impl fmt::Display for RebalanceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from_ark, self.to_ark, self.amount)
    }
}
