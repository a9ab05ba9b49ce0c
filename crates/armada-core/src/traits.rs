//! Trait interfaces for the Armada protocol.
//!
//! These traits define the contracts between crates and toward external
//! collaborators:
//! - [`DelegationResolver`] — delegate lookups owned by the governance token
//! - [`RawPowerSource`] — raw (pre-decay) balance lookups, current and historical
//! - [`Ark`] — fund move primitives of a yield-bearing sub-account

use crate::error::FleetError;
use crate::types::Address;

/// Read-only delegate lookup.
///
/// Delegation state is owned by the governance token, never by the decay
/// engine; the engine only ever asks "who does X delegate to right now".
/// `None` and the zero address both mean "undelegated".
///
/// Implemented for any `Fn(&Address) -> Option<Address>` so tests and
/// embedders can pass closures directly.
pub trait DelegationResolver: Send + Sync {
    /// Current delegate of `account`, or `None` if undelegated.
    fn delegate_of(&self, account: &Address) -> Option<Address>;
}

impl<F> DelegationResolver for F
where
    F: Fn(&Address) -> Option<Address> + Send + Sync,
{
    fn delegate_of(&self, account: &Address) -> Option<Address> {
        self(account)
    }
}

/// Raw voting-power lookups, before decay is applied.
///
/// Backed by the token's balance/vote checkpoints (external); the decay
/// engine multiplies these by the decay factor.
pub trait RawPowerSource: Send + Sync {
    /// Current raw power of `account` in token base units.
    fn raw_power(&self, account: &Address) -> u64;

    /// Raw power of `account` at a past `timestamp`.
    fn raw_power_at(&self, account: &Address, timestamp: u64) -> u64;
}

/// Fund move primitives of an Ark.
///
/// An Ark is a yield-bearing sub-account managed by exactly one fleet (its
/// commander). Some protocols need auxiliary keeper data to enter or exit a
/// position; such Arks set `requires_keeper_data` in their config and reject
/// empty `data`.
pub trait Ark: Send + Sync {
    /// Deposit `amount` into the Ark's underlying position.
    fn board(&mut self, amount: u64, data: &[u8]) -> Result<(), FleetError>;

    /// Withdraw `amount` from the Ark's underlying position.
    ///
    /// # Errors
    ///
    /// [`FleetError::InsufficientArkBalance`] if the Ark holds less than `amount`.
    fn disembark(&mut self, amount: u64, data: &[u8]) -> Result<(), FleetError>;

    /// Total assets currently held by the Ark, in token base units.
    fn total_assets(&self) -> u64;
}

impl core::fmt::Debug for dyn Ark {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ark").field("total_assets", &self.total_assets()).finish()
    }
}
