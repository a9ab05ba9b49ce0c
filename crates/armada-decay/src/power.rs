//! Voting-power composition over [`DecayState`] and a [`RawPowerSource`].
//!
//! Raw (pre-decay) balances are owned by the governance token; this view
//! multiplies them by the effective decay factor.
//!
//! Historical queries intentionally apply the *current* decay factor to the
//! *historical* raw balance. Two queries for the same past timepoint, made
//! at different present times, can therefore return different results. Vote
//! weights recorded at cast time (see [`crate::gov`]) are immutable and
//! unaffected. This asymmetry is deliberate: it prevents
//! leveraging stale high-power snapshots from before an account went idle.

use armada_core::constants::WAD;
use armada_core::error::DecayError;
use armada_core::traits::{DelegationResolver, RawPowerSource};
use armada_core::types::Address;

use crate::math::mul_div;
use crate::state::DecayState;

/// Read-only effective-power view for one governance domain.
pub struct VotingPowerView<'a, P: RawPowerSource + ?Sized> {
    state: &'a DecayState,
    raw_power: &'a P,
}

impl<'a, P: RawPowerSource + ?Sized> VotingPowerView<'a, P> {
    /// Build a view over a decay state and a raw-power source.
    pub fn new(state: &'a DecayState, raw_power: &'a P) -> Self {
        Self { state, raw_power }
    }

    /// Current effective votes: `raw * decay_factor / WAD`.
    pub fn votes<R: DelegationResolver + ?Sized>(
        &self,
        account: &Address,
        resolver: &R,
        now: u64,
    ) -> Result<u64, DecayError> {
        let raw = self.raw_power.raw_power(account);
        self.state.get_voting_power(account, raw, resolver, now)
    }

    /// Effective votes at a past `timestamp`, queried as of `now`.
    ///
    /// Applies the current factor to the historical raw balance (see the
    /// module docs for why this is deliberately not historically accurate).
    pub fn past_votes<R: DelegationResolver + ?Sized>(
        &self,
        account: &Address,
        timestamp: u64,
        resolver: &R,
        now: u64,
    ) -> Result<u64, DecayError> {
        let raw = self.raw_power.raw_power_at(account, timestamp);
        let factor = self.state.get_decay_factor(account, resolver, now)?;
        mul_div(raw, factor, WAD)
    }

    /// Factor recorded for `account` at a past `timestamp`, from checkpoints.
    ///
    /// Unlike [`past_votes`](Self::past_votes), this is the historically
    /// accurate factor; exposed for audit/inspection tooling.
    pub fn historical_factor(&self, account: &Address, timestamp: u64) -> Result<u64, DecayError> {
        self.state.get_historical_decay_factor(account, timestamp)
    }
}
