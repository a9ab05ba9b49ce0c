//! Governance action hooks and the immutable vote-weight ledger.
//!
//! Every qualifying action (propose, cast vote, cancel, execute) resets the
//! acting account's decay, restarting its decay-free window. Vote weights
//! are computed with the factor in force *before* the reset — an idle voter
//! returns at reduced weight, and only subsequent actions enjoy the restored
//! full power. Once recorded, a cast weight never changes, regardless of any
//! later decay or historical re-query.

use std::collections::HashMap;

use tracing::{debug, info};

use armada_core::error::{ArmadaError, GovernanceError};
use armada_core::traits::DelegationResolver;
use armada_core::types::Address;

use crate::state::DecayState;

/// A vote weight recorded at cast time. Immutable once stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CastVote {
    /// Effective weight at the moment of casting.
    pub weight: u64,
    /// Unix seconds when the vote was cast.
    pub cast_at: u64,
}

/// Append-only record of cast vote weights, keyed by proposal and voter.
///
/// The tally itself (quorum, outcomes, proposal lifecycle) is external;
/// this ledger exists so recorded weights survive any later decay.
#[derive(Debug, Default)]
pub struct GovernanceLedger {
    votes: HashMap<u64, HashMap<Address, CastVote>>,
}

impl GovernanceLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Qualifying action: a proposal was created by `proposer`.
    pub fn on_propose(
        &mut self,
        state: &mut DecayState,
        proposer: &Address,
        now: u64,
    ) -> Result<(), ArmadaError> {
        state.reset_decay(proposer, now)?;
        debug!(%proposer, "gov: proposal created, decay reset");
        Ok(())
    }

    /// Qualifying action: `account` casts a vote on `proposal`.
    ///
    /// The recorded weight uses the pre-reset (possibly decayed) factor;
    /// the reset then restores full power for subsequent actions.
    ///
    /// # Errors
    ///
    /// [`GovernanceError::AlreadyVoted`] if this account already voted here.
    pub fn on_cast_vote<R: DelegationResolver + ?Sized>(
        &mut self,
        state: &mut DecayState,
        proposal: u64,
        account: &Address,
        raw_power: u64,
        resolver: &R,
        now: u64,
    ) -> Result<u64, ArmadaError> {
        let proposal_votes = self.votes.entry(proposal).or_default();
        if proposal_votes.contains_key(account) {
            return Err(GovernanceError::AlreadyVoted { account: *account, proposal }.into());
        }

        let weight = state.get_voting_power(account, raw_power, resolver, now)?;
        proposal_votes.insert(*account, CastVote { weight, cast_at: now });
        state.reset_decay(account, now)?;
        info!(%account, proposal, weight, "gov: vote cast");
        Ok(weight)
    }

    /// Qualifying action: `account` changes its delegate.
    ///
    /// The edge itself lives in the governance token; the engine only
    /// restarts the actor's decay-free window.
    pub fn on_delegate(
        &mut self,
        state: &mut DecayState,
        account: &Address,
        now: u64,
    ) -> Result<(), ArmadaError> {
        state.reset_decay(account, now)?;
        debug!(%account, "gov: delegation changed, decay reset");
        Ok(())
    }

    /// Qualifying action: `account` cancels a proposal.
    pub fn on_cancel(
        &mut self,
        state: &mut DecayState,
        account: &Address,
        now: u64,
    ) -> Result<(), ArmadaError> {
        state.reset_decay(account, now)?;
        debug!(%account, "gov: proposal cancelled, decay reset");
        Ok(())
    }

    /// Qualifying action: `account` executes a passed proposal.
    pub fn on_execute(
        &mut self,
        state: &mut DecayState,
        account: &Address,
        now: u64,
    ) -> Result<(), ArmadaError> {
        state.reset_decay(account, now)?;
        debug!(%account, "gov: proposal executed, decay reset");
        Ok(())
    }

    /// The weight `account` cast on `proposal`, if any.
    pub fn recorded_vote(&self, proposal: u64, account: &Address) -> Option<&CastVote> {
        self.votes.get(&proposal)?.get(account)
    }

    /// Sum of all weights cast on `proposal`, saturating at `u64::MAX`.
    pub fn total_weight(&self, proposal: u64) -> u64 {
        self.votes.get(&proposal).map_or(0, |v| {
            let sum = v.values().map(|c| c.weight as u128).sum::<u128>();
            u64::try_from(sum).unwrap_or(u64::MAX)
        })
    }
}
