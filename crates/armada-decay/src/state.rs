//! Per-account decay bookkeeping with checkpointed history.
//!
//! One [`DecayState`] exists per governance domain, owned by the governance
//! token/manager. Accounts are created lazily at full power on first touch
//! and are never destroyed. Every factor write appends a checkpoint so
//! historical factors can be recovered by latest-at-or-before lookup.
//!
//! Delegation is resolved through an injected [`DelegationResolver`]; this
//! module never owns delegation edges. The chain walk is iterative with a
//! configured depth bound and returns a tagged [`ChainResolution`] so the
//! cycle/depth-overflow policy is explicit and total: both cases fall back
//! to the originating account's own stored factor (fail-safe, not punitive).
//!
//! Not thread-safe — callers should wrap in a `Mutex` or `RwLock` if
//! concurrent access is needed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use armada_core::constants::{
    DEFAULT_DECAY_FREE_WINDOW, DEFAULT_DECAY_RATE_PER_SECOND, DEFAULT_MAX_DELEGATION_DEPTH, WAD,
};
use armada_core::error::DecayError;
use armada_core::traits::DelegationResolver;
use armada_core::types::{Address, Checkpoint, DecayFunction, DecayInfo};

use crate::math::{exponential_decay, linear_decay, mul_div};

/// Global decay parameters, governance-settable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecayParams {
    /// Grace period after the last qualifying action, in seconds.
    pub decay_free_window: u64,
    /// Decay rate per second, fixed-point over WAD. Must not exceed WAD.
    pub rate_per_second: u64,
    /// Which curve applies once the window has elapsed.
    pub function: DecayFunction,
    /// Delegation-chain traversal bound: hops beyond the queried account.
    pub max_delegation_depth: usize,
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            decay_free_window: DEFAULT_DECAY_FREE_WINDOW,
            rate_per_second: DEFAULT_DECAY_RATE_PER_SECOND,
            function: DecayFunction::Linear,
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
        }
    }
}

/// Outcome of a bounded delegation-chain walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainResolution {
    /// The chain terminated at this account within the depth bound.
    Resolved(Address),
    /// The chain returned to the originating account.
    CycleDetected,
    /// The chain would require more hops than the configured bound.
    DepthExceeded,
}

/// Per-account decay state for one governance domain.
#[derive(Debug)]
pub struct DecayState {
    params: DecayParams,
    /// System genesis: never-touched accounts decay from here on a WAD basis.
    origin_timestamp: u64,
    accounts: HashMap<Address, DecayInfo>,
    /// Append-only, timestamp-monotonic history per account.
    checkpoints: HashMap<Address, Vec<Checkpoint>>,
}

impl DecayState {
    /// Create a new decay state anchored at `origin_timestamp`.
    ///
    /// # Errors
    ///
    /// [`DecayError::RateAboveWad`] if the configured rate exceeds WAD.
    pub fn new(params: DecayParams, origin_timestamp: u64) -> Result<Self, DecayError> {
        if params.rate_per_second > WAD {
            return Err(DecayError::RateAboveWad { rate: params.rate_per_second });
        }
        Ok(Self {
            params,
            origin_timestamp,
            accounts: HashMap::new(),
            checkpoints: HashMap::new(),
        })
    }

    /// Current global parameters.
    pub fn params(&self) -> &DecayParams {
        &self.params
    }

    /// Genesis timestamp of this governance domain.
    pub fn origin_timestamp(&self) -> u64 {
        self.origin_timestamp
    }

    /// Whether `account` has been touched at least once.
    pub fn is_initialized(&self, account: &Address) -> bool {
        self.accounts.contains_key(account)
    }

    /// Stored info for `account`, if initialized.
    pub fn info(&self, account: &Address) -> Option<&DecayInfo> {
        self.accounts.get(account)
    }

    /// Number of checkpoints recorded for `account`.
    pub fn checkpoint_count(&self, account: &Address) -> usize {
        self.checkpoints.get(account).map_or(0, Vec::len)
    }

    // ------------------------------------------------------------------
    // Governance-settable parameters
    // ------------------------------------------------------------------

    /// Set the per-second decay rate.
    ///
    /// # Errors
    ///
    /// [`DecayError::RateAboveWad`] if `rate` exceeds WAD.
    pub fn set_rate_per_second(&mut self, rate: u64) -> Result<(), DecayError> {
        if rate > WAD {
            return Err(DecayError::RateAboveWad { rate });
        }
        self.params.rate_per_second = rate;
        debug!(rate, "decay: rate updated");
        Ok(())
    }

    /// Set the decay-free window in seconds.
    pub fn set_decay_free_window(&mut self, window: u64) {
        self.params.decay_free_window = window;
        debug!(window, "decay: free window updated");
    }

    /// Switch between linear and exponential decay.
    pub fn set_decay_function(&mut self, function: DecayFunction) {
        self.params.function = function;
        debug!(?function, "decay: function updated");
    }

    /// Set the delegation-chain traversal bound.
    pub fn set_max_delegation_depth(&mut self, depth: usize) {
        self.params.max_delegation_depth = depth;
        debug!(depth, "decay: max delegation depth updated");
    }

    // ------------------------------------------------------------------
    // Curve application
    // ------------------------------------------------------------------

    /// Seconds of decay accrued for `elapsed` seconds of inactivity.
    ///
    /// The decay-free window is consumed first; only time past it decays.
    fn decay_seconds(&self, elapsed: u64) -> u64 {
        elapsed.saturating_sub(self.params.decay_free_window)
    }

    /// Apply the configured curve to `current` over `seconds` of decay.
    fn apply_curve(&self, current: u64, seconds: u64) -> Result<u64, DecayError> {
        if seconds == 0 {
            return Ok(current.min(WAD));
        }
        match self.params.function {
            DecayFunction::Linear => Ok(linear_decay(current, self.params.rate_per_second, seconds)),
            DecayFunction::Exponential => {
                exponential_decay(current, self.params.rate_per_second, seconds)
            }
        }
    }

    /// Factor of an initialized account as of `now`, without mutating.
    fn factor_of(&self, info: &DecayInfo, now: u64) -> Result<u64, DecayError> {
        let elapsed = now.saturating_sub(info.last_update_timestamp);
        self.apply_curve(info.decay_factor, self.decay_seconds(elapsed))
    }

    /// Factor of a never-touched account: fresh WAD basis decaying from genesis.
    fn genesis_factor(&self, now: u64) -> Result<u64, DecayError> {
        let elapsed = now.saturating_sub(self.origin_timestamp);
        self.apply_curve(WAD, self.decay_seconds(elapsed))
    }

    // ------------------------------------------------------------------
    // Delegation chain walk
    // ------------------------------------------------------------------

    /// Walk the delegation chain from `account`, bounded by the configured depth.
    ///
    /// Terminates at the first account with no delegate (or a self/zero
    /// delegate), or at the first delegate with no decay info (an
    /// uninitialized terminal). The depth check runs before the next
    /// delegate's info is examined, so an out-of-bounds account is never
    /// consulted.
    pub fn resolve_delegate_chain<R: DelegationResolver + ?Sized>(
        &self,
        account: &Address,
        resolver: &R,
    ) -> ChainResolution {
        let mut current = *account;
        let mut depth = 0usize;
        loop {
            let Some(delegate) = resolver.delegate_of(&current) else {
                return ChainResolution::Resolved(current);
            };
            if delegate.is_zero() || delegate == current {
                return ChainResolution::Resolved(current);
            }
            if delegate == *account {
                return ChainResolution::CycleDetected;
            }
            if depth >= self.params.max_delegation_depth {
                return ChainResolution::DepthExceeded;
            }
            if !self.accounts.contains_key(&delegate) {
                // Uninitialized terminal: decays from genesis, no further hops.
                return ChainResolution::Resolved(delegate);
            }
            current = delegate;
            depth += 1;
        }
    }

    /// Effective decay factor of `account` as of `now`, read-only.
    ///
    /// Resolves through the delegation chain; a cycle or depth overflow
    /// falls back to the originating account's own stored factor.
    pub fn get_decay_factor<R: DelegationResolver + ?Sized>(
        &self,
        account: &Address,
        resolver: &R,
        now: u64,
    ) -> Result<u64, DecayError> {
        let terminal = match self.resolve_delegate_chain(account, resolver) {
            ChainResolution::Resolved(terminal) => terminal,
            ChainResolution::CycleDetected => {
                debug!(%account, "decay: delegation cycle, using own factor");
                *account
            }
            ChainResolution::DepthExceeded => {
                debug!(%account, "decay: delegation depth exceeded, using own factor");
                *account
            }
        };
        match self.accounts.get(&terminal) {
            Some(info) => self.factor_of(info, now),
            None => self.genesis_factor(now),
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Update `account`'s stored factor as of `now`.
    ///
    /// Initializes the account at full power on first touch. Within the
    /// decay-free window the factor is left unchanged; past it the factor is
    /// recomputed through the resolved delegation chain. The last-update
    /// timestamp always refreshes to `now`, and a checkpoint is appended.
    ///
    /// Returns the stored factor.
    pub fn update_decay_factor<R: DelegationResolver + ?Sized>(
        &mut self,
        account: &Address,
        resolver: &R,
        now: u64,
    ) -> Result<u64, DecayError> {
        let Some(info) = self.accounts.get(account).copied() else {
            // Checkpoint first: a monotonicity rejection leaves state untouched.
            self.push_checkpoint(account, now, WAD)?;
            self.accounts.insert(*account, DecayInfo::new_at(now));
            debug!(%account, "decay: account initialized");
            return Ok(WAD);
        };

        let elapsed = now.saturating_sub(info.last_update_timestamp);
        let new_factor = if elapsed > self.params.decay_free_window {
            self.get_decay_factor(account, resolver, now)?
        } else {
            info.decay_factor
        };

        self.push_checkpoint(account, now, new_factor)?;
        self.accounts.insert(
            *account,
            DecayInfo { decay_factor: new_factor, last_update_timestamp: now },
        );
        debug!(%account, factor = new_factor, "decay: factor updated");
        Ok(new_factor)
    }

    /// Force-restore `account` to full power at `now`.
    ///
    /// Invoked on every qualifying governance action (propose, vote,
    /// delegate, cancel, execute). Initializes the account if needed.
    pub fn reset_decay(&mut self, account: &Address, now: u64) -> Result<(), DecayError> {
        self.push_checkpoint(account, now, WAD)?;
        self.accounts.insert(*account, DecayInfo::new_at(now));
        debug!(%account, "decay: reset to full power");
        Ok(())
    }

    /// Append a checkpoint, keeping timestamps monotonic.
    ///
    /// A write at the latest recorded timestamp overwrites that entry
    /// (multiple actions in one transaction collapse to the final factor).
    fn push_checkpoint(
        &mut self,
        account: &Address,
        timestamp: u64,
        decay_factor: u64,
    ) -> Result<(), DecayError> {
        let history = self.checkpoints.entry(*account).or_default();
        if let Some(last) = history.last_mut() {
            if last.timestamp > timestamp {
                return Err(DecayError::NonMonotonicCheckpoint {
                    got: timestamp,
                    latest: last.timestamp,
                });
            }
            if last.timestamp == timestamp {
                last.decay_factor = decay_factor;
                return Ok(());
            }
        }
        history.push(Checkpoint { timestamp, decay_factor });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Historical queries
    // ------------------------------------------------------------------

    /// Decay factor of `account` at a past `timestamp`.
    ///
    /// Looks up the latest checkpoint at or before `timestamp`. With no such
    /// checkpoint the factor is computed analytically from a WAD basis at
    /// the origin. Timestamps before the origin return 0 (undefined past).
    pub fn get_historical_decay_factor(
        &self,
        account: &Address,
        timestamp: u64,
    ) -> Result<u64, DecayError> {
        if timestamp < self.origin_timestamp {
            return Ok(0);
        }
        if let Some(history) = self.checkpoints.get(account) {
            let idx = history.partition_point(|c| c.timestamp <= timestamp);
            if idx > 0 {
                return Ok(history[idx - 1].decay_factor);
            }
        }
        let elapsed = timestamp - self.origin_timestamp;
        self.apply_curve(WAD, self.decay_seconds(elapsed))
    }

    /// Effective voting power: `raw_power * decay_factor / WAD`.
    pub fn get_voting_power<R: DelegationResolver + ?Sized>(
        &self,
        account: &Address,
        raw_power: u64,
        resolver: &R,
        now: u64,
    ) -> Result<u64, DecayError> {
        let factor = self.get_decay_factor(account, resolver, now)?;
        mul_div(raw_power, factor, WAD)
    }
}
