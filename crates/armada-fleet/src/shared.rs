//! Thread-safe handle around a [`FleetCommander`].
//!
//! The commander itself is single-threaded by design; this wrapper gives a
//! cloneable handle with one lock acquisition per operation. Reads take the
//! shared lock, mutations the exclusive one.

use std::sync::Arc;

use parking_lot::RwLock;

use armada_core::error::{ArmadaError, FleetError};
use armada_core::traits::Ark;
use armada_core::types::{Address, AssetAmount, RebalanceOperation};

use crate::config::ArkConfig;
use crate::engine::FleetCommander;

/// Cloneable, thread-safe fleet handle.
#[derive(Clone)]
pub struct SharedFleet {
    inner: Arc<RwLock<FleetCommander>>,
}

impl SharedFleet {
    pub fn new(commander: FleetCommander) -> Self {
        Self { inner: Arc::new(RwLock::new(commander)) }
    }

    /// Run a read-only closure under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&FleetCommander) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run a mutating closure under the exclusive lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut FleetCommander) -> R) -> R {
        f(&mut self.inner.write())
    }

    // Common operations, lock handling included.

    pub fn total_assets(&self) -> u64 {
        self.inner.read().total_assets()
    }

    pub fn total_shares(&self) -> u64 {
        self.inner.read().total_shares()
    }

    pub fn share_balance_of(&self, account: &Address) -> u64 {
        self.inner.read().share_balance_of(account)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.read().is_shut_down()
    }

    pub fn deposit(&self, assets: u64, receiver: Address) -> Result<u64, FleetError> {
        self.inner.write().deposit(assets, receiver)
    }

    pub fn withdraw(&self, owner: Address, amount: AssetAmount) -> Result<(u64, u64), FleetError> {
        self.inner.write().withdraw(owner, amount)
    }

    pub fn redeem(&self, owner: Address, shares: AssetAmount) -> Result<(u64, u64), FleetError> {
        self.inner.write().redeem(owner, shares)
    }

    pub fn rebalance(
        &self,
        caller: &Address,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
        now: u64,
    ) -> Result<(), ArmadaError> {
        self.inner.write().rebalance(caller, ops, keeper_data, now)
    }

    pub fn adjust_buffer(
        &self,
        caller: &Address,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
        now: u64,
    ) -> Result<(), ArmadaError> {
        self.inner.write().adjust_buffer(caller, ops, keeper_data, now)
    }

    pub fn add_ark(
        &self,
        caller: &Address,
        ark_address: Address,
        config: ArkConfig,
        ark: Box<dyn Ark>,
    ) -> Result<(), ArmadaError> {
        self.inner.write().add_ark(caller, ark_address, config, ark)
    }

    pub fn emergency_shutdown(&self, caller: &Address) -> Result<(), ArmadaError> {
        self.inner.write().emergency_shutdown(caller)
    }
}
