//! Shared test helpers for E2E and adversarial tests.

use std::collections::HashMap;

use armada_core::traits::{Ark, DelegationResolver, RawPowerSource};
use armada_core::types::Address;
use armada_decay::{DecayParams, DecayState};
use armada_fleet::{ArkConfig, FleetCommander, FleetConfig, Roles, VaultArk};

/// Address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

pub const FLEET: Address = Address([0xF0; 20]);
pub const BUFFER: Address = Address([0xB0; 20]);
pub const GOVERNOR: Address = Address([0xAA; 20]);

/// Delegation graph backed by a map. No edges means everyone self-terminates.
#[derive(Default)]
pub struct Delegations {
    edges: HashMap<Address, Address>,
}

impl Delegations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delegate(&mut self, from: Address, to: Address) {
        self.edges.insert(from, to);
    }

    pub fn revoke(&mut self, from: &Address) {
        self.edges.remove(from);
    }
}

impl DelegationResolver for Delegations {
    fn delegate_of(&self, account: &Address) -> Option<Address> {
        self.edges.get(account).copied()
    }
}

/// Token balances with a flat history: `raw_power_at` answers with the
/// balance recorded for the query timestamp, falling back to the current
/// balance.
#[derive(Default)]
pub struct BalanceBook {
    current: HashMap<Address, u64>,
    historical: HashMap<(Address, u64), u64>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, account: Address, balance: u64) {
        self.current.insert(account, balance);
    }

    pub fn set_at(&mut self, account: Address, timestamp: u64, balance: u64) {
        self.historical.insert((account, timestamp), balance);
    }
}

impl RawPowerSource for BalanceBook {
    fn raw_power(&self, account: &Address) -> u64 {
        *self.current.get(account).unwrap_or(&0)
    }

    fn raw_power_at(&self, account: &Address, timestamp: u64) -> u64 {
        self.historical
            .get(&(*account, timestamp))
            .copied()
            .unwrap_or_else(|| self.raw_power(account))
    }
}

/// Decay state with an explicit window and linear rate.
pub fn decay_state_with(origin: u64, window: u64, rate: u64) -> DecayState {
    let params = DecayParams {
        decay_free_window: window,
        rate_per_second: rate,
        ..DecayParams::default()
    };
    DecayState::new(params, origin).unwrap()
}

/// Fleet with `ark_count` default-config Arks at addresses 0x10, 0x20, ...
/// and the governor holding every role.
pub fn test_fleet(ark_count: u8) -> FleetCommander {
    let mut fleet = FleetCommander::new(
        FLEET,
        FleetConfig::default(),
        Roles::solo(GOVERNOR),
        BUFFER,
        Box::new(VaultArk::new()),
    );
    for i in 1..=ark_count {
        fleet
            .add_ark(
                &GOVERNOR,
                addr(i * 0x10),
                ArkConfig::default(),
                Box::new(VaultArk::new()),
            )
            .unwrap();
    }
    fleet
}

/// An Ark whose balance is shared with the test through a handle, so tests
/// can credit yield from outside the fleet.
pub struct YieldArk {
    balance: std::sync::Arc<std::sync::Mutex<u64>>,
}

impl YieldArk {
    /// Returns the Ark and a handle for crediting yield.
    pub fn new() -> (Self, YieldHandle) {
        let balance = std::sync::Arc::new(std::sync::Mutex::new(0));
        (Self { balance: balance.clone() }, YieldHandle { balance })
    }
}

pub struct YieldHandle {
    balance: std::sync::Arc<std::sync::Mutex<u64>>,
}

impl YieldHandle {
    pub fn credit(&self, amount: u64) {
        *self.balance.lock().unwrap() += amount;
    }

    pub fn balance(&self) -> u64 {
        *self.balance.lock().unwrap()
    }
}

impl Ark for YieldArk {
    fn board(&mut self, amount: u64, _data: &[u8]) -> Result<(), armada_core::error::FleetError> {
        let mut balance = self.balance.lock().unwrap();
        *balance = balance
            .checked_add(amount)
            .ok_or(armada_core::error::FleetError::ValueOverflow)?;
        Ok(())
    }

    fn disembark(
        &mut self,
        amount: u64,
        _data: &[u8],
    ) -> Result<(), armada_core::error::FleetError> {
        let mut balance = self.balance.lock().unwrap();
        if amount > *balance {
            return Err(armada_core::error::FleetError::InsufficientArkBalance {
                ark: Address::ZERO,
                have: *balance,
                need: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn total_assets(&self) -> u64 {
        *self.balance.lock().unwrap()
    }
}

/// An Ark whose disembark always fails. Used to verify that validation,
/// not the move primitive, is what protects batch atomicity.
pub struct JammedArk {
    balance: u64,
}

impl JammedArk {
    pub fn with_balance(balance: u64) -> Self {
        Self { balance }
    }
}

impl Ark for JammedArk {
    fn board(&mut self, amount: u64, _data: &[u8]) -> Result<(), armada_core::error::FleetError> {
        self.balance = self.balance.saturating_add(amount);
        Ok(())
    }

    fn disembark(
        &mut self,
        amount: u64,
        _data: &[u8],
    ) -> Result<(), armada_core::error::FleetError> {
        Err(armada_core::error::FleetError::InsufficientArkBalance {
            ark: Address::ZERO,
            have: 0,
            need: amount,
        })
    }

    fn total_assets(&self) -> u64 {
        self.balance
    }
}

