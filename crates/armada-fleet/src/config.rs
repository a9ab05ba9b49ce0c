//! Per-Ark configuration, the Ark registry, fleet parameters, and roles.
//!
//! The registry owns the active Ark set (buffer excluded) and enforces the
//! commander invariant: an Ark is commanded by exactly one fleet while
//! registered, and an Ark with no commander accepts no fund moves.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use armada_core::error::FleetError;
use armada_core::traits::Ark;
use armada_core::types::Address;

/// Per-Ark limits and authorization.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArkConfig {
    /// Maximum assets the Ark may hold.
    pub deposit_cap: u64,
    /// Per-operation cap on funds entering via keeper rebalance.
    pub max_rebalance_inflow: u64,
    /// Per-operation cap on funds leaving via keeper rebalance.
    pub max_rebalance_outflow: u64,
    /// Whether board/disembark need protocol-specific auxiliary data.
    pub requires_keeper_data: bool,
    /// The fleet authorized to move this Ark's funds, while registered.
    pub commander: Option<Address>,
}

impl Default for ArkConfig {
    fn default() -> Self {
        Self {
            deposit_cap: u64::MAX,
            max_rebalance_inflow: u64::MAX,
            max_rebalance_outflow: u64::MAX,
            requires_keeper_data: false,
            commander: None,
        }
    }
}

/// Fleet-wide parameters, governance-settable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FleetConfig {
    /// Floor the buffer may not drop below via adjust-buffer withdrawals.
    pub minimum_buffer_balance: u64,
    /// Cap on fleet-wide total assets accepted through deposits.
    pub deposit_cap: u64,
    /// Seconds required between keeper rebalances.
    pub rebalance_cooldown: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            minimum_buffer_balance: 0,
            deposit_cap: u64::MAX,
            rebalance_cooldown: armada_core::constants::DEFAULT_REBALANCE_COOLDOWN,
        }
    }
}

/// Role assignments for access-gated fleet operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roles {
    /// Parameter setters, registry mutation, shutdown.
    pub governor: Address,
    /// Callers allowed to rebalance/adjust-buffer within the cooldown.
    pub keepers: BTreeSet<Address>,
    /// Privileged keeper: cooldown bypass and shutdown.
    pub curator: Address,
}

impl Roles {
    /// Roles with a single governor who is also the curator and only keeper.
    pub fn solo(governor: Address) -> Self {
        Self {
            governor,
            keepers: BTreeSet::from([governor]),
            curator: governor,
        }
    }

    pub fn is_governor(&self, caller: &Address) -> bool {
        *caller == self.governor
    }

    pub fn is_keeper(&self, caller: &Address) -> bool {
        self.keepers.contains(caller)
    }

    pub fn is_curator(&self, caller: &Address) -> bool {
        *caller == self.curator
    }
}

/// A registered Ark: its limits plus its move primitives.
pub struct ArkEntry {
    pub config: ArkConfig,
    pub ark: Box<dyn Ark>,
}

/// The active Ark set of one fleet. The buffer Ark is held by the
/// commander, never registered here.
#[derive(Default)]
pub struct ArkRegistry {
    entries: BTreeMap<Address, ArkEntry>,
}

impl ArkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an Ark under `fleet`'s command.
    ///
    /// # Errors
    ///
    /// - [`FleetError::ArkAlreadyRegistered`] if the address is taken
    /// - [`FleetError::ForeignCommander`] if the Ark is already commanded
    ///   by another fleet
    pub fn add(
        &mut self,
        address: Address,
        mut config: ArkConfig,
        ark: Box<dyn Ark>,
        fleet: Address,
    ) -> Result<(), FleetError> {
        if self.entries.contains_key(&address) {
            return Err(FleetError::ArkAlreadyRegistered(address));
        }
        if let Some(commander) = config.commander {
            if commander != fleet {
                return Err(FleetError::ForeignCommander { ark: address, commander });
            }
        }
        config.commander = Some(fleet);
        self.entries.insert(address, ArkEntry { config, ark });
        debug!(ark = %address, %fleet, "registry: ark added");
        Ok(())
    }

    /// Deregister an empty Ark, clearing its commander.
    ///
    /// # Errors
    ///
    /// - [`FleetError::UnknownArk`] if not registered
    /// - [`FleetError::ArkNotEmpty`] if it still holds assets
    pub fn remove(&mut self, address: &Address) -> Result<Box<dyn Ark>, FleetError> {
        let entry = self.entries.get(address).ok_or(FleetError::UnknownArk(*address))?;
        let balance = entry.ark.total_assets();
        if balance > 0 {
            return Err(FleetError::ArkNotEmpty { ark: *address, balance });
        }
        let mut entry = self
            .entries
            .remove(address)
            .ok_or(FleetError::UnknownArk(*address))?;
        entry.config.commander = None;
        debug!(ark = %address, "registry: ark removed");
        Ok(entry.ark)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<&ArkEntry> {
        self.entries.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut ArkEntry> {
        self.entries.get_mut(address)
    }

    /// Registered Ark addresses, in deterministic order.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.entries.keys()
    }

    /// Iterate entries in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &ArkEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Balance of one registered Ark.
    pub fn balance_of(&self, address: &Address) -> Result<u64, FleetError> {
        Ok(self
            .entries
            .get(address)
            .ok_or(FleetError::UnknownArk(*address))?
            .ark
            .total_assets())
    }

    /// Sum of all registered Ark balances (buffer excluded).
    pub fn total_assets(&self) -> u64 {
        self.entries
            .values()
            .fold(0u64, |acc, e| acc.saturating_add(e.ark.total_assets()))
    }

    /// Update one Ark's config through a closure, after existence check.
    pub fn update_config(
        &mut self,
        address: &Address,
        f: impl FnOnce(&mut ArkConfig),
    ) -> Result<(), FleetError> {
        let entry = self.entries.get_mut(address).ok_or(FleetError::UnknownArk(*address))?;
        f(&mut entry.config);
        debug!(ark = %address, "registry: ark config updated");
        Ok(())
    }
}

/// In-memory Ark backed by a plain balance.
///
/// Stands in for on-chain yield positions in tests and simulations, the way
/// an in-memory store stands in for persistent storage.
#[derive(Debug, Clone, Default)]
pub struct VaultArk {
    balance: u64,
}

impl VaultArk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(balance: u64) -> Self {
        Self { balance }
    }
}

impl Ark for VaultArk {
    fn board(&mut self, amount: u64, _data: &[u8]) -> Result<(), FleetError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(FleetError::ValueOverflow)?;
        Ok(())
    }

    fn disembark(&mut self, amount: u64, _data: &[u8]) -> Result<(), FleetError> {
        if amount > self.balance {
            return Err(FleetError::InsufficientArkBalance {
                ark: Address::ZERO,
                have: self.balance,
                need: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    fn total_assets(&self) -> u64 {
        self.balance
    }
}
