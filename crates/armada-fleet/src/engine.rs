//! The FleetCommander: share-accounted capital routing across a buffer and
//! a set of Arks.
//!
//! Deposits mint shares at the current assets/shares ratio and land in the
//! buffer. Withdrawals burn shares and are served buffer-first; when the
//! buffer runs short, the exit is forced across Arks ignoring their
//! rebalance caps — user exit liquidity is never cap-limited, only keeper
//! rebalances are. Keeper batches (rebalance, adjust-buffer) are validated
//! in full against a staged balance snapshot before a single fund move, so
//! rejection is all-or-nothing.
//!
//! Not thread-safe — wrap in [`crate::SharedFleet`] (or a lock of your
//! choice) for the one-mutation-per-call discipline.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error, info, warn};

use armada_core::constants::MAX_REBALANCE_OPERATIONS;
use armada_core::error::{AccessError, ArmadaError, FleetError, Role};
use armada_core::traits::Ark;
use armada_core::types::{Address, AssetAmount, RebalanceOperation};
use armada_decay::math::{mul_div, mul_div_up};

use crate::config::{ArkConfig, ArkEntry, ArkRegistry, FleetConfig, Roles};

/// A fully validated fund movement, ready to commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PlannedMove {
    from: Address,
    to: Address,
    amount: u64,
}

/// Direction of an adjust-buffer batch, relative to the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferDirection {
    /// Funds move from Arks into the buffer.
    Inflow,
    /// Funds move from the buffer out to Arks.
    Outflow,
}

/// The allocation engine of one fleet.
pub struct FleetCommander {
    /// This fleet's own address; commander of all its Arks.
    address: Address,
    config: FleetConfig,
    roles: Roles,
    buffer_address: Address,
    /// The liquidity buffer. Never a member of the registry.
    buffer: ArkEntry,
    registry: ArkRegistry,
    total_shares: u64,
    shares: HashMap<Address, u64>,
    /// `None` until the first rebalance/adjust-buffer.
    last_rebalance_timestamp: Option<u64>,
    /// One-way emergency flag: halts deposits and rebalances.
    shut_down: bool,
}

impl FleetCommander {
    /// Create a fleet commanding `buffer_ark` at `buffer_address`.
    pub fn new(
        address: Address,
        config: FleetConfig,
        roles: Roles,
        buffer_address: Address,
        buffer_ark: Box<dyn Ark>,
    ) -> Self {
        let buffer = ArkEntry {
            config: ArkConfig { commander: Some(address), ..Default::default() },
            ark: buffer_ark,
        };
        Self {
            address,
            config,
            roles,
            buffer_address,
            buffer,
            registry: ArkRegistry::new(),
            total_shares: 0,
            shares: HashMap::new(),
            last_rebalance_timestamp: None,
            shut_down: false,
        }
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// This fleet's address.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn buffer_address(&self) -> Address {
        self.buffer_address
    }

    pub fn buffer_balance(&self) -> u64 {
        self.buffer.ark.total_assets()
    }

    /// Fleet-wide assets: buffer plus all registered Arks.
    pub fn total_assets(&self) -> u64 {
        self.buffer_balance().saturating_add(self.registry.total_assets())
    }

    pub fn total_shares(&self) -> u64 {
        self.total_shares
    }

    pub fn share_balance_of(&self, account: &Address) -> u64 {
        *self.shares.get(account).unwrap_or(&0)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn registry(&self) -> &ArkRegistry {
        &self.registry
    }

    /// Balance of any Ark known to this fleet, buffer included.
    pub fn ark_balance(&self, ark: &Address) -> Result<u64, FleetError> {
        if *ark == self.buffer_address {
            Ok(self.buffer_balance())
        } else {
            self.registry.balance_of(ark)
        }
    }

    /// Shares minted for a deposit of `assets` at the current ratio.
    pub fn convert_to_shares(&self, assets: u64) -> Result<u64, FleetError> {
        let total = self.total_assets();
        if self.total_shares == 0 || total == 0 {
            return Ok(assets);
        }
        mul_div(assets, self.total_shares, total).map_err(|_| FleetError::ValueOverflow)
    }

    /// Assets redeemable for `shares` at the current ratio.
    pub fn convert_to_assets(&self, shares: u64) -> Result<u64, FleetError> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        mul_div(shares, self.total_assets(), self.total_shares)
            .map_err(|_| FleetError::ValueOverflow)
    }

    // ------------------------------------------------------------------
    // Role gates
    // ------------------------------------------------------------------

    fn require_governor(&self, caller: &Address) -> Result<(), AccessError> {
        if self.roles.is_governor(caller) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized { caller: *caller, role: Role::Governor })
        }
    }

    fn require_keeper(&self, caller: &Address) -> Result<(), AccessError> {
        if self.roles.is_keeper(caller) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized { caller: *caller, role: Role::Keeper })
        }
    }

    fn require_curator(&self, caller: &Address) -> Result<(), AccessError> {
        if self.roles.is_curator(caller) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized { caller: *caller, role: Role::Curator })
        }
    }

    // ------------------------------------------------------------------
    // Governance surface
    // ------------------------------------------------------------------

    /// Register an Ark under this fleet's command.
    pub fn add_ark(
        &mut self,
        caller: &Address,
        ark_address: Address,
        config: ArkConfig,
        ark: Box<dyn Ark>,
    ) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        if ark_address == self.buffer_address {
            return Err(FleetError::BufferNotAllowed(ark_address).into());
        }
        if ark_address.is_zero() {
            return Err(FleetError::UnknownArk(ark_address).into());
        }
        self.registry.add(ark_address, config, ark, self.address)?;
        Ok(())
    }

    /// Deregister an empty Ark, returning it with its commander cleared.
    pub fn remove_ark(
        &mut self,
        caller: &Address,
        ark_address: &Address,
    ) -> Result<Box<dyn Ark>, ArmadaError> {
        self.require_governor(caller)?;
        Ok(self.registry.remove(ark_address)?)
    }

    pub fn set_deposit_cap(&mut self, caller: &Address, cap: u64) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        self.config.deposit_cap = cap;
        debug!(cap, "fleet: deposit cap updated");
        Ok(())
    }

    pub fn set_minimum_buffer_balance(
        &mut self,
        caller: &Address,
        minimum: u64,
    ) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        self.config.minimum_buffer_balance = minimum;
        debug!(minimum, "fleet: minimum buffer balance updated");
        Ok(())
    }

    pub fn set_rebalance_cooldown(
        &mut self,
        caller: &Address,
        cooldown: u64,
    ) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        self.config.rebalance_cooldown = cooldown;
        debug!(cooldown, "fleet: rebalance cooldown updated");
        Ok(())
    }

    /// Update one Ark's limits.
    pub fn set_ark_config(
        &mut self,
        caller: &Address,
        ark: &Address,
        f: impl FnOnce(&mut ArkConfig),
    ) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        self.registry.update_config(ark, f)?;
        Ok(())
    }

    pub fn add_keeper(&mut self, caller: &Address, keeper: Address) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        self.roles.keepers.insert(keeper);
        Ok(())
    }

    pub fn remove_keeper(&mut self, caller: &Address, keeper: &Address) -> Result<(), ArmadaError> {
        self.require_governor(caller)?;
        self.roles.keepers.remove(keeper);
        Ok(())
    }

    /// One-way halt of deposit and rebalance paths. Withdrawals continue.
    pub fn emergency_shutdown(&mut self, caller: &Address) -> Result<(), ArmadaError> {
        if !self.roles.is_governor(caller) && !self.roles.is_curator(caller) {
            return Err(AccessError::Unauthorized { caller: *caller, role: Role::Curator }.into());
        }
        self.shut_down = true;
        warn!(fleet = %self.address, "fleet: emergency shutdown");
        Ok(())
    }

    // ------------------------------------------------------------------
    // User paths: deposit / withdraw / redeem
    // ------------------------------------------------------------------

    /// Deposit `assets` into the buffer, minting shares to `receiver`.
    ///
    /// # Errors
    ///
    /// - [`FleetError::Shutdown`] after emergency shutdown
    /// - [`FleetError::DepositCapExceeded`] past the fleet-wide cap
    /// - [`FleetError::ZeroAmount`] / [`FleetError::ZeroShares`]
    pub fn deposit(&mut self, assets: u64, receiver: Address) -> Result<u64, FleetError> {
        if self.shut_down {
            return Err(FleetError::Shutdown);
        }
        if assets == 0 {
            return Err(FleetError::ZeroAmount);
        }
        let total = self.total_assets();
        let new_total = total.checked_add(assets).ok_or(FleetError::ValueOverflow)?;
        if new_total > self.config.deposit_cap {
            return Err(FleetError::DepositCapExceeded {
                total,
                amount: assets,
                cap: self.config.deposit_cap,
            });
        }
        let minted = self.convert_to_shares(assets)?;
        if minted == 0 {
            return Err(FleetError::ZeroShares(assets));
        }

        self.buffer.ark.board(assets, &[])?;
        self.total_shares = self
            .total_shares
            .checked_add(minted)
            .ok_or(FleetError::ValueOverflow)?;
        *self.shares.entry(receiver).or_insert(0) += minted;

        info!(%receiver, assets, shares = minted, "fleet: deposit");
        Ok(minted)
    }

    /// Withdraw `amount` of assets for `owner`, burning shares.
    ///
    /// `AssetAmount::All` withdraws the owner's entire redeemable balance.
    /// Served buffer-first; shortfalls force uncapped exits across Arks.
    /// Returns `(assets, shares_burned)`.
    pub fn withdraw(
        &mut self,
        owner: Address,
        amount: AssetAmount,
    ) -> Result<(u64, u64), FleetError> {
        let owned_shares = self.share_balance_of(&owner);
        let max_assets = self.convert_to_assets(owned_shares)?;
        let assets = amount.resolve(max_assets);
        if assets == 0 {
            return Err(FleetError::ZeroAmount);
        }

        let burned = if amount.is_all() {
            owned_shares
        } else {
            mul_div_up(assets, self.total_shares, self.total_assets())
                .map_err(|_| FleetError::ValueOverflow)?
        };
        if burned > owned_shares {
            return Err(FleetError::InsufficientShares { have: owned_shares, need: burned });
        }

        self.exit(owner, assets, burned)
    }

    /// Redeem an exact number of shares for assets. `All` redeems everything.
    /// Returns `(assets, shares_burned)`.
    pub fn redeem(
        &mut self,
        owner: Address,
        shares: AssetAmount,
    ) -> Result<(u64, u64), FleetError> {
        let owned = self.share_balance_of(&owner);
        let burned = shares.resolve(owned);
        if burned == 0 {
            return Err(FleetError::ZeroAmount);
        }
        if burned > owned {
            return Err(FleetError::InsufficientShares { have: owned, need: burned });
        }
        let assets = self.convert_to_assets(burned)?;

        self.exit(owner, assets, burned)
    }

    /// Plan and commit an exit of `assets`, burning `burned` shares.
    ///
    /// If any Ark refuses its leg, every leg already disembarked is boarded
    /// back before the error surfaces, so a failed exit leaves balances and
    /// shares exactly as they were.
    fn exit(&mut self, owner: Address, assets: u64, burned: u64) -> Result<(u64, u64), FleetError> {
        let plan = self.plan_exit(assets)?;
        for (idx, (ark, amount)) in plan.iter().enumerate() {
            if let Err(err) = self.disembark_from(ark, *amount, &[]) {
                for (prev_ark, prev_amount) in plan[..idx].iter().rev() {
                    if let Err(undo) = self.board_to(prev_ark, *prev_amount, &[]) {
                        error!(%undo, ark = %prev_ark, amount = prev_amount,
                            "fleet: exit rollback re-board failed");
                    }
                }
                return Err(err);
            }
        }

        self.total_shares -= burned;
        if let Some(balance) = self.shares.get_mut(&owner) {
            *balance -= burned;
        }

        let forced = plan.iter().filter(|(a, _)| *a != self.buffer_address).count();
        info!(%owner, assets, shares = burned, forced_arks = forced, "fleet: withdrawal");
        Ok((assets, burned))
    }

    /// Buffer-first exit plan. The forced Ark legs ignore rebalance caps:
    /// a user exit is not a keeper rebalance.
    fn plan_exit(&self, assets: u64) -> Result<Vec<(Address, u64)>, FleetError> {
        let mut plan = Vec::new();
        let mut remaining = assets;

        let from_buffer = remaining.min(self.buffer_balance());
        if from_buffer > 0 {
            plan.push((self.buffer_address, from_buffer));
            remaining -= from_buffer;
        }

        if remaining > 0 {
            for (addr, entry) in self.registry.iter() {
                if remaining == 0 {
                    break;
                }
                let take = remaining.min(entry.ark.total_assets());
                if take > 0 {
                    plan.push((*addr, take));
                    remaining -= take;
                }
            }
        }

        if remaining > 0 {
            return Err(FleetError::WithdrawalShortfall {
                requested: assets,
                available: assets - remaining,
            });
        }
        Ok(plan)
    }

    // ------------------------------------------------------------------
    // Keeper paths: rebalance / adjust buffer
    // ------------------------------------------------------------------

    /// Move funds between Arks, buffer excluded. Keeper-only, cooldown-gated.
    pub fn rebalance(
        &mut self,
        caller: &Address,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
        now: u64,
    ) -> Result<(), ArmadaError> {
        self.require_keeper(caller)?;
        self.check_cooldown(now)?;
        self.rebalance_inner(ops, keeper_data, now)
    }

    /// [`rebalance`](Self::rebalance) without the cooldown gate.
    /// Restricted to the curator.
    pub fn force_rebalance(
        &mut self,
        caller: &Address,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
        now: u64,
    ) -> Result<(), ArmadaError> {
        self.require_curator(caller)?;
        self.rebalance_inner(ops, keeper_data, now)
    }

    fn rebalance_inner(
        &mut self,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
        now: u64,
    ) -> Result<(), ArmadaError> {
        if self.shut_down {
            return Err(FleetError::Shutdown.into());
        }
        let plan = self.plan_rebalance(ops, keeper_data)?;
        self.commit(&plan, keeper_data)?;
        self.last_rebalance_timestamp = Some(now);
        info!(ops = plan.len(), "fleet: rebalance committed");
        Ok(())
    }

    /// Move funds between the buffer and Arks. Keeper-only, cooldown-gated.
    ///
    /// Every operation must touch the buffer on exactly one side, all
    /// operations must share direction, and explicit amounts are required.
    pub fn adjust_buffer(
        &mut self,
        caller: &Address,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
        now: u64,
    ) -> Result<(), ArmadaError> {
        self.require_keeper(caller)?;
        if self.shut_down {
            return Err(FleetError::Shutdown.into());
        }
        self.check_cooldown(now)?;

        let (plan, direction) = self.plan_adjust_buffer(ops, keeper_data)?;
        self.commit(&plan, keeper_data)?;
        self.last_rebalance_timestamp = Some(now);
        info!(ops = plan.len(), ?direction, "fleet: buffer adjusted");
        Ok(())
    }

    fn check_cooldown(&self, now: u64) -> Result<(), FleetError> {
        if let Some(last) = self.last_rebalance_timestamp {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.config.rebalance_cooldown {
                return Err(FleetError::CooldownActive {
                    remaining: self.config.rebalance_cooldown - elapsed,
                });
            }
        }
        Ok(())
    }

    fn check_batch_size(ops: &[RebalanceOperation]) -> Result<(), FleetError> {
        if ops.is_empty() {
            return Err(FleetError::EmptyBatch);
        }
        if ops.len() > MAX_REBALANCE_OPERATIONS {
            return Err(FleetError::BatchTooLarge {
                size: ops.len(),
                max: MAX_REBALANCE_OPERATIONS,
            });
        }
        Ok(())
    }

    /// Validate a rebalance batch against a staged balance snapshot.
    fn plan_rebalance(
        &self,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
    ) -> Result<Vec<PlannedMove>, FleetError> {
        Self::check_batch_size(ops)?;

        let mut staged: BTreeMap<Address, u64> = BTreeMap::new();
        let mut plan = Vec::with_capacity(ops.len());

        for op in ops {
            if op.from_ark == self.buffer_address {
                return Err(FleetError::BufferNotAllowed(op.from_ark));
            }
            if op.to_ark == self.buffer_address {
                return Err(FleetError::BufferNotAllowed(op.to_ark));
            }
            if op.from_ark == op.to_ark {
                return Err(FleetError::SameArk(op.from_ark));
            }

            let from = self.registry.get(&op.from_ark).ok_or(FleetError::UnknownArk(op.from_ark))?;
            let to = self.registry.get(&op.to_ark).ok_or(FleetError::UnknownArk(op.to_ark))?;
            self.check_keeper_data(&op.from_ark, &from.config, keeper_data)?;
            self.check_keeper_data(&op.to_ark, &to.config, keeper_data)?;

            let from_balance = *staged
                .entry(op.from_ark)
                .or_insert_with(|| from.ark.total_assets());
            let amount = op.amount.resolve(from_balance);
            if amount == 0 {
                return Err(FleetError::ZeroAmount);
            }
            if amount > from_balance {
                return Err(FleetError::InsufficientArkBalance {
                    ark: op.from_ark,
                    have: from_balance,
                    need: amount,
                });
            }
            if amount > from.config.max_rebalance_outflow {
                return Err(FleetError::OutflowCapExceeded {
                    ark: op.from_ark,
                    amount,
                    max: from.config.max_rebalance_outflow,
                });
            }
            if amount > to.config.max_rebalance_inflow {
                return Err(FleetError::InflowCapExceeded {
                    ark: op.to_ark,
                    amount,
                    max: to.config.max_rebalance_inflow,
                });
            }

            let to_balance = *staged
                .entry(op.to_ark)
                .or_insert_with(|| to.ark.total_assets());
            let new_to = to_balance.checked_add(amount).ok_or(FleetError::ValueOverflow)?;
            if new_to > to.config.deposit_cap {
                return Err(FleetError::ArkDepositCapExceeded {
                    ark: op.to_ark,
                    balance: to_balance,
                    amount,
                    cap: to.config.deposit_cap,
                });
            }

            staged.insert(op.from_ark, from_balance - amount);
            staged.insert(op.to_ark, new_to);
            plan.push(PlannedMove { from: op.from_ark, to: op.to_ark, amount });
        }

        Ok(plan)
    }

    /// Validate an adjust-buffer batch: buffer on exactly one side of every
    /// operation, uniform direction, explicit amounts, buffer floor kept.
    fn plan_adjust_buffer(
        &self,
        ops: &[RebalanceOperation],
        keeper_data: &[u8],
    ) -> Result<(Vec<PlannedMove>, BufferDirection), FleetError> {
        Self::check_batch_size(ops)?;

        let mut staged: BTreeMap<Address, u64> = BTreeMap::new();
        staged.insert(self.buffer_address, self.buffer_balance());
        let mut plan = Vec::with_capacity(ops.len());
        let mut direction: Option<BufferDirection> = None;

        for op in ops {
            let from_buffer = op.from_ark == self.buffer_address;
            let to_buffer = op.to_ark == self.buffer_address;
            if from_buffer == to_buffer {
                // neither side, or both sides
                return Err(FleetError::BufferRequired);
            }
            if op.amount.is_all() {
                return Err(FleetError::MaxAmountNotAllowed);
            }
            let amount = op.amount.resolve(0);
            if amount == 0 {
                return Err(FleetError::ZeroAmount);
            }

            let op_direction = if to_buffer {
                BufferDirection::Inflow
            } else {
                BufferDirection::Outflow
            };
            match direction {
                None => direction = Some(op_direction),
                Some(d) if d != op_direction => return Err(FleetError::MixedBufferDirection),
                Some(_) => {}
            }

            let other = if to_buffer { op.from_ark } else { op.to_ark };
            let entry = self.registry.get(&other).ok_or(FleetError::UnknownArk(other))?;
            self.check_keeper_data(&other, &entry.config, keeper_data)?;

            let other_balance = *staged
                .entry(other)
                .or_insert_with(|| entry.ark.total_assets());
            let buffer_balance = staged[&self.buffer_address];

            match op_direction {
                BufferDirection::Inflow => {
                    if amount > other_balance {
                        return Err(FleetError::InsufficientArkBalance {
                            ark: other,
                            have: other_balance,
                            need: amount,
                        });
                    }
                    if amount > entry.config.max_rebalance_outflow {
                        return Err(FleetError::OutflowCapExceeded {
                            ark: other,
                            amount,
                            max: entry.config.max_rebalance_outflow,
                        });
                    }
                    let new_buffer = buffer_balance
                        .checked_add(amount)
                        .ok_or(FleetError::ValueOverflow)?;
                    staged.insert(other, other_balance - amount);
                    staged.insert(self.buffer_address, new_buffer);
                }
                BufferDirection::Outflow => {
                    if amount > buffer_balance {
                        return Err(FleetError::InsufficientArkBalance {
                            ark: self.buffer_address,
                            have: buffer_balance,
                            need: amount,
                        });
                    }
                    if amount > entry.config.max_rebalance_inflow {
                        return Err(FleetError::InflowCapExceeded {
                            ark: other,
                            amount,
                            max: entry.config.max_rebalance_inflow,
                        });
                    }
                    let new_other = other_balance
                        .checked_add(amount)
                        .ok_or(FleetError::ValueOverflow)?;
                    if new_other > entry.config.deposit_cap {
                        return Err(FleetError::ArkDepositCapExceeded {
                            ark: other,
                            balance: other_balance,
                            amount,
                            cap: entry.config.deposit_cap,
                        });
                    }
                    staged.insert(other, new_other);
                    staged.insert(self.buffer_address, buffer_balance - amount);
                }
            }

            plan.push(PlannedMove { from: op.from_ark, to: op.to_ark, amount });
        }

        if direction == Some(BufferDirection::Outflow)
            && staged[&self.buffer_address] < self.config.minimum_buffer_balance
        {
            return Err(FleetError::BelowMinimumBuffer {
                balance: staged[&self.buffer_address],
                minimum: self.config.minimum_buffer_balance,
            });
        }

        // direction is Some: check_batch_size rejected empty batches
        let direction = direction.ok_or(FleetError::EmptyBatch)?;
        Ok((plan, direction))
    }

    fn check_keeper_data(
        &self,
        ark: &Address,
        config: &ArkConfig,
        keeper_data: &[u8],
    ) -> Result<(), FleetError> {
        if config.requires_keeper_data && keeper_data.is_empty() {
            return Err(FleetError::KeeperDataRequired(*ark));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Apply a validated plan, unwinding on failure.
    ///
    /// Validation proves every leg is funded against the staged snapshot,
    /// but an Ark is an external collaborator and may still refuse a move.
    /// When that happens, every leg already applied is reversed before the
    /// error surfaces, so a failed batch leaves all balances untouched.
    fn commit(&mut self, plan: &[PlannedMove], keeper_data: &[u8]) -> Result<(), FleetError> {
        for (idx, mv) in plan.iter().enumerate() {
            if let Err(err) = self.apply_move(mv, keeper_data) {
                self.unwind_moves(&plan[..idx], keeper_data);
                return Err(err);
            }
        }
        Ok(())
    }

    /// One disembark+board leg. A board failure re-boards the source so the
    /// leg as a whole either applies or leaves both Arks unchanged.
    fn apply_move(&mut self, mv: &PlannedMove, keeper_data: &[u8]) -> Result<(), FleetError> {
        self.disembark_from(&mv.from, mv.amount, keeper_data)?;
        if let Err(err) = self.board_to(&mv.to, mv.amount, keeper_data) {
            if let Err(undo) = self.board_to(&mv.from, mv.amount, keeper_data) {
                error!(%undo, ark = %mv.from, amount = mv.amount,
                    "fleet: rollback re-board failed");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Reverse already-applied legs, newest first. Failures are logged
    /// rather than propagated: the original leg error is what the caller
    /// sees, and a refusing Ark here cannot be forced.
    fn unwind_moves(&mut self, applied: &[PlannedMove], keeper_data: &[u8]) {
        for mv in applied.iter().rev() {
            if let Err(undo) = self.disembark_from(&mv.to, mv.amount, keeper_data) {
                error!(%undo, ark = %mv.to, amount = mv.amount,
                    "fleet: rollback disembark failed");
                continue;
            }
            if let Err(undo) = self.board_to(&mv.from, mv.amount, keeper_data) {
                error!(%undo, ark = %mv.from, amount = mv.amount,
                    "fleet: rollback re-board failed");
            }
        }
    }

    fn entry_mut(&mut self, ark: &Address) -> Result<&mut ArkEntry, FleetError> {
        if *ark == self.buffer_address {
            Ok(&mut self.buffer)
        } else {
            self.registry.get_mut(ark).ok_or(FleetError::UnknownArk(*ark))
        }
    }

    /// Commander-checked disembark.
    fn disembark_from(
        &mut self,
        ark: &Address,
        amount: u64,
        data: &[u8],
    ) -> Result<(), FleetError> {
        let fleet = self.address;
        let address = *ark;
        let entry = self.entry_mut(ark)?;
        Self::check_commander(&address, &entry.config, fleet)?;
        entry.ark.disembark(amount, data)
    }

    /// Commander-checked board.
    fn board_to(&mut self, ark: &Address, amount: u64, data: &[u8]) -> Result<(), FleetError> {
        let fleet = self.address;
        let address = *ark;
        let entry = self.entry_mut(ark)?;
        Self::check_commander(&address, &entry.config, fleet)?;
        entry.ark.board(amount, data)
    }

    fn check_commander(
        ark: &Address,
        config: &ArkConfig,
        fleet: Address,
    ) -> Result<(), FleetError> {
        match config.commander {
            None => Err(FleetError::NoCommander(*ark)),
            Some(c) if c != fleet => Err(FleetError::ForeignCommander { ark: *ark, commander: c }),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultArk;

    const FLEET: Address = Address([0xF0; 20]);
    const BUFFER: Address = Address([0xB0; 20]);
    const GOV: Address = Address([0xAA; 20]);
    const ALICE: Address = Address([0x01; 20]);
    const BOB: Address = Address([0x02; 20]);
    const ARK_A: Address = Address([0x10; 20]);
    const ARK_B: Address = Address([0x20; 20]);

    fn op(from: Address, to: Address, amount: u64) -> RebalanceOperation {
        RebalanceOperation { from_ark: from, to_ark: to, amount: AssetAmount::Exact(amount) }
    }

    fn op_all(from: Address, to: Address) -> RebalanceOperation {
        RebalanceOperation { from_ark: from, to_ark: to, amount: AssetAmount::All }
    }

    /// Reports a balance so validation passes, then refuses every disembark.
    struct SeizedArk {
        balance: u64,
    }

    impl Ark for SeizedArk {
        fn board(&mut self, amount: u64, _data: &[u8]) -> Result<(), FleetError> {
            self.balance = self.balance.saturating_add(amount);
            Ok(())
        }

        fn disembark(&mut self, amount: u64, _data: &[u8]) -> Result<(), FleetError> {
            Err(FleetError::InsufficientArkBalance { ark: Address::ZERO, have: 0, need: amount })
        }

        fn total_assets(&self) -> u64 {
            self.balance
        }
    }

    /// Refuses every board; disembarks normally.
    struct FullArk {
        balance: u64,
    }

    impl Ark for FullArk {
        fn board(&mut self, _amount: u64, _data: &[u8]) -> Result<(), FleetError> {
            Err(FleetError::ValueOverflow)
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

    /// Fleet with two default-config Arks and the governor holding all roles.
    fn fleet() -> FleetCommander {
        let mut f = FleetCommander::new(
            FLEET,
            FleetConfig::default(),
            Roles::solo(GOV),
            BUFFER,
            Box::new(VaultArk::new()),
        );
        f.add_ark(&GOV, ARK_A, ArkConfig::default(), Box::new(VaultArk::new())).unwrap();
        f.add_ark(&GOV, ARK_B, ArkConfig::default(), Box::new(VaultArk::new())).unwrap();
        f
    }

    // --- deposit / shares ---

    #[test]
    fn first_deposit_mints_one_to_one() {
        let mut f = fleet();
        let shares = f.deposit(1_000, ALICE).unwrap();
        assert_eq!(shares, 1_000);
        assert_eq!(f.share_balance_of(&ALICE), 1_000);
        assert_eq!(f.buffer_balance(), 1_000);
        assert_eq!(f.total_assets(), 1_000);
    }

    #[test]
    fn second_deposit_proportional_after_yield() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        // simulate yield: buffer grows without minting
        f.buffer.ark.board(1_000, &[]).unwrap();
        assert_eq!(f.total_assets(), 2_000);

        // 500 assets into a 2000-asset, 1000-share pool => 250 shares
        let shares = f.deposit(500, BOB).unwrap();
        assert_eq!(shares, 250);
        assert_eq!(f.total_shares(), 1_250);
    }

    #[test]
    fn deposit_zero_rejected() {
        let mut f = fleet();
        assert_eq!(f.deposit(0, ALICE).unwrap_err(), FleetError::ZeroAmount);
    }

    #[test]
    fn deposit_cap_enforced() {
        let mut f = fleet();
        f.set_deposit_cap(&GOV, 1_500).unwrap();
        f.deposit(1_000, ALICE).unwrap();
        let err = f.deposit(600, ALICE).unwrap_err();
        assert_eq!(
            err,
            FleetError::DepositCapExceeded { total: 1_000, amount: 600, cap: 1_500 }
        );
        // exactly at the cap is fine
        f.deposit(500, ALICE).unwrap();
    }

    // --- withdraw / redeem ---

    #[test]
    fn withdraw_exact_from_buffer() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        let (assets, burned) = f.withdraw(ALICE, AssetAmount::Exact(400)).unwrap();
        assert_eq!((assets, burned), (400, 400));
        assert_eq!(f.buffer_balance(), 600);
        assert_eq!(f.share_balance_of(&ALICE), 600);
    }

    #[test]
    fn withdraw_all_empties_position() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        let (assets, burned) = f.withdraw(ALICE, AssetAmount::All).unwrap();
        assert_eq!((assets, burned), (1_000, 1_000));
        assert_eq!(f.share_balance_of(&ALICE), 0);
        assert_eq!(f.total_shares(), 0);
        assert_eq!(f.total_assets(), 0);
    }

    #[test]
    fn withdraw_more_than_owned_rejected() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        f.deposit(1_000, BOB).unwrap();
        let err = f.withdraw(ALICE, AssetAmount::Exact(1_500)).unwrap_err();
        assert!(matches!(err, FleetError::InsufficientShares { .. }));
        // balances untouched after rejection
        assert_eq!(f.share_balance_of(&ALICE), 1_000);
        assert_eq!(f.total_assets(), 2_000);
    }

    #[test]
    fn forced_withdrawal_ignores_rebalance_caps() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        // park almost everything in an ark with a tiny outflow cap
        f.adjust_buffer(&GOV, &[op(BUFFER, ARK_A, 900)], &[], 0).unwrap();
        f.set_ark_config(&GOV, &ARK_A, |c| c.max_rebalance_outflow = 1).unwrap();

        // withdrawal of 1000 needs 900 from the capped ark
        let (assets, burned) = f.withdraw(ALICE, AssetAmount::All).unwrap();
        assert_eq!((assets, burned), (1_000, 1_000));
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 0);
        assert_eq!(f.buffer_balance(), 0);
    }

    #[test]
    fn withdrawal_allowed_after_shutdown() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        f.emergency_shutdown(&GOV).unwrap();

        assert_eq!(f.deposit(1, ALICE).unwrap_err(), FleetError::Shutdown);
        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 1)], &[], 0).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::Shutdown)));

        let (assets, _) = f.withdraw(ALICE, AssetAmount::All).unwrap();
        assert_eq!(assets, 1_000);
    }

    #[test]
    fn redeem_exact_shares() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        f.buffer.ark.board(1_000, &[]).unwrap(); // yield doubles the pool
        let (assets, burned) = f.redeem(ALICE, AssetAmount::Exact(500)).unwrap();
        assert_eq!((assets, burned), (1_000, 500));
        assert_eq!(f.share_balance_of(&ALICE), 500);
    }

    // --- rebalance ---

    /// Funds a fleet and spreads 600 into ARK_A via adjust-buffer.
    fn funded_fleet() -> FleetCommander {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        f.adjust_buffer(&GOV, &[op(BUFFER, ARK_A, 600)], &[], 0).unwrap();
        f
    }

    #[test]
    fn rebalance_moves_between_arks() {
        let mut f = funded_fleet();
        f.rebalance(&GOV, &[op(ARK_A, ARK_B, 200)], &[], 10_000).unwrap();
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 400);
        assert_eq!(f.ark_balance(&ARK_B).unwrap(), 200);
        assert_eq!(f.total_assets(), 1_000);
    }

    #[test]
    fn rebalance_all_sentinel_drains_source() {
        let mut f = funded_fleet();
        f.rebalance(&GOV, &[op_all(ARK_A, ARK_B)], &[], 10_000).unwrap();
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 0);
        assert_eq!(f.ark_balance(&ARK_B).unwrap(), 600);
    }

    #[test]
    fn rebalance_all_respects_staged_balance() {
        let mut f = funded_fleet();
        // second op's All sees ARK_B's staged balance including the first leg
        let ops = [op(ARK_A, ARK_B, 100), op_all(ARK_B, ARK_A)];
        f.rebalance(&GOV, &ops, &[], 10_000).unwrap();
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 600);
        assert_eq!(f.ark_balance(&ARK_B).unwrap(), 0);
    }

    #[test]
    fn rebalance_requires_keeper_role() {
        let mut f = funded_fleet();
        let err = f.rebalance(&BOB, &[op(ARK_A, ARK_B, 10)], &[], 10_000).unwrap_err();
        assert!(matches!(
            err,
            ArmadaError::Access(AccessError::Unauthorized { role: Role::Keeper, .. })
        ));
    }

    #[test]
    fn rebalance_rejects_buffer_and_self_moves() {
        let mut f = funded_fleet();
        let err = f.rebalance(&GOV, &[op(BUFFER, ARK_A, 10)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::BufferNotAllowed(_))));

        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_A, 10)], &[], 20_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::SameArk(_))));
    }

    #[test]
    fn rebalance_batch_limits() {
        let mut f = funded_fleet();
        let err = f.rebalance(&GOV, &[], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::EmptyBatch)));

        let ops: Vec<_> = (0..=MAX_REBALANCE_OPERATIONS).map(|_| op(ARK_A, ARK_B, 1)).collect();
        let err = f.rebalance(&GOV, &ops, &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::BatchTooLarge { .. })));
    }

    #[test]
    fn rebalance_enforces_caps() {
        let mut f = funded_fleet();
        f.set_ark_config(&GOV, &ARK_A, |c| c.max_rebalance_outflow = 100).unwrap();
        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 101)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::OutflowCapExceeded { .. })));

        f.set_ark_config(&GOV, &ARK_A, |c| c.max_rebalance_outflow = u64::MAX).unwrap();
        f.set_ark_config(&GOV, &ARK_B, |c| c.max_rebalance_inflow = 50).unwrap();
        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 51)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::InflowCapExceeded { .. })));

        f.set_ark_config(&GOV, &ARK_B, |c| {
            c.max_rebalance_inflow = u64::MAX;
            c.deposit_cap = 30;
        })
        .unwrap();
        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 31)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::ArkDepositCapExceeded { .. })));
    }

    #[test]
    fn failed_batch_moves_nothing() {
        let mut f = funded_fleet();
        let before_a = f.ark_balance(&ARK_A).unwrap();
        let before_b = f.ark_balance(&ARK_B).unwrap();

        // first op is valid, second overdraws; whole batch must be rejected
        let ops = [op(ARK_A, ARK_B, 100), op(ARK_B, ARK_A, 10_000)];
        let err = f.rebalance(&GOV, &ops, &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::InsufficientArkBalance { .. })));

        assert_eq!(f.ark_balance(&ARK_A).unwrap(), before_a);
        assert_eq!(f.ark_balance(&ARK_B).unwrap(), before_b);
    }

    #[test]
    fn mid_commit_disembark_refusal_unwinds_applied_legs() {
        let mut f = funded_fleet();
        let ark_c = Address([0x30; 20]);
        // validation sees 300 in ARK_C; the disembark at commit still fails
        f.add_ark(&GOV, ark_c, ArkConfig::default(), Box::new(SeizedArk { balance: 300 }))
            .unwrap();

        let ops = [op(ARK_A, ARK_B, 200), op(ark_c, ARK_B, 100)];
        let err = f.rebalance(&GOV, &ops, &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::InsufficientArkBalance { .. })));

        // the first leg had already moved funds; it must be reversed
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 600);
        assert_eq!(f.ark_balance(&ARK_B).unwrap(), 0);
        assert_eq!(f.ark_balance(&ark_c).unwrap(), 300);
        assert_eq!(f.total_assets(), 1_300);
    }

    #[test]
    fn board_refusal_restores_the_disembarked_source() {
        let mut f = funded_fleet();
        let ark_c = Address([0x30; 20]);
        f.add_ark(&GOV, ark_c, ArkConfig::default(), Box::new(FullArk { balance: 0 }))
            .unwrap();

        let ops = [op(ARK_A, ARK_B, 200), op(ARK_A, ark_c, 100)];
        let err = f.rebalance(&GOV, &ops, &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::ValueOverflow)));

        // ARK_A was drained twice (200 + 100); both moves are undone
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 600);
        assert_eq!(f.ark_balance(&ARK_B).unwrap(), 0);
        assert_eq!(f.ark_balance(&ark_c).unwrap(), 0);
    }

    #[test]
    fn failed_exit_restores_balances_and_shares() {
        let mut f = fleet();
        let ark_c = Address([0x30; 20]);
        f.add_ark(&GOV, ark_c, ArkConfig::default(), Box::new(SeizedArk { balance: 0 }))
            .unwrap();
        f.deposit(1_000, ALICE).unwrap();
        f.adjust_buffer(&GOV, &[op(BUFFER, ark_c, 600)], &[], 0).unwrap();

        // exit needs 400 from the buffer plus 600 from the refusing Ark
        let err = f.withdraw(ALICE, AssetAmount::All).unwrap_err();
        assert!(matches!(err, FleetError::InsufficientArkBalance { .. }));

        // shares and assets both untouched: no repricing of other holders
        assert_eq!(f.total_shares(), 1_000);
        assert_eq!(f.share_balance_of(&ALICE), 1_000);
        assert_eq!(f.total_assets(), 1_000);
        assert_eq!(f.buffer_balance(), 400);
    }

    #[test]
    fn cooldown_gates_keeper_but_not_curator() {
        let mut f = funded_fleet(); // adjust_buffer at t=0 started the cooldown
        let cd = f.config().rebalance_cooldown;

        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 10)], &[], cd - 1).unwrap_err();
        assert!(matches!(
            err,
            ArmadaError::Fleet(FleetError::CooldownActive { remaining: 1 })
        ));

        // curator path bypasses the cooldown and restarts it
        f.force_rebalance(&GOV, &[op(ARK_A, ARK_B, 10)], &[], cd - 1).unwrap();
        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 10)], &[], cd).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::CooldownActive { .. })));

        // after a full cooldown from the forced run, the keeper path opens
        f.rebalance(&GOV, &[op(ARK_A, ARK_B, 10)], &[], (cd - 1) + cd).unwrap();
    }

    #[test]
    fn keeper_data_required_when_configured() {
        let mut f = funded_fleet();
        f.set_ark_config(&GOV, &ARK_B, |c| c.requires_keeper_data = true).unwrap();
        let err = f.rebalance(&GOV, &[op(ARK_A, ARK_B, 10)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::KeeperDataRequired(_))));

        f.rebalance(&GOV, &[op(ARK_A, ARK_B, 10)], b"position-7", 10_000).unwrap();
    }

    // --- adjust_buffer ---

    #[test]
    fn adjust_buffer_inflow_and_outflow() {
        let mut f = fleet();
        f.deposit(1_000, ALICE).unwrap();
        f.adjust_buffer(&GOV, &[op(BUFFER, ARK_A, 300), op(BUFFER, ARK_B, 200)], &[], 0)
            .unwrap();
        assert_eq!(f.buffer_balance(), 500);

        f.adjust_buffer(&GOV, &[op(ARK_A, BUFFER, 100)], &[], 10_000).unwrap();
        assert_eq!(f.buffer_balance(), 600);
        assert_eq!(f.ark_balance(&ARK_A).unwrap(), 200);
    }

    #[test]
    fn adjust_buffer_rejects_mixed_direction() {
        let mut f = funded_fleet();
        let ops = [op(BUFFER, ARK_B, 50), op(ARK_A, BUFFER, 50)];
        let err = f.adjust_buffer(&GOV, &ops, &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::MixedBufferDirection)));
    }

    #[test]
    fn adjust_buffer_requires_buffer_on_one_side() {
        let mut f = funded_fleet();
        let err = f.adjust_buffer(&GOV, &[op(ARK_A, ARK_B, 50)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::BufferRequired)));
    }

    #[test]
    fn adjust_buffer_rejects_all_sentinel() {
        let mut f = funded_fleet();
        let err = f.adjust_buffer(&GOV, &[op_all(BUFFER, ARK_A)], &[], 10_000).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::MaxAmountNotAllowed)));
    }

    #[test]
    fn adjust_buffer_enforces_minimum() {
        let mut f = fleet();
        f.set_minimum_buffer_balance(&GOV, 500).unwrap();
        f.deposit(1_000, ALICE).unwrap();

        let err = f.adjust_buffer(&GOV, &[op(BUFFER, ARK_A, 501)], &[], 0).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::BelowMinimumBuffer { .. })));
        assert_eq!(f.buffer_balance(), 1_000);

        // down to exactly the floor is allowed
        f.adjust_buffer(&GOV, &[op(BUFFER, ARK_A, 500)], &[], 0).unwrap();
        assert_eq!(f.buffer_balance(), 500);
    }

    // --- registry surface ---

    #[test]
    fn add_remove_ark_lifecycle() {
        let mut f = fleet();
        let ark_c = Address([0x30; 20]);
        f.add_ark(&GOV, ark_c, ArkConfig::default(), Box::new(VaultArk::new())).unwrap();
        assert!(f.registry().contains(&ark_c));

        let ark = f.remove_ark(&GOV, &ark_c).unwrap();
        assert_eq!(ark.total_assets(), 0);
        assert!(!f.registry().contains(&ark_c));
    }

    #[test]
    fn remove_nonempty_ark_rejected() {
        let mut f = funded_fleet();
        let err = f.remove_ark(&GOV, &ARK_A).unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::ArkNotEmpty { .. })));
    }

    #[test]
    fn add_ark_at_buffer_address_rejected() {
        let mut f = fleet();
        let err = f
            .add_ark(&GOV, BUFFER, ArkConfig::default(), Box::new(VaultArk::new()))
            .unwrap_err();
        assert!(matches!(err, ArmadaError::Fleet(FleetError::BufferNotAllowed(_))));
    }

    #[test]
    fn governance_gated_to_governor() {
        let mut f = fleet();
        let err = f.set_deposit_cap(&BOB, 1).unwrap_err();
        assert!(matches!(
            err,
            ArmadaError::Access(AccessError::Unauthorized { role: Role::Governor, .. })
        ));
        let err = f
            .add_ark(&BOB, Address([0x30; 20]), ArkConfig::default(), Box::new(VaultArk::new()))
            .unwrap_err();
        assert!(matches!(err, ArmadaError::Access(_)));
    }

    #[test]
    fn shutdown_is_one_way_and_dual_gated() {
        let mut f = fleet();
        let err = f.emergency_shutdown(&BOB).unwrap_err();
        assert!(matches!(err, ArmadaError::Access(_)));
        assert!(!f.is_shut_down());

        f.emergency_shutdown(&GOV).unwrap();
        assert!(f.is_shut_down());
        // idempotent
        f.emergency_shutdown(&GOV).unwrap();
        assert!(f.is_shut_down());
    }
}
