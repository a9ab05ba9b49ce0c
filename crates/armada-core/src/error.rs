//! Error types for the Armada protocol.
use thiserror::Error;

use crate::types::Address;

/// Roles recognized by access-gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Governance: parameter setters, registry mutation, shutdown.
    Governor,
    /// Automated rebalance caller within caps and cooldown.
    Keeper,
    /// Privileged keeper allowed to bypass the rebalance cooldown.
    Curator,
    /// The fleet authorized to move a given Ark's funds.
    Commander,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Governor => "governor",
            Self::Keeper => "keeper",
            Self::Curator => "curator",
            Self::Commander => "commander",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("caller {caller} lacks role {role}")] Unauthorized { caller: Address, role: Role },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecayError {
    #[error("decay rate {rate} exceeds WAD")] RateAboveWad { rate: u64 },
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("division by zero")] DivisionByZero,
    #[error("checkpoint timestamp {got} precedes latest {latest}")] NonMonotonicCheckpoint { got: u64, latest: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("fleet deposit cap exceeded: total {total} + {amount} > cap {cap}")] DepositCapExceeded { total: u64, amount: u64, cap: u64 },
    #[error("ark {ark} deposit cap exceeded: balance {balance} + {amount} > cap {cap}")] ArkDepositCapExceeded { ark: Address, balance: u64, amount: u64, cap: u64 },
    #[error("ark {ark} max inflow exceeded: {amount} > {max}")] InflowCapExceeded { ark: Address, amount: u64, max: u64 },
    #[error("ark {ark} max outflow exceeded: {amount} > {max}")] OutflowCapExceeded { ark: Address, amount: u64, max: u64 },
    #[error("ark {ark} balance insufficient: have {have}, need {need}")] InsufficientArkBalance { ark: Address, have: u64, need: u64 },
    #[error("rebalance cooldown active: {remaining}s remaining")] CooldownActive { remaining: u64 },
    #[error("batch too large: {size} > {max}")] BatchTooLarge { size: usize, max: usize },
    #[error("empty batch")] EmptyBatch,
    #[error("buffer ark {0} not allowed in rebalance")] BufferNotAllowed(Address),
    #[error("from and to are the same ark: {0}")] SameArk(Address),
    #[error("operation must touch the buffer on exactly one side")] BufferRequired,
    #[error("mixed-direction adjust-buffer batch")] MixedBufferDirection,
    #[error("'all' amount sentinel not allowed here")] MaxAmountNotAllowed,
    #[error("zero-amount operation")] ZeroAmount,
    #[error("buffer would drop below minimum: {balance} < {minimum}")] BelowMinimumBuffer { balance: u64, minimum: u64 },
    #[error("unknown ark: {0}")] UnknownArk(Address),
    #[error("ark already registered: {0}")] ArkAlreadyRegistered(Address),
    #[error("ark {ark} still holds {balance}, cannot remove")] ArkNotEmpty { ark: Address, balance: u64 },
    #[error("ark {0} has no commander")] NoCommander(Address),
    #[error("ark {ark} commanded by {commander}, not this fleet")] ForeignCommander { ark: Address, commander: Address },
    #[error("ark {0} requires keeper data")] KeeperDataRequired(Address),
    #[error("fleet is shut down")] Shutdown,
    #[error("insufficient shares: have {have}, need {need}")] InsufficientShares { have: u64, need: u64 },
    #[error("withdrawal shortfall: requested {requested}, available {available}")] WithdrawalShortfall { requested: u64, available: u64 },
    #[error("zero shares minted for deposit of {0}")] ZeroShares(u64),
    #[error("value overflow")] ValueOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("vote already cast by {account} on proposal {proposal}")] AlreadyVoted { account: Address, proposal: u64 },
    #[error("unknown proposal: {0}")] UnknownProposal(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArmadaError {
    #[error(transparent)] Access(#[from] AccessError),
    #[error(transparent)] Decay(#[from] DecayError),
    #[error(transparent)] Fleet(#[from] FleetError),
    #[error(transparent)] Governance(#[from] GovernanceError),
}
