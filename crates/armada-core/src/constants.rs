//! Protocol constants. All fixed-point values use WAD (10^18) precision.

/// Fixed-point unit: 1.0 in 18-decimal precision.
///
/// Decay factors live in `[0, WAD]`, where `WAD` means full retention
/// (100% of raw voting power) and `0` means fully decayed.
pub const WAD: u64 = 1_000_000_000_000_000_000;

/// Seconds in a 365-day year, used to express per-second decay rates.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Default maximum delegation-chain traversal depth.
///
/// The walk consults at most this many delegates beyond the queried
/// account. Parameterized in `DecayParams` rather than hardcoded; this is
/// only the default.
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 2;

/// Default decay-free window: no decay accrues within this many seconds
/// of an account's last qualifying governance action.
pub const DEFAULT_DECAY_FREE_WINDOW: u64 = 30 * 24 * 60 * 60;

/// Default linear decay rate per second, ~10% of WAD per year.
///
/// `WAD / 10 / SECONDS_PER_YEAR`, rounded to the nearest integer.
pub const DEFAULT_DECAY_RATE_PER_SECOND: u64 = 3_170_979_198;

/// Maximum number of operations in a single rebalance or adjust-buffer batch.
pub const MAX_REBALANCE_OPERATIONS: usize = 50;

/// Default cooldown between keeper rebalances, in seconds.
pub const DEFAULT_REBALANCE_COOLDOWN: u64 = 60 * 60;
