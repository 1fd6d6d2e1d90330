//! Proof-of-work consensus core for scrypt-based chains.
//!
//! This crate provides pure Rust implementations of:
//! - 256-bit targets and the compact `nBits` encoding
//! - Overflow-tracking integers and fixed-point ratios
//! - Block time and clocks
//! - scrypt with interchangeable Salsa20 block layouts
//! - Time-dependent scrypt cost schedules
//! - Difficulty retargeting (twice-and-half, DigiShield, Kimoto Gravity Well)
//!   and DoS minimum-difficulty checks
//! - Genesis block construction and mining

pub mod block;
pub mod coinbase;
pub mod difficulty;
pub mod error;
pub mod fixed;
pub mod genesis;
pub mod hash;
pub mod merkle;
pub mod n_factor;
pub mod network;
pub mod pow;
pub mod retarget;
pub mod safe;
pub mod scrypt;
pub mod time;

pub use block::BlockHeader;
pub use difficulty::{hash_meets_target, Compact, Target, U256};
pub use error::{PowError, PowResult};
pub use fixed::{percent, Fixed, Percent, Seconds};
pub use genesis::{GenesisBlock, GenesisMiner, GenesisParams, MineStep};
pub use hash::{double_sha256, hash_to_display_hex};
pub use n_factor::{n_factor_table, NFactorRow, NFactorSchedule};
pub use network::{ChainContext, ChainParams, Network};
pub use pow::{check_proof_of_work, mine_batch, MergedMining, MiningResult, NoMergedMining, PowHash, PowHasher};
pub use retarget::{Algorithm, BlockIndex, BlockSample, Checkpoints, Difficulty, RetargetParameters, TimedBits};
pub use safe::Safe;
pub use scrypt::{Scratchpad, ScryptParams};
pub use time::{BlockDuration, BlockTime, Clock, ManualClock, SystemClock};
