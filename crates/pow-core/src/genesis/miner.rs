//! Mining a new genesis block.
//!
//! The search keeps a synthetic difficulty history and asks the retarget
//! engine for a new target whenever a block is found too fast or the
//! search drags on, so the final genesis difficulty matches what the
//! network's hash rate can sustain.

use tracing::info;

use crate::block::BlockHeader;
use crate::difficulty::{Compact, Target};
use crate::error::{PowError, PowResult};
use crate::pow::{mine_batch, PowHash, PowHasher};
use crate::retarget::{BlockSample, Difficulty};
use crate::time::{BlockTime, Clock};

/// Nonces tried per [`GenesisMiner::mine`] step.
const MINE_CHUNK: u32 = 1 << 16;

/// Result of one [`GenesisMiner::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineStep {
    /// The header meets its target at a sensible pace.
    Found(BlockHeader),
    /// Nothing yet.
    Searching,
    /// The target was recalculated and the search goes on.
    Recalibrated { bits: Compact },
}

/// Batched genesis search over nonce and time.
#[derive(Debug)]
pub struct GenesisMiner<C: Clock> {
    header: BlockHeader,
    hasher: PowHasher,
    engine: Difficulty,
    clock: C,
    /// Synthetic history, oldest first.
    history: Vec<BlockSample>,
    target: Target,
    round_start: BlockTime,
    best: Target,
    hashes: u64,
}

impl<C: Clock> GenesisMiner<C> {
    /// Start mining `header` from nonce zero at the clock's current time
    /// and the engine's minimum difficulty. The engine's block period is
    /// scaled by `cores` to account for the hash rate the chain expects.
    pub fn new(
        header: BlockHeader,
        pow: PowHash,
        engine: &Difficulty,
        cores: u32,
        clock: C,
    ) -> PowResult<Self> {
        let engine = engine.with_block_period(engine.block_period() * cores.max(1) as i64)?;
        let now = clock.now();
        let timestamp = now.to_ntime().ok_or_else(|| {
            PowError::InvalidParameters(format!("clock time {} does not fit nTime", now))
        })?;

        let bits = engine.min_difficulty();
        let header = BlockHeader {
            timestamp,
            bits,
            nonce: 0,
            ..header
        };

        Ok(GenesisMiner {
            header,
            hasher: PowHasher::new(pow),
            target: engine.min_target(),
            engine,
            clock,
            history: vec![BlockSample::new(0, bits, now)],
            round_start: now,
            best: Target::MAX,
            hashes: 0,
        })
    }

    /// The header being searched, with its current bits, time and nonce.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn hashes(&self) -> u64 {
        self.hashes
    }

    /// Lowest hash of the current round, as a number.
    pub fn best(&self) -> Target {
        self.best
    }

    pub fn engine(&self) -> &Difficulty {
        &self.engine
    }

    /// Try up to `max_hashes` nonces.
    pub fn step(&mut self, max_hashes: u32) -> PowResult<MineStep> {
        let batch = mine_batch(
            &self.header,
            &mut self.hasher,
            &self.target,
            self.header.nonce,
            max_hashes,
        )?;
        self.hashes += batch.hashes_computed;

        let best = Target::from_hash(&batch.best_hash);
        let improved = batch.hashes_computed > 0 && best < self.best;
        if improved {
            self.best = best;
        }

        let period = self.engine.block_period();
        let now = self.clock.now();
        let passed = now - self.round_start;

        if let Some(nonce) = batch.nonce {
            self.header.nonce = nonce;
            if passed < period / 2 {
                info!(secs = passed.as_secs(), "genesis search too short");
                self.advance_nonce(1);
                return self.recalibrate(now);
            }
            info!(
                nonce,
                time = self.header.timestamp,
                bits = %self.header.bits,
                hashes = self.hashes,
                "genesis block found"
            );
            return Ok(MineStep::Found(self.header));
        }

        self.advance_nonce(batch.hashes_computed);
        if improved && passed > period + period / 2 {
            info!(secs = passed.as_secs(), "genesis search too long");
            return self.recalibrate(now);
        }
        Ok(MineStep::Searching)
    }

    /// Step until a block is found.
    pub fn mine(&mut self) -> PowResult<BlockHeader> {
        loop {
            if let MineStep::Found(header) = self.step(MINE_CHUNK)? {
                return Ok(header);
            }
        }
    }

    /// Move the nonce forward, bumping the time when it wraps.
    fn advance_nonce(&mut self, by: u64) {
        let next = self.header.nonce as u64 + by;
        if next > u32::MAX as u64 {
            info!(time = self.header.timestamp, "nonce wrapped, incrementing time");
            self.header.timestamp = self.header.timestamp.wrapping_add(1);
        }
        self.header.nonce = next as u32;
    }

    fn recalibrate(&mut self, now: BlockTime) -> PowResult<MineStep> {
        let height = self.history.last().map_or(0, |s| s.height + 1);
        self.history.push(BlockSample::new(height, self.header.bits, now));

        let bits = self
            .engine
            .next_block_difficulty(self.history.iter().rev().copied())?;
        info!(before = %self.header.bits, after = %bits, height, "genesis difficulty recalibrated");

        self.header.bits = bits;
        self.target = bits.to_target();
        self.round_start = now;
        self.best = Target::MAX;
        Ok(MineStep::Recalibrated { bits })
    }
}
