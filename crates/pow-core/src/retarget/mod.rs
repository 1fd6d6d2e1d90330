//! Difficulty retargeting.
//!
//! A [`Difficulty`] engine owns the chain's retarget parameters and picks the
//! next block's compact difficulty from recent history, using one of three
//! algorithms chosen at construction time. It also bounds how easy a block
//! may claim to be relative to the last checkpoint, to make fabricating a
//! long low-difficulty chain expensive.

mod digishield;
mod history;
mod kgw;
mod twice_and_half;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::difficulty::{Compact, Target};
use crate::error::{PowError, PowResult};
use crate::fixed::{percent_serde, Percent};
use crate::time::{BlockDuration, BlockTime};

pub use history::{Ancestors, BlockIndex, BlockSample, Checkpoints};

/// How far past the linear projection a block's difficulty may drop
/// relative to the last checkpoint.
pub const DOS_ADJUSTMENT: Percent = Percent::from_raw(110);

/// Retarget algorithm and its tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Algorithm {
    /// Halve or double the target each block.
    TwiceAndHalf,
    /// Damped single-interval retarget.
    Digishield {
        damping: i64,
        #[serde(with = "percent_serde")]
        dos_adjustment: Percent,
    },
    /// Kimoto Gravity Well.
    Kgw {
        past_min: BlockDuration,
        past_max: BlockDuration,
        retarget_interval: u32,
        #[serde(with = "percent_serde")]
        dos_adjustment: Percent,
    },
}

impl Algorithm {
    pub fn digishield() -> Self {
        Algorithm::Digishield {
            damping: 8,
            dos_adjustment: DOS_ADJUSTMENT,
        }
    }

    /// Vertcoin's window: six hours to a week, retargeting every 12 blocks.
    pub fn kgw() -> Self {
        Algorithm::Kgw {
            past_min: BlockDuration::hours(6),
            past_max: BlockDuration::days(7),
            retarget_interval: 12,
            dos_adjustment: DOS_ADJUSTMENT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::TwiceAndHalf => "twice_and_half",
            Algorithm::Digishield { .. } => "digishield",
            Algorithm::Kgw { .. } => "kgw",
        }
    }
}

/// Per-chain retarget parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetargetParameters {
    /// Desired average time between blocks.
    pub block_period: BlockDuration,
    /// The easiest difficulty ever allowed.
    pub min_difficulty: Compact,
    #[serde(flatten)]
    pub algorithm: Algorithm,
}

/// Anything with a timestamp and claimed difficulty.
pub trait TimedBits {
    fn bits(&self) -> Compact;
    fn time(&self) -> BlockTime;
}

impl TimedBits for BlockSample {
    fn bits(&self) -> Compact {
        self.difficulty
    }

    fn time(&self) -> BlockTime {
        self.time
    }
}

/// The retarget engine.
#[derive(Clone, Debug)]
pub struct Difficulty {
    params: RetargetParameters,
    min_target: Target,
    window: Option<kgw::Window>,
}

impl Difficulty {
    /// Validate `params` and build the engine.
    pub fn new(params: RetargetParameters) -> PowResult<Self> {
        let invalid = |msg: String| PowError::InvalidParameters(msg);

        if params.block_period.as_secs() <= 0 {
            return Err(invalid(format!("block period {} must be positive", params.block_period)));
        }
        let min_target = params.min_difficulty.to_target();
        if min_target.is_zero() {
            return Err(invalid(format!(
                "minimum difficulty {} decodes to zero",
                params.min_difficulty
            )));
        }

        let window = match &params.algorithm {
            Algorithm::TwiceAndHalf => None,
            Algorithm::Digishield {
                damping,
                dos_adjustment,
            } => {
                if *damping <= 0 {
                    return Err(invalid(format!("damping {} must be positive", damping)));
                }
                dos_adjustment.ratio()?;
                None
            }
            Algorithm::Kgw {
                past_min,
                past_max,
                retarget_interval,
                dos_adjustment,
            } => {
                let past_blocks_min = *past_min / params.block_period;
                let past_blocks_max = *past_max / params.block_period;
                if past_blocks_min < 1 || past_blocks_max < past_blocks_min || *retarget_interval == 0 {
                    return Err(invalid(format!(
                        "kgw window {}..{} every {} blocks is not usable",
                        past_min, past_max, retarget_interval
                    )));
                }
                dos_adjustment.ratio()?;
                Some(kgw::Window {
                    past_blocks_min: past_blocks_min as u64,
                    past_blocks_max: past_blocks_max as u64,
                    retarget_interval: *retarget_interval,
                })
            }
        };

        Ok(Difficulty {
            params,
            min_target,
            window,
        })
    }

    pub fn params(&self) -> &RetargetParameters {
        &self.params
    }

    pub fn block_period(&self) -> BlockDuration {
        self.params.block_period
    }

    pub fn min_difficulty(&self) -> Compact {
        self.params.min_difficulty
    }

    pub fn min_target(&self) -> Target {
        self.min_target
    }

    /// The same engine aiming for a different block period.
    pub fn with_block_period(&self, block_period: BlockDuration) -> PowResult<Self> {
        Difficulty::new(RetargetParameters {
            block_period,
            ..self.params.clone()
        })
    }

    /// Difficulty for the block after the newest sample in `history`.
    ///
    /// `history` yields samples newest first; its last item is the oldest
    /// block the algorithm may look at. It is cloned to restart the walk.
    /// Empty history gives the minimum difficulty and a single sample
    /// repeats that sample's difficulty.
    pub fn next_block_difficulty<I>(&self, history: I) -> PowResult<Compact>
    where
        I: IntoIterator<Item = BlockSample>,
        I::IntoIter: Clone,
    {
        let history = history.into_iter();
        let mut walk = history.clone();
        let newest = match walk.next() {
            Some(sample) => sample,
            None => return Ok(self.params.min_difficulty),
        };
        let parent = match walk.next() {
            Some(sample) => sample,
            None => return Ok(newest.difficulty),
        };

        let period = self.params.block_period;
        match (&self.params.algorithm, &self.window) {
            (Algorithm::TwiceAndHalf, _) => Ok(twice_and_half::next_difficulty(
                &newest,
                &parent,
                period,
                self.min_target,
            )),
            (Algorithm::Digishield { damping, .. }, _) => {
                digishield::next_difficulty(&newest, &parent, period, *damping, self.min_target)
            }
            (Algorithm::Kgw { .. }, Some(window)) => {
                kgw::next_difficulty(history, window, period, self.min_target)
            }
            (Algorithm::Kgw { .. }, None) => Err(PowError::InvalidParameters(
                "kgw engine built without a window".to_string(),
            )),
        }
    }

    /// Difficulty for the child of `last`, walking its ancestors.
    pub fn next_block_difficulty_after<B: BlockIndex>(&self, last: Option<&B>) -> PowResult<Compact> {
        match last {
            None => Ok(self.params.min_difficulty),
            Some(block) => self.next_block_difficulty(block.ancestors()),
        }
    }

    /// The easiest difficulty a block may claim `past` after the last
    /// reliable block, whose difficulty was `last_reliable`.
    pub fn dos_min_difficulty(&self, last_reliable: Compact, past: BlockDuration) -> PowResult<Compact> {
        if past.is_negative() {
            return Err(PowError::InvalidTimestamp {
                behind: -past.as_secs(),
            });
        }

        let adjustment = match &self.params.algorithm {
            Algorithm::TwiceAndHalf => return Ok(self.params.min_difficulty),
            Algorithm::Digishield { dos_adjustment, .. } | Algorithm::Kgw { dos_adjustment, .. } => {
                *dos_adjustment
            }
        };

        let target = last_reliable
            .to_target()
            .mul_div(past.as_secs() as u64, self.params.block_period.as_secs() as u64)
            .scale(adjustment)?
            .min(self.min_target);
        Ok(target.to_compact())
    }

    /// [`dos_min_difficulty`](Self::dos_min_difficulty) for a block at
    /// `time`.
    pub fn dos_min_difficulty_at(&self, time: BlockTime, last_reliable: &BlockSample) -> PowResult<Compact> {
        self.dos_min_difficulty(last_reliable.difficulty, time - last_reliable.time)
    }

    /// True when `bits` decodes to a non-zero target no easier than the
    /// minimum difficulty.
    pub fn is_valid(&self, bits: Compact) -> bool {
        let target = bits.to_target();
        !target.is_zero() && target <= self.min_target
    }

    /// Reject `block` if it claims less work than the DoS minimum.
    pub fn dos_check_min_difficulty<B: TimedBits>(
        &self,
        block: &B,
        last_reliable: &BlockSample,
    ) -> PowResult<()> {
        let min_allowed = self.dos_min_difficulty_at(block.time(), last_reliable)?;
        if block.bits().to_target() > min_allowed.to_target() {
            warn!(
                bits = %block.bits(),
                min_allowed = %min_allowed,
                "block with too little proof-of-work"
            );
            return Err(PowError::InvalidDifficulty {
                got: block.bits().bits(),
                min_allowed: min_allowed.bits(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::history::tests::chain;
    use super::*;
    use crate::fixed::percent;
    use proptest::prelude::*;

    const PERIOD: BlockDuration = BlockDuration::seconds(150);
    const MIN_BITS: u32 = 0x1e0fffff;
    const BASE_BITS: u32 = 0x1c0ffff0;

    fn engine(algorithm: Algorithm) -> Difficulty {
        Difficulty::new(RetargetParameters {
            block_period: PERIOD,
            min_difficulty: Compact::new(MIN_BITS),
            algorithm,
        })
        .unwrap()
    }

    fn all_engines() -> Vec<Difficulty> {
        vec![
            engine(Algorithm::TwiceAndHalf),
            engine(Algorithm::digishield()),
            engine(Algorithm::kgw()),
        ]
    }

    fn sample(height: u32, bits: u32, time: i64) -> BlockSample {
        BlockSample::new(height, Compact::new(bits), BlockTime::from_unix(time))
    }

    /// `count` samples newest first, `spacing` seconds apart, ending at
    /// `newest_height`.
    fn steady(newest_height: u32, count: u32, spacing: i64, bits: u32) -> Vec<BlockSample> {
        (0..count)
            .map(|i| {
                let height = newest_height - i;
                sample(height, bits, 1_000_000 + height as i64 * spacing)
            })
            .collect()
    }

    fn small_kgw() -> Difficulty {
        engine(Algorithm::Kgw {
            past_min: PERIOD * 10,
            past_max: PERIOD * 50,
            retarget_interval: 1,
            dos_adjustment: DOS_ADJUSTMENT,
        })
    }

    #[test]
    fn test_empty_history_gives_min_difficulty() {
        for engine in all_engines() {
            assert_eq!(
                engine.next_block_difficulty(Vec::new()).unwrap().bits(),
                MIN_BITS
            );
            assert_eq!(
                engine
                    .next_block_difficulty_after::<super::history::tests::Node>(None)
                    .unwrap()
                    .bits(),
                MIN_BITS
            );
        }
    }

    #[test]
    fn test_single_sample_repeats_difficulty() {
        let genesis = sample(0, BASE_BITS, 1_317_972_665);
        for engine in all_engines() {
            assert_eq!(engine.next_block_difficulty(vec![genesis]).unwrap().bits(), BASE_BITS);

            let tip = chain(&[genesis]).unwrap();
            assert_eq!(engine.next_block_difficulty_after(Some(&tip)).unwrap().bits(), BASE_BITS);
        }
    }

    #[test]
    fn test_twice_and_half() {
        let engine = engine(Algorithm::TwiceAndHalf);
        let base = Compact::new(BASE_BITS).to_target();

        let fast = [sample(2, BASE_BITS, 1100), sample(1, BASE_BITS, 1000)];
        assert_eq!(engine.next_block_difficulty(fast).unwrap(), base.shr(1).to_compact());

        let slow = [sample(2, BASE_BITS, 1150), sample(1, BASE_BITS, 1000)];
        assert_eq!(engine.next_block_difficulty(slow).unwrap(), base.shl(1).to_compact());

        // Never easier than the minimum
        let easy = [sample(2, MIN_BITS, 5000), sample(1, MIN_BITS, 1000)];
        assert_eq!(engine.next_block_difficulty(easy).unwrap().bits(), MIN_BITS);
    }

    #[test]
    fn test_digishield_intervals() {
        let engine = engine(Algorithm::digishield());
        let base = Compact::new(BASE_BITS).to_target();
        let next = |interval: i64| {
            engine
                .next_block_difficulty([
                    sample(2, BASE_BITS, 1000 + interval),
                    sample(1, BASE_BITS, 1000),
                ])
                .unwrap()
        };

        // On schedule: unchanged
        assert_eq!(next(150).bits(), BASE_BITS);
        // Zero interval counts as one second: 150 + (1 - 150) / 8 = 132
        assert_eq!(next(0), base.mul_div(132, 150).to_compact());
        // Slow: 150 + 9850 / 8 = 1381, bounded to 225
        assert_eq!(next(10_000), base.mul_div(225, 150).to_compact());
        // Fast: 150 + (-1150) / 8 = 7, bounded to 112
        assert_eq!(next(-1000), base.mul_div(112, 150).to_compact());
        // Inside the band: 150 + (-250) / 8 = 119
        assert_eq!(next(-100), base.mul_div(119, 150).to_compact());
    }

    #[test]
    fn test_kgw_steady_chain() {
        let engine = small_kgw();
        let base = Compact::new(BASE_BITS).to_target();
        let history = steady(100, 101, 150, BASE_BITS);

        // No rate deviation: the window runs to its maximum of 50 blocks and
        // stops at the 51st, which is left out of the sum but not the divisor
        let expected = base.mul_div(50, 51).mul_div(50 * 150, 51 * 150).to_compact();
        let next = engine.next_block_difficulty(history).unwrap();
        assert_eq!(next, expected);
        assert_eq!(next.bits(), 0x1c0f60e3);
    }

    #[test]
    fn test_kgw_never_stops_at_oldest_sample() {
        let engine = small_kgw();

        // The 51st sample would end the walk, but it is the oldest one given
        let history = steady(100, 51, 150, BASE_BITS);
        assert_eq!(engine.next_block_difficulty(history).unwrap().bits(), MIN_BITS);

        let history = steady(100, 52, 150, BASE_BITS);
        assert_ne!(engine.next_block_difficulty(history).unwrap().bits(), MIN_BITS);
    }

    #[test]
    fn test_kgw_fast_chain_gets_harder() {
        let engine = small_kgw();
        let base = Compact::new(BASE_BITS).to_target();
        let history = steady(100, 101, 15, BASE_BITS);

        // Ten times too fast: leaves the horizon as soon as the window
        // reaches its minimum of 10 blocks
        let expected = base.mul_div(9, 10).mul_div(9 * 15, 10 * 150).to_compact();
        let next = engine.next_block_difficulty(history).unwrap();
        assert_eq!(next, expected);
        assert!(next < Compact::new(BASE_BITS));
    }

    #[test]
    fn test_kgw_early_and_degenerate_histories() {
        let engine = small_kgw();

        // Fewer than 10 intervals of history
        let short = steady(100, 10, 150, BASE_BITS);
        assert_eq!(engine.next_block_difficulty(short).unwrap().bits(), MIN_BITS);

        // Identical timestamps never leave the horizon and the stopping block
        // is not older than the newest
        let frozen: Vec<_> = (0..60).map(|i| sample(100 - i, BASE_BITS, 5000)).collect();
        assert_eq!(engine.next_block_difficulty(frozen).unwrap().bits(), MIN_BITS);

        // History runs out before the walk stops
        let truncated = steady(100, 30, 150, BASE_BITS);
        assert_eq!(engine.next_block_difficulty(truncated).unwrap().bits(), MIN_BITS);
    }

    #[test]
    fn test_kgw_retarget_interval() {
        let engine = engine(Algorithm::kgw());
        let history = steady(13, 14, 150, BASE_BITS);
        assert_eq!(engine.next_block_difficulty(history).unwrap().bits(), BASE_BITS);

        // On the boundary but inside the 144-block early window
        let history = steady(12, 13, 150, BASE_BITS);
        assert_eq!(engine.next_block_difficulty(history).unwrap().bits(), MIN_BITS);
    }

    #[test]
    fn test_kgw_walks_block_index() {
        let engine = small_kgw();
        let mut oldest_first = steady(100, 101, 15, BASE_BITS);
        oldest_first.reverse();
        let tip = chain(&oldest_first).unwrap();

        let via_index = engine.next_block_difficulty_after(Some(&tip)).unwrap();
        let via_samples = engine.next_block_difficulty(steady(100, 101, 15, BASE_BITS)).unwrap();
        assert_eq!(via_index, via_samples);
    }

    #[test]
    fn test_dos_min_difficulty() {
        let base = Compact::new(BASE_BITS);

        let engine = engine(Algorithm::digishield());
        let expected = base.to_target().mul_div(10, 1).mul_div(110, 100).to_compact();
        assert_eq!(engine.dos_min_difficulty(base, PERIOD * 10).unwrap(), expected);

        // Far enough out the minimum difficulty takes over
        assert_eq!(
            engine.dos_min_difficulty(base, BlockDuration::days(365)).unwrap().bits(),
            MIN_BITS
        );

        let fixed_step = self::engine(Algorithm::TwiceAndHalf);
        assert_eq!(fixed_step.dos_min_difficulty(base, PERIOD).unwrap().bits(), MIN_BITS);
    }

    #[test]
    fn test_negative_elapsed_is_rejected() {
        let checkpoint = sample(1000, BASE_BITS, 1000);
        let block = sample(1001, BASE_BITS, 999);
        for engine in all_engines() {
            assert!(matches!(
                engine.dos_min_difficulty_at(block.time, &checkpoint),
                Err(PowError::InvalidTimestamp { behind: 1 })
            ));
            assert!(matches!(
                engine.dos_check_min_difficulty(&block, &checkpoint),
                Err(PowError::InvalidTimestamp { .. })
            ));
        }
    }

    #[test]
    fn test_dos_check_min_difficulty() {
        let engine = engine(Algorithm::kgw());
        let checkpoint = sample(1000, BASE_BITS, 1_000_000);
        let mut checkpoints = Checkpoints::new(sample(0, MIN_BITS, 0));
        checkpoints.insert(checkpoint);
        let reliable = checkpoints.last_reliable_block();

        // One period later the target may grow by at most 10%
        let honest = sample(1001, BASE_BITS, 1_000_150);
        engine.dos_check_min_difficulty(&honest, &reliable).unwrap();

        let cheap_bits = Compact::new(BASE_BITS).to_target().shl(2).to_compact();
        let cheap = BlockSample::new(1001, cheap_bits, BlockTime::from_unix(1_000_150));
        assert!(matches!(
            engine.dos_check_min_difficulty(&cheap, &reliable),
            Err(PowError::InvalidDifficulty { .. })
        ));

        // The same claim is fine a month later
        let later = BlockSample::new(2000, cheap_bits, BlockTime::from_unix(1_000_000 + 30 * 86_400));
        engine.dos_check_min_difficulty(&later, &reliable).unwrap();
    }

    #[test]
    fn test_is_valid() {
        let engine = engine(Algorithm::digishield());
        assert!(engine.is_valid(Compact::new(MIN_BITS)));
        assert!(engine.is_valid(Compact::new(BASE_BITS)));
        assert!(!engine.is_valid(Compact::new(0)));
        assert!(!engine.is_valid(Compact::new(0x04923456)));
        assert!(!engine.is_valid(Compact::new(0x1f00ffff)));
    }

    #[test]
    fn test_invalid_parameters() {
        let params = |block_period, min_bits, algorithm| RetargetParameters {
            block_period,
            min_difficulty: Compact::new(min_bits),
            algorithm,
        };
        assert!(Difficulty::new(params(BlockDuration::ZERO, MIN_BITS, Algorithm::kgw())).is_err());
        assert!(Difficulty::new(params(PERIOD, 0, Algorithm::kgw())).is_err());
        assert!(Difficulty::new(params(
            PERIOD,
            MIN_BITS,
            Algorithm::Digishield {
                damping: 0,
                dos_adjustment: DOS_ADJUSTMENT
            }
        ))
        .is_err());
        // A day-long block period leaves no room for a six-hour window
        assert!(Difficulty::new(params(BlockDuration::days(1), MIN_BITS, Algorithm::kgw())).is_err());
    }

    #[test]
    fn test_parameters_json() {
        let json = r#"{
            "block_period": 150,
            "min_difficulty": "1e0fffff",
            "algorithm": "digishield",
            "damping": 8,
            "dos_adjustment": 110
        }"#;
        let params: RetargetParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.algorithm, Algorithm::digishield());
        assert_eq!(params.block_period, PERIOD);

        let bad = json.replace("110", "110.5");
        assert!(serde_json::from_str::<RetargetParameters>(&bad).is_err());

        let round = serde_json::to_string(&RetargetParameters {
            block_period: PERIOD,
            min_difficulty: Compact::new(MIN_BITS),
            algorithm: Algorithm::kgw(),
        })
        .unwrap();
        let back: RetargetParameters = serde_json::from_str(&round).unwrap();
        assert_eq!(back.algorithm, Algorithm::kgw());
        assert_eq!(percent(110.0).unwrap(), DOS_ADJUSTMENT);
    }

    proptest! {
        #[test]
        fn prop_digishield_is_bounded(interval in -1_000_000i64..1_000_000, bits in 0x1a010000u32..0x1c7fffff) {
            let engine = engine(Algorithm::digishield());
            let old = Compact::new(bits).to_target();
            let next = engine
                .next_block_difficulty([sample(2, bits, 2_000_000 + interval), sample(1, bits, 2_000_000)])
                .unwrap()
                .to_target();
            prop_assert!(next <= old.mul_div(225, 150));
            prop_assert!(next >= old.mul_div(112, 150).to_compact().to_target());
        }

        #[test]
        fn prop_dos_min_is_monotonic(a in 0i64..100_000_000, b in 0i64..100_000_000, bits in 0x1a010000u32..0x1e0fffff) {
            let (short, long) = (a.min(b), a.max(b));
            for engine in all_engines() {
                let base = Compact::new(bits);
                let near = engine.dos_min_difficulty(base, BlockDuration::seconds(short)).unwrap();
                let far = engine.dos_min_difficulty(base, BlockDuration::seconds(long)).unwrap();
                prop_assert!(near <= far);
                prop_assert!(far <= Compact::new(MIN_BITS));
            }
        }
    }
}
