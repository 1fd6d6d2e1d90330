//! Damped single-interval retarget (DigiShield).
//!
//! The last block interval is pulled toward the block period by a damping
//! divisor, bounded to [3/4, 3/2] of the period, and the previous target is
//! scaled by the bounded interval over the period.

use tracing::debug;

use crate::difficulty::{Compact, Target};
use crate::error::PowResult;
use crate::time::BlockDuration;

use super::history::BlockSample;

pub(super) fn next_difficulty(
    newest: &BlockSample,
    parent: &BlockSample,
    block_period: BlockDuration,
    damping: i64,
    min_target: Target,
) -> PowResult<Compact> {
    let mut actual = newest.time - parent.time;
    if actual == BlockDuration::ZERO {
        actual = BlockDuration::seconds(1);
    }
    debug!(actual_secs = actual.as_secs(), "digishield interval before bounds");

    // Amplitude filter
    let damped = block_period + (actual - block_period) / damping;
    let bounded = damped.clamp(block_period * 3 / 4, block_period * 3 / 2);

    let target = newest
        .difficulty
        .to_target()
        .scale_by(bounded.to_fixed(), block_period.to_fixed())?
        .min(min_target);
    let result = target.to_compact();

    debug!(
        height = newest.height,
        block_period_secs = block_period.as_secs(),
        bounded_secs = bounded.as_secs(),
        before = %newest.difficulty,
        after = %result,
        "digishield retarget"
    );
    Ok(result)
}
