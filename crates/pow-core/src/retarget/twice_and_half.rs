//! Fixed-step retarget: each block halves or doubles the target.

use tracing::debug;

use crate::difficulty::{Compact, Target};
use crate::time::BlockDuration;

use super::history::BlockSample;

/// Halve the target when the last interval was shorter than the block
/// period, otherwise double it, never going easier than `min_target`.
pub(super) fn next_difficulty(
    newest: &BlockSample,
    parent: &BlockSample,
    block_period: BlockDuration,
    min_target: Target,
) -> Compact {
    let actual = newest.time - parent.time;
    let target = newest.difficulty.to_target();
    let next = if actual < block_period {
        target.shr(1)
    } else {
        target.shl(1)
    };
    let result = next.min(min_target).to_compact();

    debug!(
        height = newest.height,
        actual_secs = actual.as_secs(),
        before = %newest.difficulty,
        after = %result,
        "twice-and-half retarget"
    );
    result
}
