//! Kimoto Gravity Well: a variable-window average retarget.
//!
//! Starting at the newest block, the walk widens its window one block at a
//! time until the observed block rate leaves an "event horizon" band that
//! narrows as the window grows, or until the window hits its maximum. The
//! new target is the average target over the window, scaled by actual over
//! desired elapsed time.
//!
//! The event horizon is computed with a hand-rolled `ln`/`exp` built only
//! from IEEE-754 add, multiply, divide and exponent bit manipulation, so
//! every platform reaches the same window size.

use std::f64::consts::{LN_2, SQRT_2};

use tracing::debug;

use crate::difficulty::{Compact, Target};
use crate::error::PowResult;
use crate::time::BlockDuration;

use super::history::BlockSample;

/// Window bounds in blocks, derived from the configured durations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Window {
    pub past_blocks_min: u64,
    pub past_blocks_max: u64,
    pub retarget_interval: u32,
}

pub(super) fn next_difficulty<I>(
    history: I,
    window: &Window,
    block_period: BlockDuration,
    min_target: Target,
) -> PowResult<Compact>
where
    I: Iterator<Item = BlockSample> + Clone,
{
    let min_difficulty = min_target.to_compact();
    let newest = match history.clone().next() {
        Some(sample) => sample,
        None => return Ok(min_difficulty),
    };

    // Timewarp fix: only retarget on interval boundaries
    if newest.height % window.retarget_interval != 0 {
        return Ok(newest.difficulty);
    }

    // Early blocks rule
    let horizon_sample = history
        .clone()
        .take(window.past_blocks_min as usize + 1)
        .last()
        .unwrap_or(newest);
    if (newest.height.saturating_sub(horizon_sample.height) as u64) < window.past_blocks_min {
        return Ok(min_difficulty);
    }

    // The oldest sample only bounds the walk and is never a stopping point
    let mut breaking = None;
    let mut walk = history.clone().enumerate().peekable();
    while let Some((index, sample)) = walk.next() {
        if walk.peek().is_none() {
            break;
        }
        let mass = index as u64 + 1;
        if mass > window.past_blocks_max {
            breaking = Some((index, sample));
            break;
        }

        let desired = block_period * mass as i64;
        let actual = (newest.time - sample.time).max(BlockDuration::ZERO);
        let rate_ratio = if actual == BlockDuration::ZERO || desired == BlockDuration::ZERO {
            1.0
        } else {
            desired.as_secs() as f64 / actual.as_secs() as f64
        };

        let horizon = event_horizon(mass, window.past_blocks_min);
        if mass >= window.past_blocks_min && (rate_ratio <= 1.0 / horizon || rate_ratio >= horizon)
        {
            breaking = Some((index, sample));
            break;
        }
    }

    let (index, breaking) = match breaking {
        Some((index, sample)) if sample.time < newest.time => (index, sample),
        _ => return Ok(min_difficulty),
    };

    // Samples newer than the stopping one, averaged over one extra slot
    let count = index as u64 + 1;
    let average = Target::sum_div(history.take(index).map(|s| s.difficulty.to_target()), count);
    let desired_span = block_period * count as i64;
    let actual_span = (newest.time - breaking.time).max(BlockDuration::seconds(1));

    let result = average
        .scale_by(actual_span.to_fixed(), desired_span.to_fixed())?
        .min(min_target)
        .to_compact();

    debug!(
        height = newest.height,
        blocks_analysed = count,
        desired_span_secs = desired_span.as_secs(),
        actual_span_secs = actual_span.as_secs(),
        before = %newest.difficulty,
        after = %result,
        "kgw retarget"
    );
    Ok(result)
}

/// `1 + 0.7084 * (mass / past_blocks_min)^-1.228`
pub(super) fn event_horizon(mass: u64, past_blocks_min: u64) -> f64 {
    let x = mass as f64 / past_blocks_min as f64;
    1.0 + 0.7084 * det_exp(-1.228 * det_ln(x))
}

/// Natural log for finite positive normal `x`.
fn det_ln(x: f64) -> f64 {
    let bits = x.to_bits();
    let mut exponent = ((bits >> 52) & 0x7ff) as i64 - 1023;
    let mut mantissa = f64::from_bits((bits & 0x000f_ffff_ffff_ffff) | (1023 << 52));
    if mantissa > SQRT_2 {
        mantissa /= 2.0;
        exponent += 1;
    }

    // ln(m) = 2 atanh((m - 1) / (m + 1)), |t| < 0.172
    let t = (mantissa - 1.0) / (mantissa + 1.0);
    let t2 = t * t;
    let mut power = t;
    let mut sum = 0.0;
    for k in 0..13 {
        sum += power / (2 * k + 1) as f64;
        power *= t2;
    }

    exponent as f64 * LN_2 + 2.0 * sum
}

/// `e^y` for `|y|` well inside the normal exponent range.
fn det_exp(y: f64) -> f64 {
    let k = (y / LN_2).round();
    let r = y - k * LN_2;

    let mut term = 1.0;
    let mut sum = 1.0;
    for i in 1..22 {
        term = term * r / i as f64;
        sum += term;
    }

    let scale = f64::from_bits(((k as i64 + 1023) as u64) << 52);
    sum * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_det_ln_exp_match_std() {
        for x in [0.01, 0.5, 1.0, 1.5, 2.0, 3.0, 10.0, 28.0, 1000.0] {
            let ln = det_ln(x);
            assert!((ln - x.ln()).abs() < 1e-14, "ln({}) = {}", x, ln);
        }
        for y in [-6.0, -1.0, -0.1, 0.0, 0.3, 1.0, 4.5] {
            let e = det_exp(y);
            assert!((e / y.exp() - 1.0).abs() < 1e-14, "exp({}) = {}", y, e);
        }
    }

    #[test]
    fn test_event_horizon_matches_powf() {
        for mass in 1..=4032u64 {
            let expected = 1.0 + 0.7084 * (mass as f64 / 144.0).powf(-1.228);
            let got = event_horizon(mass, 144);
            assert!(
                (got - expected).abs() < 1e-12,
                "mass {}: {} vs {}",
                mass,
                got,
                expected
            );
        }
        assert!((event_horizon(144, 144) - 1.7084).abs() < 1e-15);
    }
}
