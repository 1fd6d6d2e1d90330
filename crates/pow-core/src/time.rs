//! Block timestamps, durations and the clock the miner reads.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::fixed::Seconds;

/// A block timestamp, in seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockTime(i64);

impl BlockTime {
    pub const EPOCH: BlockTime = BlockTime(0);

    pub const fn from_unix(seconds: i64) -> Self {
        BlockTime(seconds)
    }

    /// From a header's 32-bit `nTime` field.
    pub const fn from_ntime(ntime: u32) -> Self {
        BlockTime(ntime as i64)
    }

    pub const fn unix(&self) -> i64 {
        self.0
    }

    /// Back to an `nTime` field, if it fits.
    pub fn to_ntime(&self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl fmt::Display for BlockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed span of whole seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockDuration(i64);

impl BlockDuration {
    pub const ZERO: BlockDuration = BlockDuration(0);

    pub const fn seconds(seconds: i64) -> Self {
        BlockDuration(seconds)
    }

    pub const fn minutes(minutes: i64) -> Self {
        BlockDuration(minutes * 60)
    }

    pub const fn hours(hours: i64) -> Self {
        BlockDuration(hours * 3600)
    }

    pub const fn days(days: i64) -> Self {
        BlockDuration(days * 86_400)
    }

    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Fixed-point view for target scaling.
    pub fn to_fixed(&self) -> Seconds {
        Seconds::from_int(self.0)
    }

    /// How many whole `period`s fit in this span (floor), zero for a
    /// non-positive period.
    pub fn periods(&self, period: BlockDuration) -> i64 {
        if period.0 <= 0 {
            return 0;
        }
        self.0.div_euclid(period.0)
    }
}

impl fmt::Display for BlockDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl Sub for BlockTime {
    type Output = BlockDuration;

    fn sub(self, rhs: BlockTime) -> BlockDuration {
        BlockDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Add<BlockDuration> for BlockTime {
    type Output = BlockTime;

    fn add(self, rhs: BlockDuration) -> BlockTime {
        BlockTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub<BlockDuration> for BlockTime {
    type Output = BlockTime;

    fn sub(self, rhs: BlockDuration) -> BlockTime {
        BlockTime(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign<BlockDuration> for BlockTime {
    fn add_assign(&mut self, rhs: BlockDuration) {
        *self = *self + rhs;
    }
}

impl Add for BlockDuration {
    type Output = BlockDuration;

    fn add(self, rhs: BlockDuration) -> BlockDuration {
        BlockDuration(self.0.saturating_add(rhs.0))
    }
}

impl Sub for BlockDuration {
    type Output = BlockDuration;

    fn sub(self, rhs: BlockDuration) -> BlockDuration {
        BlockDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for BlockDuration {
    type Output = BlockDuration;

    fn neg(self) -> BlockDuration {
        BlockDuration(self.0.saturating_neg())
    }
}

impl Mul<i64> for BlockDuration {
    type Output = BlockDuration;

    fn mul(self, rhs: i64) -> BlockDuration {
        BlockDuration(self.0.saturating_mul(rhs))
    }
}

/// Integer division truncating toward zero.
impl Div<i64> for BlockDuration {
    type Output = BlockDuration;

    fn div(self, rhs: i64) -> BlockDuration {
        BlockDuration(self.0 / rhs)
    }
}

/// How many `rhs` spans fit in `self`, truncating toward zero.
impl Div for BlockDuration {
    type Output = i64;

    fn div(self, rhs: BlockDuration) -> i64 {
        self.0 / rhs.0
    }
}

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> BlockTime;
}

/// Wall clock that never goes backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> BlockTime {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let previous = self.last.fetch_max(wall, Ordering::Relaxed);
        BlockTime(previous.max(wall))
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: BlockTime) -> Self {
        Self {
            now: AtomicI64::new(start.0),
        }
    }

    pub fn set(&self, time: BlockTime) {
        self.now.store(time.0, Ordering::Relaxed);
    }

    pub fn advance(&self, by: BlockDuration) {
        self.now.fetch_add(by.0, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> BlockTime {
        BlockTime(self.now.load(Ordering::Relaxed))
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> BlockTime {
        (**self).now()
    }
}
