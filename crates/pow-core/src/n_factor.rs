//! Time-dependent scrypt cost ("N-factor") schedules.
//!
//! Each schedule maps a block's timestamp to the scrypt parameters that
//! block must be hashed with. Memory cost never decreases as time moves
//! forward and stays between a floor and a ceiling.

use serde::{Deserialize, Serialize};

use crate::error::{PowError, PowResult};
use crate::scrypt::ScryptParams;
use crate::time::{BlockDuration, BlockTime};

/// Roughly eighteen months.
pub const EIGHTEEN_MONTHS: BlockDuration = BlockDuration::days(365 * 3 / 2);

/// Bytes per unit of N·r in the scrypt scratchpad.
const LOG2_BYTES_PER_NR: u32 = 7;

/// Largest log2(N) that fits the `u32` N field.
const MAX_LOG2_N: u32 = 31;

/// A schedule for growing scrypt's cost over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NFactorSchedule {
    /// The yacoin/vertcoin stepping: the N-factor grows with the log of the
    /// chain age. N = 2^(nfactor + 1), r = 1.
    Stepped {
        chain_start: BlockTime,
        min_nfactor: u8,
        max_nfactor: u8,
    },
    /// N doubles every `period`, r is fixed.
    Doubling {
        birth: BlockTime,
        period: BlockDuration,
        min_log2_n: u8,
        r: u32,
        max_memory_log2: u8,
    },
    /// N doubles every `n_period` and r doubles every (shorter) `r_period`
    /// up to 2^`max_log2_r`. Once memory hits the cap, N gives way to r.
    Mixed {
        birth: BlockTime,
        n_period: BlockDuration,
        r_period: BlockDuration,
        min_log2_n: u8,
        max_log2_r: u8,
        max_memory_log2: u8,
    },
}

impl NFactorSchedule {
    /// Vertcoin's schedule.
    pub const VERTCOIN: NFactorSchedule = NFactorSchedule::Stepped {
        chain_start: BlockTime::from_unix(1_395_198_268),
        min_nfactor: 10,
        max_nfactor: 30,
    };

    /// N = 1024 at `birth`, doubling every eighteen months up to 256 GiB.
    pub fn doubling(birth: BlockTime) -> Self {
        NFactorSchedule::Doubling {
            birth,
            period: EIGHTEEN_MONTHS,
            min_log2_n: 10,
            r: 1,
            max_memory_log2: 38,
        }
    }

    /// N = 1024, r = 1 at `birth`; N doubles every eighteen months and r
    /// every year up to r = 8, capped at 256 GiB.
    pub fn mixed(birth: BlockTime) -> Self {
        NFactorSchedule::Mixed {
            birth,
            n_period: EIGHTEEN_MONTHS,
            r_period: BlockDuration::days(365),
            min_log2_n: 10,
            max_log2_r: 3,
            max_memory_log2: 38,
        }
    }

    pub fn validate(&self) -> PowResult<()> {
        let invalid = |msg: String| Err(PowError::InvalidParameters(msg));
        match *self {
            NFactorSchedule::Stepped {
                min_nfactor,
                max_nfactor,
                ..
            } => {
                if min_nfactor > max_nfactor || max_nfactor as u32 + 1 > MAX_LOG2_N {
                    return invalid(format!(
                        "n-factor range {}..={} is not usable",
                        min_nfactor, max_nfactor
                    ));
                }
            }
            NFactorSchedule::Doubling {
                period,
                min_log2_n,
                r,
                max_memory_log2,
                ..
            } => {
                if period.as_secs() <= 0 || r == 0 || min_log2_n == 0 || max_memory_log2 > 63 {
                    return invalid(format!("doubling schedule {:?} is not usable", self));
                }
                if (min_log2_n as u32) > doubling_cap(r, max_memory_log2) {
                    return invalid(format!(
                        "N=2^{} with r={} exceeds 2^{} bytes",
                        min_log2_n, r, max_memory_log2
                    ));
                }
            }
            NFactorSchedule::Mixed {
                n_period,
                r_period,
                min_log2_n,
                max_log2_r,
                max_memory_log2,
                ..
            } => {
                if n_period.as_secs() <= 0 || r_period.as_secs() <= 0 || min_log2_n == 0 {
                    return invalid(format!("mixed schedule {:?} is not usable", self));
                }
                let floor = LOG2_BYTES_PER_NR + min_log2_n as u32 + max_log2_r as u32;
                let ceiling = max_memory_log2 as u32;
                if floor > ceiling || ceiling > LOG2_BYTES_PER_NR + MAX_LOG2_N || max_log2_r > 31 {
                    return invalid(format!(
                        "mixed schedule floor 2^{} does not fit under 2^{} bytes",
                        floor, ceiling
                    ));
                }
            }
        }
        Ok(())
    }

    /// scrypt parameters for a block with timestamp `time`.
    pub fn params_at(&self, time: BlockTime) -> ScryptParams {
        match *self {
            NFactorSchedule::Stepped {
                chain_start,
                min_nfactor,
                max_nfactor,
            } => {
                let nfactor = stepped_nfactor(time - chain_start, min_nfactor, max_nfactor);
                ScryptParams {
                    n: 1 << (nfactor + 1),
                    r: 1,
                    p: 1,
                }
            }
            NFactorSchedule::Doubling {
                birth,
                period,
                min_log2_n,
                r,
                max_memory_log2,
            } => {
                let steps = elapsed_periods(time - birth, period);
                let log2_n = (min_log2_n as u32 + steps).min(doubling_cap(r, max_memory_log2));
                ScryptParams {
                    n: 1 << log2_n,
                    r,
                    p: 1,
                }
            }
            NFactorSchedule::Mixed {
                birth,
                n_period,
                r_period,
                min_log2_n,
                max_log2_r,
                max_memory_log2,
            } => {
                let elapsed = time - birth;
                let log2_r = elapsed_periods(elapsed, r_period).min(max_log2_r as u32);
                let wanted = LOG2_BYTES_PER_NR
                    + min_log2_n as u32
                    + elapsed_periods(elapsed, n_period)
                    + log2_r;
                let total = wanted.min(max_memory_log2 as u32);
                ScryptParams {
                    n: 1 << (total - LOG2_BYTES_PER_NR - log2_r),
                    r: 1 << log2_r,
                    p: 1,
                }
            }
        }
    }

    /// Smallest scrypt memory this schedule ever asks for.
    pub fn floor_bytes(&self) -> u64 {
        let start = match *self {
            NFactorSchedule::Stepped { chain_start, .. } => chain_start,
            NFactorSchedule::Doubling { birth, .. } | NFactorSchedule::Mixed { birth, .. } => birth,
        };
        self.params_at(start).memory_bytes()
    }

    /// Largest scrypt memory this schedule ever asks for.
    pub fn ceiling_bytes(&self) -> u64 {
        match *self {
            NFactorSchedule::Stepped { max_nfactor, .. } => 128u64 << (max_nfactor as u32 + 1),
            NFactorSchedule::Doubling {
                r,
                max_memory_log2,
                ..
            } => 128 * r as u64 * (1u64 << doubling_cap(r, max_memory_log2)),
            NFactorSchedule::Mixed {
                max_memory_log2, ..
            } => 1u64 << max_memory_log2,
        }
    }
}

/// The yacoin/vertcoin N-factor for a chain age.
fn stepped_nfactor(age: BlockDuration, min_nfactor: u8, max_nfactor: u8) -> u32 {
    if age.as_secs() <= 0 {
        return min_nfactor as u32;
    }

    let mut s = age.as_secs();
    let mut l: i64 = 0;
    while (s >> 1) > 3 {
        l += 1;
        s >>= 1;
    }
    s &= 3;

    let n = ((l * 158 + s * 28 - 2670) / 100).max(0);
    n.clamp(min_nfactor as i64, max_nfactor as i64) as u32
}

/// Whole periods since birth, zero before birth.
fn elapsed_periods(elapsed: BlockDuration, period: BlockDuration) -> u32 {
    elapsed.periods(period).clamp(0, 64) as u32
}

/// Largest log2(N) keeping 128 * N * r within 2^max_memory_log2 bytes.
fn doubling_cap(r: u32, max_memory_log2: u8) -> u32 {
    let total = 1u64.checked_shl(max_memory_log2 as u32).unwrap_or(u64::MAX);
    let budget = total / (128 * r as u64);
    if budget == 0 {
        return 0;
    }
    (63 - budget.leading_zeros()).min(MAX_LOG2_N)
}

/// One row of an N-factor table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NFactorRow {
    pub time: BlockTime,
    pub params: ScryptParams,
    pub memory_bytes: u64,
}

/// Parameters at `start` and at each of the following `years` 365-day years.
pub fn n_factor_table(schedule: &NFactorSchedule, start: BlockTime, years: u32) -> Vec<NFactorRow> {
    (0..=years as i64)
        .map(|year| {
            let time = start + BlockDuration::days(365) * year;
            let params = schedule.params_at(time);
            NFactorRow {
                time,
                params,
                memory_bytes: params.memory_bytes(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const YEAR: BlockDuration = BlockDuration::days(365);

    fn vertcoin_nfactor(years: i64) -> u32 {
        let start = BlockTime::from_unix(1_395_198_268);
        NFactorSchedule::VERTCOIN.params_at(start + YEAR * years).log2_n() - 1
    }

    #[test]
    fn test_vertcoin_steps() {
        assert_eq!(vertcoin_nfactor(-1), 10);
        assert_eq!(vertcoin_nfactor(0), 10);
        assert_eq!(vertcoin_nfactor(2), 10);
        assert_eq!(vertcoin_nfactor(5), 12);
        assert_eq!(vertcoin_nfactor(10), 14);
        assert_eq!(vertcoin_nfactor(50), 17);
        assert_eq!(vertcoin_nfactor(1000), 24);
    }

    #[test]
    fn test_vertcoin_threshold() {
        let start = BlockTime::from_unix(1_395_198_268);
        let schedule = NFactorSchedule::VERTCOIN;
        assert_eq!(schedule.params_at(start + BlockDuration::seconds(1 << 25)).n, 1 << 11);
        assert_eq!(schedule.params_at(start + BlockDuration::seconds(1 << 26)).n, 1 << 12);
        assert_eq!(schedule.ceiling_bytes(), 1 << 38);
    }

    #[test]
    fn test_doubling() {
        let birth = BlockTime::from_unix(1_317_972_665);
        let schedule = NFactorSchedule::doubling(birth);
        schedule.validate().unwrap();

        assert_eq!(schedule.params_at(birth), ScryptParams::LITECOIN);
        assert_eq!(schedule.params_at(birth - YEAR), ScryptParams::LITECOIN);
        assert_eq!(schedule.params_at(birth + EIGHTEEN_MONTHS).n, 2048);
        assert_eq!(schedule.params_at(birth + EIGHTEEN_MONTHS * 3).n, 8192);

        // Capped at 256 GiB
        let far = schedule.params_at(birth + YEAR * 200);
        assert_eq!(far.memory_bytes(), 1 << 38);
        assert_eq!(far.n, 1 << 31);
    }

    #[test]
    fn test_mixed_grows_r() {
        let birth = BlockTime::from_unix(1_317_972_665);
        let schedule = NFactorSchedule::mixed(birth);
        schedule.validate().unwrap();

        assert_eq!(schedule.params_at(birth), ScryptParams::LITECOIN);
        let later = schedule.params_at(birth + YEAR * 2);
        assert_eq!(later.r, 4);
        assert_eq!(later.n, 2048);

        let far = schedule.params_at(birth + YEAR * 200);
        assert_eq!(far.r, 8);
        assert_eq!(far.memory_bytes(), 1 << 38);
    }

    #[test]
    fn test_invalid_schedules() {
        let birth = BlockTime::EPOCH;
        let bad_doubling = NFactorSchedule::Doubling {
            birth,
            period: BlockDuration::ZERO,
            min_log2_n: 10,
            r: 1,
            max_memory_log2: 38,
        };
        assert!(bad_doubling.validate().is_err());

        let bad_mixed = NFactorSchedule::Mixed {
            birth,
            n_period: YEAR,
            r_period: YEAR,
            min_log2_n: 30,
            max_log2_r: 3,
            max_memory_log2: 38,
        };
        assert!(bad_mixed.validate().is_err());

        let bad_stepped = NFactorSchedule::Stepped {
            chain_start: birth,
            min_nfactor: 12,
            max_nfactor: 10,
        };
        assert!(bad_stepped.validate().is_err());
    }

    #[test]
    fn test_table() {
        let start = BlockTime::from_unix(1_395_198_268);
        let rows = n_factor_table(&NFactorSchedule::VERTCOIN, start, 50);
        assert_eq!(rows.len(), 51);
        assert_eq!(rows[0].time, start);
        assert_eq!(rows[50].params.n, 1 << 18);
        assert_eq!(rows[50].memory_bytes, 128 << 18);
    }

    #[test]
    fn test_schedule_json() {
        let json = serde_json::to_string(&NFactorSchedule::VERTCOIN).unwrap();
        assert!(json.contains("\"policy\":\"stepped\""));
        let back: NFactorSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NFactorSchedule::VERTCOIN);
    }

    proptest! {
        #[test]
        fn prop_memory_is_monotonic_and_bounded(
            a in 0i64..50 * 365 * 86_400,
            b in 0i64..50 * 365 * 86_400,
            which in 0usize..3,
        ) {
            let birth = BlockTime::from_unix(1_395_198_268);
            let schedule = [
                NFactorSchedule::VERTCOIN,
                NFactorSchedule::doubling(birth),
                NFactorSchedule::mixed(birth),
            ][which];
            let (early, late) = (a.min(b), a.max(b));

            let early = schedule.params_at(birth + BlockDuration::seconds(early));
            let late = schedule.params_at(birth + BlockDuration::seconds(late));
            prop_assert!(early.validate().is_ok());
            prop_assert!(early.memory_bytes() <= late.memory_bytes());
            prop_assert!(late.memory_bytes() <= schedule.ceiling_bytes());
            prop_assert!(early.memory_bytes() >= schedule.floor_bytes());
        }
    }
}
