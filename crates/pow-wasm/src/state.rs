//! Plain data handed to JavaScript.

use pow_core::difficulty::{expected_hashes, format_difficulty};
use pow_core::{Compact, NFactorRow};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}

/// Genesis mining statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningStats {
    pub total_hashes: u64,
    /// Hashes per second since mining started.
    pub hash_rate: f64,
    pub block_found: bool,
    pub current_nonce: u32,
    /// Header `nTime` being searched.
    pub current_time: u32,
    /// Current compact target, hex.
    pub bits: String,
    pub difficulty: f64,
    /// Difficulty with a K/M/G/T/P suffix.
    pub difficulty_display: String,
    /// Average hashes needed at the current target.
    pub expected_hashes: f64,
    pub recalibrations: u32,
    pub elapsed_ms: f64,
    /// Lowest hash of the current round, display hex.
    pub best_hash: Option<String>,
    pub best_leading_zeros: u32,
}

impl MiningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bits(&mut self, bits: Compact) {
        self.bits = bits.to_string();
        self.difficulty = bits.difficulty();
        self.difficulty_display = format_difficulty(self.difficulty);
        self.expected_hashes = expected_hashes(&bits.to_target());
    }

    pub fn update_hash_rate(&mut self) {
        if self.elapsed_ms > 0.0 {
            self.hash_rate = (self.total_hashes as f64) / (self.elapsed_ms / 1000.0);
        }
    }

    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Outcome of one `Miner::mine_batch` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    pub block_found: bool,
    pub recalibrated: bool,
    /// Compact target after this step, hex.
    pub bits: String,
    pub nonce: u32,
    pub time: u32,
    /// Block hash when found, display hex.
    pub hash: Option<String>,
    pub hashes_computed: u64,
}

impl StepInfo {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// One line of the N-factor table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NFactorRowInfo {
    pub year: u32,
    /// Unix seconds.
    pub time: i64,
    pub n: u32,
    pub r: u32,
    pub log2_n: u32,
    pub memory_bytes: u64,
    pub memory_display: String,
}

impl NFactorRowInfo {
    pub fn from_row(year: u32, row: &NFactorRow) -> Self {
        NFactorRowInfo {
            year,
            time: row.time.unix(),
            n: row.params.n,
            r: row.params.r,
            log2_n: row.params.log2_n(),
            memory_bytes: row.memory_bytes,
            memory_display: format_bytes(row.memory_bytes),
        }
    }
}

/// Convert a slice of rows to a JS array.
pub fn rows_to_js(rows: &[NFactorRowInfo]) -> Result<JsValue, JsValue> {
    to_js(&rows)
}

/// Binary-prefixed byte count, e.g. "128.00 KiB".
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
