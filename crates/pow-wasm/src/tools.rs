//! One-shot helpers: the N-factor table and header hashing.

use pow_core::{
    n_factor_table as table, BlockHeader, BlockTime, NFactorSchedule, PowHash, PowHasher, ScryptParams,
};
use wasm_bindgen::prelude::*;

use crate::state::{rows_to_js, NFactorRowInfo};

/// Parse a schedule name ("vertcoin", "doubling", "mixed") or a JSON
/// schedule object. Named growing schedules start at `birth`.
fn parse_schedule(policy: &str, birth: BlockTime) -> Result<NFactorSchedule, JsValue> {
    let schedule = match policy {
        "vertcoin" => NFactorSchedule::VERTCOIN,
        "doubling" => NFactorSchedule::doubling(birth),
        "mixed" => NFactorSchedule::mixed(birth),
        json => serde_json::from_str(json)
            .map_err(|e| JsValue::from_str(&format!("Invalid schedule: {}", e)))?,
    };
    schedule
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(schedule)
}

/// scrypt parameters per year for the next `years` years, starting now.
#[wasm_bindgen]
pub fn n_factor_table(policy: &str, years: u32) -> Result<JsValue, JsValue> {
    let now = BlockTime::from_unix((js_sys::Date::now() / 1000.0) as i64);
    let schedule = parse_schedule(policy, now)?;
    let rows: Vec<NFactorRowInfo> = table(&schedule, now, years)
        .iter()
        .enumerate()
        .map(|(year, row)| NFactorRowInfo::from_row(year as u32, row))
        .collect();
    rows_to_js(&rows)
}

/// Litecoin-style scrypt(1024, 1, 1) hash of an 80-byte header given as
/// hex, returned in display order.
#[wasm_bindgen]
pub fn scrypt_hash_header(header_hex: &str) -> Result<String, JsValue> {
    let bytes = hex::decode(header_hex).map_err(|_| JsValue::from_str("Invalid header hex"))?;
    let header = BlockHeader::deserialize(&bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let hash = PowHasher::new(PowHash::Scrypt(ScryptParams::LITECOIN))
        .hash(&header)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(pow_core::hash_to_display_hex(&hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_schedules() {
        let birth = BlockTime::from_unix(1_400_000_000);
        assert_eq!(parse_schedule("vertcoin", birth).ok(), Some(NFactorSchedule::VERTCOIN));
        assert_eq!(
            parse_schedule("doubling", birth).ok(),
            Some(NFactorSchedule::doubling(birth))
        );
    }
}
