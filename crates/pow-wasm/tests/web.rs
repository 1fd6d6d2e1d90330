//! Browser-side tests, run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use pow_wasm::{n_factor_table, scrypt_hash_header, Miner};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const LITECOIN_HEADER: &str = "020000004c1271c211717198227392b029a64a7971931d351b387bb80db027f270411e398a07046f7d4a08dd815412a8712f874a7ebf0507e3878bd24e20a3b73fd750a667d2f451eac7471b00de6659";

#[wasm_bindgen_test]
fn scrypt_header_hash() {
    assert_eq!(
        scrypt_hash_header(LITECOIN_HEADER).unwrap(),
        "00000000002bef4107f882f6115e0b01f348d21195dacd3582aa2dabd7985806"
    );
    assert!(scrypt_hash_header("00").is_err());
}

#[wasm_bindgen_test]
fn n_factor_table_has_one_row_per_year() {
    let rows = n_factor_table("doubling", 10).unwrap();
    let rows = js_sys::Array::from(&rows);
    assert_eq!(rows.length(), 11);
    assert!(n_factor_table("{\"policy\":\"nope\"}", 1).is_err());
}

#[wasm_bindgen_test]
fn miner_runs_batches() {
    let mut miner = Miner::new("testnet").unwrap();
    assert_eq!(miner.network(), "testnet");
    miner.mine_batch(16).unwrap();
    assert!(miner.get_stats().is_ok());
    assert!(miner.get_block_hex().is_none());
    miner.reset().unwrap();
    assert!(Miner::new("regtest").is_err());
}
