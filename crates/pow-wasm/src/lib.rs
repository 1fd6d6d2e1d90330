//! WebAssembly bindings for the proof-of-work core.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Mining a new genesis block in batches
//! - Printing the scrypt N-factor schedule
//! - Hashing a block header with scrypt

use wasm_bindgen::prelude::*;

pub mod miner;
pub mod state;
pub mod tools;

pub use miner::{console_log, Miner};
pub use tools::{n_factor_table, scrypt_hash_header};

/// Initialize the WASM module with better panic messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
