//! Genesis mining controller driven from JavaScript in batches.

use std::cell::Cell;

use pow_core::hash::{count_leading_zeros, hash_to_display_hex};
use pow_core::{
    BlockTime, ChainContext, Clock, GenesisBlock, GenesisMiner, MineStep, Network,
};
use wasm_bindgen::prelude::*;

use crate::state::{MiningStats, StepInfo};

/// Browser wall clock in whole seconds, never going backwards.
#[derive(Debug, Default)]
pub struct JsClock {
    last: Cell<i64>,
}

impl Clock for JsClock {
    fn now(&self) -> BlockTime {
        let wall = (js_sys::Date::now() / 1000.0) as i64;
        let now = wall.max(self.last.get());
        self.last.set(now);
        BlockTime::from_unix(now)
    }
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Mines a fresh genesis block for a network, recalibrating its difficulty
/// as it goes.
#[wasm_bindgen]
pub struct Miner {
    network: Network,
    ctx: &'static ChainContext,
    miner: GenesisMiner<JsClock>,
    stats: MiningStats,
    start_time: f64,
    found: Option<GenesisBlock>,
}

#[wasm_bindgen]
impl Miner {
    /// Create a miner for "mainnet" or "testnet".
    #[wasm_bindgen(constructor)]
    pub fn new(network: &str) -> Result<Miner, JsValue> {
        let network = Network::from_str(network)
            .ok_or_else(|| JsValue::from_str("Invalid network"))?;
        let ctx = ChainContext::global(network).map_err(js_err)?;

        let mut miner = Miner {
            network,
            ctx,
            miner: Self::fresh_miner(ctx, network)?,
            stats: MiningStats::new(),
            start_time: 0.0,
            found: None,
        };
        miner.refresh_stats();
        Ok(miner)
    }

    /// Try up to `batch_size` nonces.
    #[wasm_bindgen]
    pub fn mine_batch(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        if self.found.is_some() {
            return Err(JsValue::from_str("Block already found; call reset()"));
        }
        if self.start_time == 0.0 {
            self.start_time = js_sys::Date::now();
        }

        let hashes_before = self.miner.hashes();
        let step = self.miner.step(batch_size).map_err(js_err)?;
        let header = *self.miner.header();

        let mut info = StepInfo {
            bits: header.bits.to_string(),
            nonce: header.nonce,
            time: header.timestamp,
            hashes_computed: self.miner.hashes() - hashes_before,
            ..StepInfo::default()
        };

        match step {
            MineStep::Found(header) => {
                let block = GenesisBlock {
                    header,
                    coinbase: self.ctx.genesis().coinbase.clone(),
                };
                info.block_found = true;
                info.hash = Some(block.hash_hex());
                self.stats.block_found = true;
                self.found = Some(block);
            }
            MineStep::Recalibrated { .. } => {
                info.recalibrated = true;
                self.stats.recalibrations += 1;
            }
            MineStep::Searching => {}
        }

        self.refresh_stats();
        info.to_js()
    }

    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.stats.to_js()
    }

    #[wasm_bindgen]
    pub fn get_hash_rate_display(&self) -> String {
        self.stats.format_hash_rate()
    }

    /// The mined genesis block, serialized as hex.
    #[wasm_bindgen]
    pub fn get_block_hex(&self) -> Option<String> {
        self.found.as_ref().map(|block| hex::encode(block.serialize()))
    }

    /// Start over from the current time and minimum difficulty.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.miner = Self::fresh_miner(self.ctx, self.network)?;
        self.stats = MiningStats::new();
        self.start_time = 0.0;
        self.found = None;
        self.refresh_stats();
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn network(&self) -> String {
        self.network.name().to_string()
    }
}

impl Miner {
    fn fresh_miner(ctx: &ChainContext, network: Network) -> Result<GenesisMiner<JsClock>, JsValue> {
        GenesisMiner::new(
            ctx.genesis().header,
            ctx.params().pow,
            ctx.difficulty(),
            network.genesis_miner_cores(),
            JsClock::default(),
        )
        .map_err(js_err)
    }

    fn refresh_stats(&mut self) {
        let header = self.miner.header();
        self.stats.total_hashes = self.miner.hashes();
        self.stats.current_nonce = header.nonce;
        self.stats.current_time = header.timestamp;
        self.stats.set_bits(header.bits);

        let best = self.miner.best();
        if best != pow_core::Target::MAX {
            let mut hash = best.to_be_bytes();
            hash.reverse();
            self.stats.best_hash = Some(hash_to_display_hex(&hash));
            self.stats.best_leading_zeros = count_leading_zeros(&hash);
        } else {
            self.stats.best_hash = None;
            self.stats.best_leading_zeros = 0;
        }

        if self.start_time > 0.0 {
            self.stats.elapsed_ms = js_sys::Date::now() - self.start_time;
            self.stats.update_hash_rate();
        }
    }
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}
