//! The genesis block: construction from published constants and a
//! self-check against the known merkle root and block hash.

mod miner;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::block::BlockHeader;
use crate::coinbase::{CoinbaseBuilder, CoinbaseTransaction};
use crate::difficulty::Compact;
use crate::error::{PowError, PowResult};
use crate::hash::hash_to_display_hex;
use crate::merkle::compute_merkle_root;
use crate::retarget::BlockSample;
use crate::time::BlockTime;

pub use miner::{GenesisMiner, MineStep};

/// One coin in base units.
pub const COIN: u64 = 100_000_000;

const LITECOIN_PHRASE: &str = "NY Times 05/Oct/2011 Steve Jobs, Apple\u{2019}s Visionary, Dies at 56";
const LITECOIN_PUBKEY: &str = "040184710fa689ad5023690c80f3a49c8f13f8d45b8c857fbcbc8bc4a8e4d3eb4b10f4d4604fa08dce601aaf0f470216fe1b51850b4acf21b179c45070ac7b03a9";
const LITECOIN_MERKLE_ROOT: &str = "97ddfbbae6be97fd6cdf3e7ca13232a3afff2353e29badfab7f73011edd4ced9";

/// Constants a genesis block is built from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisParams {
    /// Timestamp phrase embedded in the coinbase scriptSig.
    pub phrase: String,
    /// Coinbase reward in base units.
    pub reward: u64,
    /// Hex public key the reward pays to.
    pub pubkey: String,
    #[serde(default = "default_version")]
    pub version: i32,
    pub time: BlockTime,
    pub nonce: u32,
    pub bits: Compact,
    /// Expected merkle root, display hex.
    #[serde(default)]
    pub merkle_root: Option<String>,
    /// Expected block hash, display hex.
    #[serde(default)]
    pub hash: Option<String>,
}

fn default_version() -> i32 {
    1
}

impl GenesisParams {
    pub fn litecoin() -> Self {
        GenesisParams {
            phrase: LITECOIN_PHRASE.to_string(),
            reward: 50 * COIN,
            pubkey: LITECOIN_PUBKEY.to_string(),
            version: 1,
            time: BlockTime::from_unix(1_317_972_665),
            nonce: 2_084_524_493,
            bits: Compact::new(0x1e0ffff0),
            merkle_root: Some(LITECOIN_MERKLE_ROOT.to_string()),
            hash: Some("12a765e31ffd4059bada1e25190f6e98c99d9714d334efa41a195a7e7e04bfe2".to_string()),
        }
    }

    pub fn litecoin_testnet() -> Self {
        GenesisParams {
            time: BlockTime::from_unix(1_317_798_646),
            nonce: 385_270_584,
            hash: Some("f5ae71e26c74beacc88382716aced69cddf3dffff24f384e1808905e0188f68f".to_string()),
            ..GenesisParams::litecoin()
        }
    }

    pub fn bitcoin() -> Self {
        GenesisParams {
            phrase: "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks".to_string(),
            reward: 50 * COIN,
            pubkey: "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f".to_string(),
            version: 1,
            time: BlockTime::from_unix(1_231_006_505),
            nonce: 2_083_236_893,
            bits: Compact::new(0x1d00ffff),
            merkle_root: Some("4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b".to_string()),
            hash: Some("000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f".to_string()),
        }
    }

    fn coinbase(&self) -> PowResult<CoinbaseTransaction> {
        let pubkey = hex::decode(&self.pubkey).map_err(|e| {
            PowError::InvalidParameters(format!("genesis pubkey is not hex: {}", e))
        })?;
        CoinbaseBuilder::new(self.phrase.as_bytes(), self.reward, pubkey).build()
    }
}

/// A fully formed genesis block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisBlock {
    pub header: BlockHeader,
    pub coinbase: CoinbaseTransaction,
}

impl GenesisBlock {
    /// Assemble the block from `params` without checking it.
    pub fn build(params: &GenesisParams) -> PowResult<Self> {
        let coinbase = params.coinbase()?;
        let merkle_root = compute_merkle_root(&[coinbase.txid]);
        let time = params.time.to_ntime().ok_or_else(|| {
            PowError::InvalidParameters(format!("genesis time {} does not fit nTime", params.time))
        })?;

        let mut header = BlockHeader::new(params.version, [0u8; 32], merkle_root, time, params.bits);
        header.nonce = params.nonce;
        Ok(GenesisBlock { header, coinbase })
    }

    /// Assemble the block and verify it reproduces the expected merkle
    /// root and hash.
    pub fn create(params: &GenesisParams) -> PowResult<Self> {
        let block = GenesisBlock::build(params)?;
        let merkle_root = hash_to_display_hex(&block.header.merkle_root);
        let hash = block.hash_hex();

        check_field("merkle root", params.merkle_root.as_deref(), &merkle_root)?;
        check_field("hash", params.hash.as_deref(), &hash)?;

        info!(hash = %hash, merkle_root = %merkle_root, "genesis block");
        Ok(block)
    }

    pub fn hash(&self) -> [u8; 32] {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> String {
        hash_to_display_hex(&self.hash())
    }

    /// Retarget view of the genesis block.
    pub fn sample(&self) -> BlockSample {
        self.header.sample(0)
    }

    /// Full block serialization: header, transaction count, coinbase.
    pub fn serialize(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(81 + self.coinbase.raw_tx.len());
        block.extend_from_slice(&self.header.serialize());
        block.push(0x01);
        block.extend_from_slice(&self.coinbase.raw_tx);
        block
    }
}

fn check_field(field: &'static str, expected: Option<&str>, actual: &str) -> PowResult<()> {
    match expected {
        Some(expected) if !expected.trim_start_matches("0x").eq_ignore_ascii_case(actual) => {
            warn!(field, expected, actual, "genesis self-check failed");
            Err(PowError::GenesisMismatch {
                field,
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
        _ => Ok(()),
    }
}
