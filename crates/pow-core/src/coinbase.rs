//! Genesis coinbase transaction construction.
//!
//! The genesis coinbase carries a timestamp phrase in its scriptSig and pays
//! the block reward to a bare public key. Its txid is the genesis merkle
//! root.

use crate::error::{PowError, PowResult};
use crate::hash::double_sha256;

/// `nBits` of Bitcoin's genesis block, pushed as the first scriptSig item.
pub const GENESIS_SCRIPT_BITS: u32 = 486_604_799;

/// Extra-nonce pushed after the bits.
const GENESIS_SCRIPT_EXTRA: u8 = 4;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_CHECKSIG: u8 = 0xac;

/// Coinbase scriptSig size limits enforced by consensus.
const MIN_SCRIPT_SIG_SIZE: usize = 2;
const MAX_SCRIPT_SIG_SIZE: usize = 100;

/// Largest single push a script may carry.
const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Builder for a genesis coinbase transaction.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder {
    phrase: Vec<u8>,
    reward: u64,
    pubkey: Vec<u8>,
}

impl CoinbaseBuilder {
    pub fn new(phrase: impl Into<Vec<u8>>, reward: u64, pubkey: impl Into<Vec<u8>>) -> Self {
        CoinbaseBuilder {
            phrase: phrase.into(),
            reward,
            pubkey: pubkey.into(),
        }
    }

    pub fn build(&self) -> PowResult<CoinbaseTransaction> {
        let script_sig = self.build_script_sig()?;
        if self.reward > i64::MAX as u64 {
            return Err(PowError::InvalidParameters(format!(
                "reward {} does not fit a transaction output",
                self.reward
            )));
        }

        let mut script_pubkey = Vec::with_capacity(self.pubkey.len() + 2);
        push_data(&self.pubkey, &mut script_pubkey)?;
        script_pubkey.push(OP_CHECKSIG);

        let mut raw_tx = Vec::with_capacity(64 + script_sig.len() + script_pubkey.len());
        raw_tx.extend_from_slice(&1i32.to_le_bytes());

        // One input spending the null outpoint
        raw_tx.push(0x01);
        raw_tx.extend_from_slice(&[0u8; 32]);
        raw_tx.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        encode_varint(script_sig.len() as u64, &mut raw_tx);
        raw_tx.extend_from_slice(&script_sig);
        raw_tx.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

        // One output paying the reward
        raw_tx.push(0x01);
        raw_tx.extend_from_slice(&(self.reward as i64).to_le_bytes());
        encode_varint(script_pubkey.len() as u64, &mut raw_tx);
        raw_tx.extend_from_slice(&script_pubkey);

        // Lock time
        raw_tx.extend_from_slice(&0u32.to_le_bytes());

        let txid = double_sha256(&raw_tx);
        Ok(CoinbaseTransaction { raw_tx, txid })
    }

    fn build_script_sig(&self) -> PowResult<Vec<u8>> {
        let mut script_sig = Vec::with_capacity(8 + self.phrase.len());
        push_data(&GENESIS_SCRIPT_BITS.to_le_bytes(), &mut script_sig)?;
        push_data(&[GENESIS_SCRIPT_EXTRA], &mut script_sig)?;
        push_data(&self.phrase, &mut script_sig)?;

        if !(MIN_SCRIPT_SIG_SIZE..=MAX_SCRIPT_SIG_SIZE).contains(&script_sig.len()) {
            return Err(PowError::InvalidParameters(format!(
                "coinbase scriptSig is {} bytes, allowed {}..={}",
                script_sig.len(),
                MIN_SCRIPT_SIG_SIZE,
                MAX_SCRIPT_SIG_SIZE
            )));
        }
        Ok(script_sig)
    }
}

/// A serialized coinbase transaction and its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTransaction {
    pub raw_tx: Vec<u8>,
    pub txid: [u8; 32],
}

/// Append a minimal script push of `data`.
fn push_data(data: &[u8], script: &mut Vec<u8>) -> PowResult<()> {
    let len = data.len();
    if len > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(PowError::InvalidParameters(format!(
            "script push of {} bytes exceeds {}",
            len, MAX_SCRIPT_ELEMENT_SIZE
        )));
    }
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    }
    script.extend_from_slice(data);
    Ok(())
}

fn encode_varint(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}
