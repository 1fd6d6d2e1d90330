//! Proof-of-work hashing and the header proof-of-work gate.
//!
//! A chain picks one [`PowHash`]. [`PowHasher`] computes it for headers,
//! keeping one scrypt scratchpad that is reallocated only when a block's
//! timestamp moves the N-factor. Hashers are not shared: give each worker
//! thread its own.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::block::BlockHeader;
use crate::difficulty::{hash_meets_target, Target};
use crate::error::{PowError, PowResult};
use crate::hash::double_sha256;
use crate::n_factor::NFactorSchedule;
use crate::retarget::Difficulty;
use crate::scrypt::{Scratchpad, ScryptParams};
use crate::time::BlockTime;

/// Version bit marking a header whose work lives in a parent chain.
pub const VERSION_AUXPOW: i32 = 1 << 8;

/// The proof-of-work hash function of a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "hash", content = "params", rename_all = "snake_case")]
pub enum PowHash {
    Sha256d,
    Scrypt(ScryptParams),
    /// scrypt with parameters that grow with block time.
    NFactorScrypt(NFactorSchedule),
}

impl PowHash {
    /// scrypt parameters for a block at `time`, if this is a scrypt hash.
    pub fn scrypt_params_at(&self, time: BlockTime) -> Option<ScryptParams> {
        match self {
            PowHash::Sha256d => None,
            PowHash::Scrypt(params) => Some(*params),
            PowHash::NFactorScrypt(schedule) => Some(schedule.params_at(time)),
        }
    }

    pub fn validate(&self) -> PowResult<()> {
        match self {
            PowHash::Sha256d => Ok(()),
            PowHash::Scrypt(params) => params.validate(),
            PowHash::NFactorScrypt(schedule) => schedule.validate(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowHash::Sha256d => "sha256d",
            PowHash::Scrypt(_) => "scrypt",
            PowHash::NFactorScrypt(_) => "nfactor_scrypt",
        }
    }
}

/// Computes a chain's proof-of-work hash, owning the scratchpad it needs.
#[derive(Debug)]
pub struct PowHasher {
    pow: PowHash,
    pad: Option<Scratchpad>,
}

impl PowHasher {
    pub fn new(pow: PowHash) -> Self {
        PowHasher { pow, pad: None }
    }

    pub fn pow(&self) -> &PowHash {
        &self.pow
    }

    /// Proof-of-work hash of `header`, in internal byte order.
    pub fn hash(&mut self, header: &BlockHeader) -> PowResult<[u8; 32]> {
        self.hash_bytes(&header.serialize(), header.block_time())
    }

    /// Proof-of-work hash of serialized header bytes whose `nTime` is `time`.
    pub fn hash_bytes(&mut self, header: &[u8; 80], time: BlockTime) -> PowResult<[u8; 32]> {
        match self.pow.scrypt_params_at(time) {
            None => Ok(double_sha256(header)),
            Some(params) => Ok(self.scratchpad(params)?.hash_header(header)),
        }
    }

    fn scratchpad(&mut self, params: ScryptParams) -> PowResult<&mut Scratchpad> {
        let pad = match self.pad.take() {
            Some(pad) if pad.params() == params => pad,
            stale => {
                // Free the old pad before allocating a larger one
                drop(stale);
                Scratchpad::new(params)?
            }
        };
        Ok(self.pad.insert(pad))
    }
}

/// Merged-mining rules applied before the work check.
pub trait MergedMining {
    /// Validate `header` at `height`. Returns the parent chain's hash when
    /// the work was done on a parent block, or `None` to check the header's
    /// own proof-of-work hash.
    fn check(&self, header: &BlockHeader, height: u32) -> PowResult<Option<[u8; 32]>>;
}

/// Chains without merged mining: every header carries its own work.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMergedMining;

impl MergedMining for NoMergedMining {
    fn check(&self, _header: &BlockHeader, _height: u32) -> PowResult<Option<[u8; 32]>> {
        Ok(None)
    }
}

/// Requires the chain id in the header version once merged mining starts.
///
/// Auxiliary proofs themselves are not carried by [`BlockHeader`], so a
/// header flagged as aux-pow is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainIdRule {
    pub chain_id: u32,
    pub start_height: u32,
}

impl MergedMining for ChainIdRule {
    fn check(&self, header: &BlockHeader, height: u32) -> PowResult<Option<[u8; 32]>> {
        let is_auxpow = header.version & VERSION_AUXPOW != 0;
        if height < self.start_height {
            if is_auxpow {
                return Err(PowError::MergedMining(format!(
                    "aux pow not allowed before height {}",
                    self.start_height
                )));
            }
            return Ok(None);
        }

        let chain_id = (header.version as u32) >> 16;
        if chain_id != self.chain_id {
            return Err(PowError::MergedMining(format!(
                "block chain id {:#06x} is not ours ({:#06x})",
                chain_id, self.chain_id
            )));
        }
        if is_auxpow {
            return Err(PowError::MergedMining("aux pow proof missing".to_string()));
        }
        Ok(None)
    }
}

/// Check that `header` at `height` carries the work its bits claim.
///
/// Merged-mining rules run first, then the range check on the bits, then
/// the hash against the target. Returns the hash that was checked.
pub fn check_proof_of_work<M: MergedMining + ?Sized>(
    header: &BlockHeader,
    height: u32,
    engine: &Difficulty,
    hasher: &mut PowHasher,
    merged: &M,
) -> PowResult<[u8; 32]> {
    let parent_hash = merged.check(header, height)?;

    if !engine.is_valid(header.bits) {
        warn!(height, bits = %header.bits, "nBits below minimum work");
        return Err(PowError::BelowMinimumWork {
            bits: header.bits.bits(),
        });
    }

    let hash = match parent_hash {
        Some(hash) => hash,
        None => hasher.hash(header)?,
    };
    if !hash_meets_target(&hash, &header.bits.to_target()) {
        warn!(height, bits = %header.bits, "hash doesn't match nBits");
        return Err(PowError::HighHash {
            bits: header.bits.bits(),
        });
    }
    Ok(hash)
}

/// Outcome of scanning a nonce range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningResult {
    /// Nonce whose hash met the target, if any.
    pub nonce: Option<u32>,
    /// Lowest hash seen in the batch and its nonce.
    pub best_hash: [u8; 32],
    pub best_nonce: u32,
    pub hashes_computed: u64,
    /// The scan reached nonce `u32::MAX` without a find.
    pub exhausted: bool,
}

impl MiningResult {
    pub fn found(&self) -> bool {
        self.nonce.is_some()
    }
}

/// Try up to `count` nonces from `nonce_start`, stopping at the first hash
/// not above `target`. Never wraps past `u32::MAX`.
pub fn mine_batch(
    header: &BlockHeader,
    hasher: &mut PowHasher,
    target: &Target,
    nonce_start: u32,
    count: u32,
) -> PowResult<MiningResult> {
    let mut bytes = header.serialize();
    let time = header.block_time();
    let end = (nonce_start as u64 + count as u64).min(u32::MAX as u64 + 1);

    let mut result = MiningResult {
        nonce: None,
        best_hash: [0xff; 32],
        best_nonce: nonce_start,
        hashes_computed: 0,
        exhausted: false,
    };

    for nonce in nonce_start as u64..end {
        let nonce = nonce as u32;
        bytes[76..80].copy_from_slice(&nonce.to_le_bytes());
        let hash = hasher.hash_bytes(&bytes, time)?;
        result.hashes_computed += 1;

        if Target::from_hash(&hash) < Target::from_hash(&result.best_hash) {
            result.best_hash = hash;
            result.best_nonce = nonce;
        }
        if hash_meets_target(&hash, target) {
            result.nonce = Some(nonce);
            return Ok(result);
        }
    }

    result.exhausted = end > u32::MAX as u64;
    Ok(result)
}
