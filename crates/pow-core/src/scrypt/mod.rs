//! The scrypt memory-hard key derivation function.
//!
//! Proof-of-work hashing runs scrypt with the 80-byte header as both
//! password and salt and a 32-byte output. The ROMix scratchpad is owned by
//! a [`Scratchpad`] so a mining thread allocates it once and reuses it for
//! every nonce.

mod pbkdf2;
mod salsa;

use serde::{Deserialize, Serialize};

use crate::error::{PowError, PowResult};

pub use pbkdf2::{hmac_sha256, pbkdf2_hmac_sha256, HmacSha256};
pub use salsa::{Lanes, SalsaBlock, Words};

/// Block layout used when none is named.
#[cfg(feature = "lanes")]
pub type DefaultBlock = Lanes;

/// Block layout used when none is named.
#[cfg(not(feature = "lanes"))]
pub type DefaultBlock = Words;

/// Bytes in one Salsa20 block.
const SALSA_BLOCK_BYTES: usize = 64;

/// scrypt cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost, a power of two.
    pub n: u32,
    /// Block size factor.
    pub r: u32,
    /// Parallelization factor.
    #[serde(default = "default_p")]
    pub p: u32,
}

fn default_p() -> u32 {
    1
}

impl ScryptParams {
    /// Litecoin's proof-of-work parameters.
    pub const LITECOIN: ScryptParams = ScryptParams { n: 1024, r: 1, p: 1 };

    /// Panics if `n` is not a power of two greater than one, or `r`/`p` is
    /// zero.
    pub fn new(n: u32, r: u32, p: u32) -> Self {
        let params = ScryptParams { n, r, p };
        assert!(
            params.validate().is_ok(),
            "invalid scrypt parameters N={} r={} p={}",
            n,
            r,
            p
        );
        params
    }

    pub fn validate(&self) -> PowResult<()> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(PowError::InvalidParameters(format!(
                "scrypt N={} is not a power of two",
                self.n
            )));
        }
        if self.r == 0 || self.p == 0 {
            return Err(PowError::InvalidParameters(format!(
                "scrypt r={} p={} must be positive",
                self.r, self.p
            )));
        }
        Ok(())
    }

    /// log2(N).
    pub fn log2_n(&self) -> u32 {
        self.n.trailing_zeros()
    }

    /// Scratchpad size in bytes: 128 * r * N.
    pub fn memory_bytes(&self) -> u64 {
        128 * self.r as u64 * self.n as u64
    }
}

/// Reusable scrypt working memory for one thread.
#[derive(Debug)]
pub struct Scratchpad<B: SalsaBlock = DefaultBlock> {
    params: ScryptParams,
    v: Vec<B>,
    x: Vec<B>,
    y: Vec<B>,
    buffer: Vec<u8>,
}

impl<B: SalsaBlock> Scratchpad<B> {
    /// Allocate working memory for `params`.
    pub fn new(params: ScryptParams) -> PowResult<Self> {
        params.validate()?;
        let blocks = 2 * params.r as usize;
        let total = usize::try_from(params.memory_bytes() / SALSA_BLOCK_BYTES as u64)
            .map_err(|_| too_large(&params))?;

        let mut v = Vec::new();
        v.try_reserve_exact(total).map_err(|_| too_large(&params))?;
        v.resize(total, B::default());

        Ok(Scratchpad {
            params,
            v,
            x: vec![B::default(); blocks],
            y: vec![B::default(); blocks],
            buffer: Vec::new(),
        })
    }

    pub fn params(&self) -> ScryptParams {
        self.params
    }

    /// Derive `out.len()` bytes from `password` and `salt`.
    pub fn hash(&mut self, password: &[u8], salt: &[u8], out: &mut [u8]) {
        let ScryptParams { n, r, p } = self.params;
        let lane_bytes = 128 * r as usize;

        self.buffer.resize(lane_bytes * p as usize, 0);
        pbkdf2_hmac_sha256(password, salt, 1, &mut self.buffer);

        for chunk in self.buffer.chunks_mut(lane_bytes) {
            for (block, bytes) in self.x.iter_mut().zip(chunk.chunks(SALSA_BLOCK_BYTES)) {
                *block = B::from_le_bytes(bytes);
            }
            ro_mix(&mut self.x, &mut self.v, &mut self.y, n as usize);
            for (block, bytes) in self.x.iter().zip(chunk.chunks_mut(SALSA_BLOCK_BYTES)) {
                block.write_le_bytes(bytes);
            }
        }

        pbkdf2_hmac_sha256(password, &self.buffer, 1, out);
    }

    /// Proof-of-work hash of a serialized header.
    pub fn hash_header(&mut self, header: &[u8; 80]) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.hash(header, header, &mut out);
        out
    }
}

fn too_large(params: &ScryptParams) -> PowError {
    PowError::InvalidParameters(format!(
        "scrypt N={} r={} needs {} bytes",
        params.n,
        params.r,
        params.memory_bytes()
    ))
}

/// One-shot scrypt with a freshly allocated scratchpad.
pub fn scrypt(password: &[u8], salt: &[u8], params: ScryptParams, out: &mut [u8]) -> PowResult<()> {
    let mut pad = Scratchpad::<DefaultBlock>::new(params)?;
    pad.hash(password, salt, out);
    Ok(())
}

/// Mix `x` (2r blocks) through the N-entry scratchpad `v`.
fn ro_mix<B: SalsaBlock>(x: &mut [B], v: &mut [B], y: &mut [B], n: usize) {
    let len = x.len();
    debug_assert_eq!(v.len(), len * n);

    for entry in v.chunks_exact_mut(len) {
        entry.copy_from_slice(x);
        block_mix(x, y);
    }

    for _ in 0..n {
        let j = x[len - 1].integerify() as usize & (n - 1);
        for (block, stored) in x.iter_mut().zip(&v[j * len..(j + 1) * len]) {
            block.xor_assign(stored);
        }
        block_mix(x, y);
    }
}

/// BlockMix: chain Salsa20/8 through the 2r blocks, emitting even-indexed
/// outputs first and odd-indexed outputs second.
fn block_mix<B: SalsaBlock>(b: &mut [B], y: &mut [B]) {
    let blocks = b.len();
    let half = blocks / 2;
    let mut x = b[blocks - 1];

    for (i, block) in b.iter().enumerate() {
        x.xor_assign(block);
        x.salsa20_8();
        y[(i % 2) * half + i / 2] = x;
    }

    b.copy_from_slice(y);
}
