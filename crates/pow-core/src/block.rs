//! The 80-byte block header hashed by proof-of-work.

use crate::difficulty::Compact;
use crate::error::{PowError, PowResult};
use crate::hash::double_sha256;
use crate::retarget::{BlockSample, TimedBits};
use crate::time::BlockTime;

/// Size of a serialized block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// A block header. Hashes are in internal byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    /// Raw `nTime` field.
    pub timestamp: u32,
    pub bits: Compact,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn new(
        version: i32,
        prev_block_hash: [u8; 32],
        merkle_root: [u8; 32],
        timestamp: u32,
        bits: Compact,
    ) -> Self {
        BlockHeader {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce: 0,
        }
    }

    /// Little-endian wire layout: version, prev hash, merkle root, time,
    /// bits, nonce.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.prev_block_hash);
        header[36..68].copy_from_slice(&self.merkle_root);
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..76].copy_from_slice(&self.bits.bits().to_le_bytes());
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    pub fn deserialize(bytes: &[u8]) -> PowResult<Self> {
        if bytes.len() != BLOCK_HEADER_SIZE {
            return Err(PowError::InvalidParameters(format!(
                "block header is {} bytes, expected {}",
                bytes.len(),
                BLOCK_HEADER_SIZE
            )));
        }
        let word = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];

        let mut prev_block_hash = [0u8; 32];
        prev_block_hash.copy_from_slice(&bytes[4..36]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&bytes[36..68]);

        Ok(BlockHeader {
            version: i32::from_le_bytes(word(0)),
            prev_block_hash,
            merkle_root,
            timestamp: u32::from_le_bytes(word(68)),
            bits: Compact::new(u32::from_le_bytes(word(72))),
            nonce: u32::from_le_bytes(word(76)),
        })
    }

    /// Block id: double SHA256 of the header. Not the proof-of-work hash on
    /// scrypt chains.
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    pub fn block_time(&self) -> BlockTime {
        BlockTime::from_ntime(self.timestamp)
    }

    /// Retarget view of this header at `height`.
    pub fn sample(&self, height: u32) -> BlockSample {
        BlockSample::new(height, self.bits, self.block_time())
    }
}

impl TimedBits for BlockHeader {
    fn bits(&self) -> Compact {
        self.bits
    }

    fn time(&self) -> BlockTime {
        self.block_time()
    }
}
