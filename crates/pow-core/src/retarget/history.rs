//! Chain history as seen by the retarget engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::difficulty::Compact;
use crate::time::BlockTime;

/// The three facts retargeting needs about a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSample {
    pub height: u32,
    pub difficulty: Compact,
    pub time: BlockTime,
}

impl BlockSample {
    pub fn new(height: u32, difficulty: Compact, time: BlockTime) -> Self {
        BlockSample {
            height,
            difficulty,
            time,
        }
    }
}

/// A block that can reach its parent, such as a node in a block index.
pub trait BlockIndex {
    fn sample(&self) -> BlockSample;
    fn prev(&self) -> Option<&Self>;

    /// This block and its ancestors, newest first.
    fn ancestors(&self) -> Ancestors<'_, Self>
    where
        Self: Sized,
    {
        Ancestors { next: Some(self) }
    }
}

/// Lazy walk from a block back to genesis.
#[derive(Debug)]
pub struct Ancestors<'a, B> {
    next: Option<&'a B>,
}

// Manual impl: `derive` would require `B: Clone`
impl<B> Clone for Ancestors<'_, B> {
    fn clone(&self) -> Self {
        Ancestors { next: self.next }
    }
}

impl<B: BlockIndex> Iterator for Ancestors<'_, B> {
    type Item = BlockSample;

    fn next(&mut self) -> Option<BlockSample> {
        let block = self.next?;
        self.next = block.prev();
        Some(block.sample())
    }
}

/// Trusted blocks a new block's claimed work is measured against.
#[derive(Clone, Debug)]
pub struct Checkpoints {
    genesis: BlockSample,
    points: BTreeMap<u32, BlockSample>,
}

impl Checkpoints {
    pub fn new(genesis: BlockSample) -> Self {
        Checkpoints {
            genesis,
            points: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, sample: BlockSample) {
        self.points.insert(sample.height, sample);
    }

    /// The highest checkpoint, or genesis when there is none.
    pub fn last_reliable_block(&self) -> BlockSample {
        self.points
            .values()
            .next_back()
            .copied()
            .unwrap_or(self.genesis)
    }
}
