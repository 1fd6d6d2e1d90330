//! Network presets and the per-chain context built from them.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::difficulty::Compact;
use crate::error::{PowError, PowResult};
use crate::genesis::{GenesisBlock, GenesisParams};
use crate::n_factor::NFactorSchedule;
use crate::pow::{ChainIdRule, PowHash, PowHasher};
use crate::retarget::{Algorithm, Checkpoints, Difficulty, RetargetParameters};
use crate::scrypt::ScryptParams;
use crate::time::BlockDuration;

/// Network selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Cores the genesis miner assumes the network will mine with.
    pub fn genesis_miner_cores(&self) -> u32 {
        match self {
            Network::Mainnet => 6,
            Network::Testnet => 1,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target time between blocks on both networks.
pub const BLOCK_PERIOD: BlockDuration = BlockDuration::seconds(150);

/// Everything consensus needs to know about a chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    pub network: Network,
    pub retarget: RetargetParameters,
    pub pow: PowHash,
    pub genesis: GenesisParams,
    /// Merged-mining chain id.
    #[serde(default)]
    pub chain_id: u32,
    /// Height from which the chain id is enforced, if merged mining is on.
    #[serde(default)]
    pub merged_mining_start: Option<u32>,
}

impl ChainParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => ChainParams {
                network,
                retarget: RetargetParameters {
                    block_period: BLOCK_PERIOD,
                    min_difficulty: Compact::new(0x1e0fffff),
                    algorithm: Algorithm::kgw(),
                },
                pow: PowHash::Scrypt(ScryptParams::LITECOIN),
                genesis: GenesisParams::litecoin(),
                chain_id: 0,
                merged_mining_start: None,
            },
            Network::Testnet => ChainParams {
                network,
                retarget: RetargetParameters {
                    block_period: BLOCK_PERIOD,
                    min_difficulty: Compact::new(0x1f00ffff),
                    algorithm: Algorithm::digishield(),
                },
                pow: PowHash::Scrypt(ScryptParams::LITECOIN),
                genesis: GenesisParams::litecoin_testnet(),
                chain_id: 0,
                merged_mining_start: None,
            },
        }
    }

    /// Mainnet with scrypt cost doubling every eighteen months from the
    /// genesis time.
    pub fn growing_memory(network: Network) -> Self {
        let mut params = ChainParams::for_network(network);
        params.pow = PowHash::NFactorScrypt(NFactorSchedule::doubling(params.genesis.time));
        params
    }

    pub fn from_json(json: &str) -> PowResult<Self> {
        let params: ChainParams = serde_json::from_str(json)?;
        params.pow.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> PowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Merged-mining rule for this chain, if enabled.
    pub fn merged_mining(&self) -> Option<ChainIdRule> {
        self.merged_mining_start.map(|start_height| ChainIdRule {
            chain_id: self.chain_id,
            start_height,
        })
    }
}

/// Validated chain parameters with the engines built from them.
#[derive(Debug)]
pub struct ChainContext {
    params: ChainParams,
    difficulty: Difficulty,
    genesis: GenesisBlock,
}

type SharedContext = OnceLock<Result<ChainContext, String>>;

static MAINNET: SharedContext = OnceLock::new();
static TESTNET: SharedContext = OnceLock::new();

/// Build into `cell` exactly once. A failed build is stored too, so every
/// caller sees the same outcome.
fn shared<'a>(
    cell: &'a SharedContext,
    build: impl FnOnce() -> PowResult<ChainContext>,
) -> PowResult<&'a ChainContext> {
    cell.get_or_init(|| build().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| PowError::InvalidParameters(e.clone()))
}

impl ChainContext {
    pub fn new(network: Network) -> PowResult<Self> {
        ChainContext::from_params(ChainParams::for_network(network))
    }

    /// Validate `params`, build the retarget engine and self-check genesis.
    pub fn from_params(params: ChainParams) -> PowResult<Self> {
        params.pow.validate()?;
        let difficulty = Difficulty::new(params.retarget.clone())?;
        let genesis = GenesisBlock::create(&params.genesis)?;
        info!(
            network = %params.network,
            algorithm = params.retarget.algorithm.name(),
            pow = params.pow.name(),
            "chain context ready"
        );
        Ok(ChainContext {
            params,
            difficulty,
            genesis,
        })
    }

    /// The shared context for `network`, built exactly once on first use.
    /// Racing first callers block until the build finishes.
    pub fn global(network: Network) -> PowResult<&'static ChainContext> {
        let cell = match network {
            Network::Mainnet => &MAINNET,
            Network::Testnet => &TESTNET,
        };
        shared(cell, || ChainContext::new(network))
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn difficulty(&self) -> &Difficulty {
        &self.difficulty
    }

    pub fn genesis(&self) -> &GenesisBlock {
        &self.genesis
    }

    /// Checkpoint set anchored at this chain's genesis block.
    pub fn checkpoints(&self) -> Checkpoints {
        Checkpoints::new(self.genesis.sample())
    }

    /// A fresh hasher for one worker thread.
    pub fn hasher(&self) -> PowHasher {
        PowHasher::new(self.params.pow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PowError;
    use crate::pow::{check_proof_of_work, NoMergedMining};

    #[test]
    fn test_network_from_str() {
        assert_eq!(Network::from_str("mainnet"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("TEST"), Some(Network::Testnet));
        assert_eq!(Network::from_str("regtest"), None);
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }

    #[test]
    fn test_contexts_build() {
        for network in [Network::Mainnet, Network::Testnet] {
            let ctx = ChainContext::new(network).unwrap();
            let genesis = ctx.genesis().header;
            assert_eq!(ctx.checkpoints().last_reliable_block(), ctx.genesis().sample());
            assert!(ctx.difficulty().is_valid(genesis.bits));
            check_proof_of_work(&genesis, 0, ctx.difficulty(), &mut ctx.hasher(), &NoMergedMining)
                .unwrap();
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = ChainContext::global(Network::Mainnet).unwrap();
        let b = ChainContext::global(Network::Mainnet).unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.params().network, Network::Mainnet);

        let threads: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| ChainContext::global(Network::Testnet).unwrap() as *const _ as usize))
            .collect();
        let addrs: Vec<usize> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_shared_context_builds_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cell = SharedContext::new();
        let builds = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    shared(&cell, || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        ChainContext::new(Network::Testnet)
                    })
                    .unwrap();
                });
            }
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        let failed = SharedContext::new();
        let mut params = ChainParams::for_network(Network::Testnet);
        params.genesis.nonce += 1;
        let first = shared(&failed, || ChainContext::from_params(params.clone()));
        assert!(matches!(first, Err(PowError::InvalidParameters(_))));
        let second = shared(&failed, || ChainContext::new(Network::Testnet));
        assert!(second.is_err());
    }

    #[test]
    fn test_growing_memory_matches_at_genesis() {
        let params = ChainParams::growing_memory(Network::Mainnet);
        let ctx = ChainContext::from_params(params).unwrap();
        let genesis = ctx.genesis().header;
        check_proof_of_work(&genesis, 0, ctx.difficulty(), &mut ctx.hasher(), &NoMergedMining)
            .unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let params = ChainParams::for_network(Network::Testnet);
        let json = params.to_json().unwrap();
        assert_eq!(ChainParams::from_json(&json).unwrap(), params);

        let custom = json.replace("\"digishield\"", "\"twice_and_half\"");
        let custom = ChainParams::from_json(&custom).unwrap();
        assert_eq!(custom.retarget.algorithm, Algorithm::TwiceAndHalf);

        let bad_percent = json.replace("\"dos_adjustment\": 110", "\"dos_adjustment\": 110.25");
        assert!(matches!(
            ChainParams::from_json(&bad_percent),
            Err(PowError::Config(_))
        ));

        let bad_n = json.replace("\"n\": 1024", "\"n\": 1000");
        assert!(matches!(
            ChainParams::from_json(&bad_n),
            Err(PowError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_merged_mining_rule() {
        let mut params = ChainParams::for_network(Network::Mainnet);
        assert!(params.merged_mining().is_none());
        params.chain_id = 0x21;
        params.merged_mining_start = Some(1000);
        assert_eq!(
            params.merged_mining(),
            Some(ChainIdRule {
                chain_id: 0x21,
                start_height: 1000
            })
        );
    }
}
