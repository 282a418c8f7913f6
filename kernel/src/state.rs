//! `BridgeState`: the single owned record the dispatcher threads through
//! every cause, per `spec.md` §3/§9. Every transition is a pure function
//! `(BridgeState, Cause) -> (Vec<Effect>, BridgeState)`; nothing in this
//! crate mutates a `BridgeState` in place across a fault-barrier boundary —
//! handlers always return a fresh value, and the dispatcher discards it on
//! any error.

use serde::{Deserialize, Serialize};

use crate::ledger::HashState;
use crate::types::{BridgeConstants, NockBlock, NockHash, NodeConfig, StopInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeState {
    pub config: NodeConfig,
    pub constants: BridgeConstants,
    pub hash_state: HashState,
    pub next_nonce: u64,
    pub last_block: NockBlock,
    pub bridge_lock_root: NockHash,
    pub stop: Option<StopInfo>,
}

impl BridgeState {
    /// Construct the state the kernel starts in before any Nock block has
    /// been accepted.
    pub fn genesis(config: NodeConfig, constants: BridgeConstants) -> Self {
        let hash_state = HashState::new(constants.nockchain_start_height, constants.base_start_height);
        let last_block = NockBlock {
            height: constants.nockchain_start_height,
            block_id: NockHash::default(),
            deposits: Default::default(),
            withdrawal_settlements: Default::default(),
            prev: NockHash::default(),
        };
        BridgeState {
            config,
            constants,
            hash_state,
            next_nonce: 1,
            last_block,
            bridge_lock_root: NockHash::default(),
            stop: None,
        }
    }

    /// The last-known-good checkpoint of both chains, embedded in `Stop`
    /// effects.
    pub fn stop_info(&self) -> StopInfo {
        StopInfo {
            base: (
                self.hash_state.last_base_blocks,
                self.hash_state
                    .base_next_height
                    .saturating_sub(self.constants.base_blocks_chunk.max(1)),
            ),
            nock: (
                self.hash_state.last_nock_block,
                self.hash_state.nock_next_height.saturating_sub(1),
            ),
        }
    }

    /// Round-trip to/from bytes for snapshot persistence. The kernel only
    /// requires this round-trip be byte-identical, not a specific wire
    /// codec (`spec.md` §6), so this uses plain JSON.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrips_byte_identical() {
        let state = BridgeState::genesis(Default::default(), Default::default());
        let bytes = state.to_bytes().unwrap();
        let restored = BridgeState::from_bytes(&bytes).unwrap();
        let bytes2 = restored.to_bytes().unwrap();
        assert_eq!(bytes, bytes2);
    }
}
