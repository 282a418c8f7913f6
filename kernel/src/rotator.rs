//! Deterministic proposer/verifier rotation: nodes sorted by the base58
//! encoding of their pubkey hash (string comparison, not raw-byte
//! comparison — `spec.md` §4.7/§9 is explicit that this must match the
//! source bit-for-bit across nodes), indexed by `height mod N`.

use crate::types::{NodeConfig, NodeIdentity};

fn sorted_nodes(config: &NodeConfig) -> Vec<NodeIdentity> {
    let mut nodes = config.nodes.to_vec();
    nodes.sort_by_key(|n| bs58::encode(n.pubkey_hash).into_string());
    nodes
}

/// `sorted[height mod N]`.
pub fn active_proposer(height: u64, config: &NodeConfig) -> NodeIdentity {
    let sorted = sorted_nodes(config);
    let n = sorted.len();
    sorted[(height as usize) % n]
}

/// `sorted[(height+1) mod N]` and `sorted[(height+2) mod N]`.
pub fn active_verifiers(height: u64, config: &NodeConfig) -> [NodeIdentity; 2] {
    let sorted = sorted_nodes(config);
    let n = sorted.len();
    [
        sorted[((height as usize) + 1) % n],
        sorted[((height as usize) + 2) % n],
    ]
}

pub fn is_local_proposer(height: u64, config: &NodeConfig) -> bool {
    active_proposer(height, config).node_id == config.node_id
}
