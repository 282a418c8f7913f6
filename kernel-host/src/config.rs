//! Host configuration: environment-sourced node identity and bridge
//! constants, loaded the way the teacher's operator config loads its
//! chain configs — `.env` file first, then `env::var`, required fields
//! surfaced as `eyre` errors, secrets redacted from `Debug`.

use std::env;
use std::fmt;
use std::path::Path;

use bridge_kernel::types::{BridgeConstants, NodeConfig, NodeIdentity};
use eyre::{eyre, Result, WrapErr};

#[derive(Clone)]
pub struct HostConfig {
    pub node: NodeConfig,
    pub constants: BridgeConstants,
    pub metrics_addr: std::net::SocketAddr,
}

/// Custom `Debug` that redacts the node's own signing keys — the only
/// secrets a `NodeConfig` carries (peer identities are public pubkey
/// hashes, not keys).
impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConfig")
            .field("node_id", &self.node.node_id)
            .field("nodes", &self.node.nodes)
            .field("my_eth_key", &"<redacted>")
            .field("my_nock_key", &"<redacted>")
            .field("constants", &self.constants)
            .field("metrics_addr", &self.metrics_addr)
            .finish()
    }
}

fn default_metrics_port() -> u16 {
    9090
}

impl HostConfig {
    /// Load a `.env` file if present, then read from the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("failed to load .env file from {path}"))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let node_id: u32 = env::var("BRIDGE_NODE_ID")
            .map_err(|_| eyre!("BRIDGE_NODE_ID environment variable is required"))?
            .parse()
            .wrap_err("BRIDGE_NODE_ID must be a valid u32")?;

        let mut nodes = [NodeIdentity::default(); 5];
        for (i, node) in nodes.iter_mut().enumerate() {
            let prefix = format!("BRIDGE_NODE_{i}");
            let id: u32 = env::var(format!("{prefix}_ID"))
                .map_err(|_| eyre!("{prefix}_ID environment variable is required"))?
                .parse()
                .wrap_err_with(|| format!("{prefix}_ID must be a valid u32"))?;
            let pkh_hex = env::var(format!("{prefix}_PUBKEY_HASH"))
                .map_err(|_| eyre!("{prefix}_PUBKEY_HASH environment variable is required"))?;
            let pkh_bytes = hex::decode(pkh_hex.trim_start_matches("0x"))
                .wrap_err_with(|| format!("{prefix}_PUBKEY_HASH must be valid hex"))?;
            if pkh_bytes.len() != 32 {
                return Err(eyre!("{prefix}_PUBKEY_HASH must decode to exactly 32 bytes"));
            }
            let mut pubkey_hash = [0u8; 32];
            pubkey_hash.copy_from_slice(&pkh_bytes);
            *node = NodeIdentity { node_id: id, pubkey_hash };
        }

        let my_eth_key = env::var("BRIDGE_MY_ETH_KEY")
            .map_err(|_| eyre!("BRIDGE_MY_ETH_KEY environment variable is required"))?;
        let my_nock_key = env::var("BRIDGE_MY_NOCK_KEY")
            .map_err(|_| eyre!("BRIDGE_MY_NOCK_KEY environment variable is required"))?;

        let node = NodeConfig {
            node_id,
            nodes,
            my_eth_key,
            my_nock_key,
        };

        let default_constants = BridgeConstants::default();
        let constants = BridgeConstants {
            version: 0,
            min_signers: env_or(default_constants.min_signers, "BRIDGE_MIN_SIGNERS")?,
            total_signers: env_or(default_constants.total_signers, "BRIDGE_TOTAL_SIGNERS")?,
            minimum_event_nocks: env_or(
                default_constants.minimum_event_nocks,
                "BRIDGE_MINIMUM_EVENT_NOCKS",
            )?,
            nicks_fee_per_nock: env_or(
                default_constants.nicks_fee_per_nock,
                "BRIDGE_NICKS_FEE_PER_NOCK",
            )?,
            base_blocks_chunk: env_or(default_constants.base_blocks_chunk, "BRIDGE_BASE_BLOCKS_CHUNK")?,
            base_start_height: env_or(default_constants.base_start_height, "BRIDGE_BASE_START_HEIGHT")?,
            nockchain_start_height: env_or(
                default_constants.nockchain_start_height,
                "BRIDGE_NOCKCHAIN_START_HEIGHT",
            )?,
        };

        let metrics_port: u16 = env::var("BRIDGE_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_metrics_port);
        let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], metrics_port));

        Ok(HostConfig {
            node,
            constants,
            metrics_addr,
        })
    }
}

fn env_or<T: std::str::FromStr>(default: T, key: &str) -> Result<T> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| eyre!("{key} is set but is not a valid value")),
        Err(_) => Ok(default),
    }
}
