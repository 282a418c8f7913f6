//! Core identifiers and the bridge data model, mirroring `spec.md` §3.
//!
//! Newtypes follow the teacher's `ChainKey`/`EvmAddress` shape: a fixed-size
//! byte array with `from_hex`/`to_hex`/`Display`, kept `Ord` so the ledger's
//! `BTreeMap`-backed stores have a stable, canonical iteration order that
//! doubles as the hashable encoder's tap order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::based_list::BasedList;
use crate::hashable::{hash_of, map_to_hashable, Hashable, ToHashable};

macro_rules! hash_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
                let hex = hex.strip_prefix("0x").unwrap_or(hex);
                let bytes = hex::decode(hex)?;
                let mut out = [0u8; 32];
                out.copy_from_slice(&bytes);
                Ok($name(out))
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl ToHashable for $name {
            fn to_hashable(&self) -> Hashable {
                Hashable::Hash(self.0)
            }
        }
    };
}

hash_newtype!(NockHash);
hash_newtype!(BaseHash);

/// Identifies a Nock note: the two-hash key Nock itself uses for note names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name {
    pub first: NockHash,
    pub last: NockHash,
}

impl ToHashable for Name {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![self.first.to_hashable(), self.last.to_hashable()])
    }
}

/// A 20-byte EVM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvmAddr(pub [u8; 20]);

impl EvmAddr {
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(EvmAddr(out))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EvmAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl ToHashable for EvmAddr {
    fn to_hashable(&self) -> Hashable {
        Hashable::Hash({
            let mut padded = [0u8; 32];
            padded[12..].copy_from_slice(&self.0);
            padded
        })
    }
}

/// `BaseEventId`/`BaseTxId`/`BaseBlockId` are all `BasedList`.
pub type BaseEventId = BasedList;
pub type BaseTxId = BasedList;
pub type BaseBlockId = BasedList;

impl ToHashable for BasedList {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(self.0.iter().map(|&e| Hashable::Leaf(e)).collect())
    }
}

impl ToHashable for u64 {
    fn to_hashable(&self) -> Hashable {
        Hashable::Leaf(*self)
    }
}

impl ToHashable for u128 {
    fn to_hashable(&self) -> Hashable {
        BasedList::from_atom(*self).to_hashable()
    }
}

// ---------------------------------------------------------------------
// Nock-side data
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxVersion {
    V0,
    V1,
}

/// A `%bridge`/`%ba-blk`/`%ba-eid` note-data entry as observed by the
/// kernel. The exact byte layout is this implementation's own (the wire
/// format of Nock note data beyond what the kernel observes is explicitly
/// out of scope); what matters is that a malformed `%bridge` entry decodes
/// to `None` under a fault barrier rather than panicking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteData {
    pub bridge: Option<Vec<u8>>,
    pub ba_blk: Option<Vec<u8>>,
    pub ba_eid: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub name: Name,
    pub assets: u128,
    pub note_data: NoteData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub spent_name: Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NockTx {
    pub version: TxVersion,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// One inbound Nock block as the driver presents it: a page plus the full
/// transaction bodies it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NockBlockInput {
    pub version: TxVersion,
    pub height: u64,
    pub prev: NockHash,
    pub tx_ids: Vec<NockHash>,
    pub txs: BTreeMap<NockHash, NockTx>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub tx_id: NockHash,
    pub name: Name,
    pub dest: Option<EvmAddr>,
    pub amount_to_mint: u128,
    pub fee: u128,
}

impl ToHashable for Deposit {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![
            self.tx_id.to_hashable(),
            self.name.to_hashable(),
            match &self.dest {
                Some(d) => Hashable::Tuple(vec![Hashable::Leaf(1), d.to_hashable()]),
                None => Hashable::Tuple(vec![Hashable::Leaf(0)]),
            },
            self.amount_to_mint.to_hashable(),
            self.fee.to_hashable(),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalSettlement {
    pub event_id: BaseEventId,
    pub name: Name,
    pub amount: u128,
}

impl ToHashable for WithdrawalSettlement {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![
            self.event_id.to_hashable(),
            self.name.to_hashable(),
            self.amount.to_hashable(),
        ])
    }
}

/// `{height, block_id, deposits, withdrawal_settlements, prev}`. Identity is
/// `hash = TIP5(canonical encoding)` — note this is the *structural* hash,
/// distinct from `block_id` (the chain's own digest of the page), and it is
/// this structural hash that `as_of` in a `SignatureRequest` refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NockBlock {
    pub height: u64,
    pub block_id: NockHash,
    pub deposits: BTreeMap<Name, Deposit>,
    pub withdrawal_settlements: BTreeMap<Name, WithdrawalSettlement>,
    pub prev: NockHash,
}

impl ToHashable for NockBlock {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![
            self.height.to_hashable(),
            self.block_id.to_hashable(),
            map_to_hashable(&self.deposits),
            map_to_hashable(&self.withdrawal_settlements),
            self.prev.to_hashable(),
        ])
    }
}

impl NockBlock {
    /// The structural hash used as block identity and as `as_of`.
    pub fn structural_hash(&self) -> NockHash {
        NockHash(hash_of(self))
    }
}

// ---------------------------------------------------------------------
// Base-side data
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositSettlement {
    pub event_id: BaseEventId,
    pub counterpart_name: Name,
    pub as_of: NockHash,
    pub nock_height: u64,
    pub dest: EvmAddr,
    pub settled_amount: u128,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub event_id: BaseEventId,
    pub name: Name,
    pub dest: Name,
    pub amount: u128,
}

/// One event within a Base block, as the driver presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseEvent {
    DepositProcessed(DepositSettlement),
    /// Not yet implemented upstream; observing one is always a stop.
    BridgeNodeUpdated,
    BurnForWithdrawal(Withdrawal),
}

/// One block within an inbound Base chunk, before `BasedList` encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseBlockInput {
    pub height: u64,
    /// Big-endian raw integer bytes; encoded to a `BaseBlockId` by the
    /// advancer.
    pub block_id: Vec<u8>,
    pub parent_block_id: Vec<u8>,
    pub txs: Vec<BaseEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseBlockEntry {
    pub bid: BaseBlockId,
    pub parent: BaseBlockId,
}

impl ToHashable for BaseBlockEntry {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![self.bid.to_hashable(), self.parent.to_hashable()])
    }
}

/// `{first_height, last_height, blocks, withdrawals, deposit_settlements,
/// prev}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseBlockBatch {
    pub first_height: u64,
    pub last_height: u64,
    pub blocks: BTreeMap<u64, BaseBlockEntry>,
    pub withdrawals: BTreeMap<BaseEventId, Withdrawal>,
    pub deposit_settlements: BTreeMap<BaseEventId, DepositSettlement>,
    pub prev: BaseHash,
}

impl ToHashable for BaseBlockBatch {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![
            self.first_height.to_hashable(),
            self.last_height.to_hashable(),
            map_to_hashable(&self.blocks),
            map_to_hashable(&self.withdrawals),
            map_to_hashable(&self.deposit_settlements),
            self.prev.to_hashable(),
        ])
    }
}

impl ToHashable for Withdrawal {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![
            self.event_id.to_hashable(),
            self.name.to_hashable(),
            self.dest.to_hashable(),
            self.amount.to_hashable(),
        ])
    }
}

impl ToHashable for DepositSettlement {
    fn to_hashable(&self) -> Hashable {
        Hashable::Tuple(vec![
            self.event_id.to_hashable(),
            self.counterpart_name.to_hashable(),
            self.as_of.to_hashable(),
            self.nock_height.to_hashable(),
            self.dest.to_hashable(),
            self.settled_amount.to_hashable(),
            self.nonce.to_hashable(),
        ])
    }
}

impl BaseBlockBatch {
    pub fn structural_hash(&self) -> BaseHash {
        BaseHash(hash_of(self))
    }
}

// ---------------------------------------------------------------------
// Holds, stop info, signature requests
// ---------------------------------------------------------------------

/// A single-slot parking state pausing one chain's advancement until a
/// named block on the other chain is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold<H> {
    pub hash: H,
    pub height: u64,
}

/// The last-known-good checkpoint of both chains, embedded in every stop
/// effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopInfo {
    pub base: (BaseHash, u64),
    pub nock: (NockHash, u64),
}

/// Bit-level layout for inter-node compatibility (`spec.md` §6):
/// `tx_id: 32B, name: (first: 32B, last: 32B), recipient: 20B, amount:
/// uint256, block_height: u64, as_of: 32B, nonce: u64`. Wire encoding beyond
/// what the kernel observes (e.g. the `keccak256(abi.encode(...))` preimage
/// the Base contract checks signatures against) is a driver/signer concern,
/// out of scope for the kernel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub tx_id: NockHash,
    pub name: Name,
    pub recipient: EvmAddr,
    pub amount: u128,
    pub block_height: u64,
    pub as_of: NockHash,
    pub nonce: u64,
}

// ---------------------------------------------------------------------
// Node configuration and constants
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: u32,
    pub pubkey_hash: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: u32,
    pub nodes: [NodeIdentity; 5],
    pub my_eth_key: String,
    pub my_nock_key: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_id: 0,
            nodes: [
                NodeIdentity { node_id: 0, pubkey_hash: [0; 32] },
                NodeIdentity { node_id: 1, pubkey_hash: [1; 32] },
                NodeIdentity { node_id: 2, pubkey_hash: [2; 32] },
                NodeIdentity { node_id: 3, pubkey_hash: [3; 32] },
                NodeIdentity { node_id: 4, pubkey_hash: [4; 32] },
            ],
            my_eth_key: String::new(),
            my_nock_key: String::new(),
        }
    }
}

/// `{version, min_signers, total_signers, minimum_event_nocks,
/// nicks_fee_per_nock, base_blocks_chunk, base_start_height,
/// nockchain_start_height}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConstants {
    pub version: u8,
    pub min_signers: u8,
    pub total_signers: u8,
    pub minimum_event_nocks: u64,
    pub nicks_fee_per_nock: u64,
    pub base_blocks_chunk: u64,
    pub base_start_height: u64,
    pub nockchain_start_height: u64,
}

/// Fixed, not settable via `SetConstants` (`spec.md` §6 defaults list).
pub const NICKS_PER_NOCK: u64 = 65_536;

impl Default for BridgeConstants {
    fn default() -> Self {
        BridgeConstants {
            version: 0,
            min_signers: 3,
            total_signers: 5,
            minimum_event_nocks: 100_000,
            nicks_fee_per_nock: 195,
            base_blocks_chunk: 100,
            base_start_height: 0,
            nockchain_start_height: 0,
        }
    }
}

// ---------------------------------------------------------------------
// Causes and effects
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cause {
    CfgLoad(Option<NodeConfig>),
    SetConstants(BridgeConstants),
    Stop(StopInfo),
    Start,
    BaseBlocks(Vec<BaseBlockInput>),
    NockchainBlock(NockBlockInput),
    ProposedBaseCall(Vec<SignatureRequest>),
    ProposedNockTx(Vec<u8>),
}

impl Cause {
    pub fn name(&self) -> &'static str {
        match self {
            Cause::CfgLoad(_) => "cfg-load",
            Cause::SetConstants(_) => "set-constants",
            Cause::Stop(_) => "stop",
            Cause::Start => "start",
            Cause::BaseBlocks(_) => "base-blocks",
            Cause::NockchainBlock(_) => "nockchain-block",
            Cause::ProposedBaseCall(_) => "proposed-base-call",
            Cause::ProposedNockTx(_) => "proposed-nock-tx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Stop {
        reason: String,
        last: StopInfo,
    },
    ProposeBaseCall {
        requests: Vec<SignatureRequest>,
    },
    BaseCall {
        sigs: Vec<Vec<u8>>,
        data: Vec<u8>,
    },
    NockchainTx {
        tx: Vec<u8>,
    },
    GrpcPeek {
        pid: String,
        kind: String,
        path: String,
    },
    GrpcCall {
        ip: String,
        method: String,
        data: Vec<u8>,
    },
}
