//! The ledger store: a compound-key map plus the `HashState` that composes
//! four of them, per `spec.md` §4.3/§9. Implemented as a map-of-maps with
//! automatic pruning of empty inner maps — the `z-mip` reimplementation
//! option `spec.md` §9 recommends, since this kernel needs no range scan
//! over the outer key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{BaseBlockBatch, BaseHash, Deposit, Hold, Name, NockBlock, NockHash, Withdrawal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundMap<A, B, V> {
    inner: BTreeMap<A, BTreeMap<B, V>>,
}

impl<A, B, V> Default for CompoundMap<A, B, V> {
    fn default() -> Self {
        CompoundMap {
            inner: BTreeMap::new(),
        }
    }
}

impl<A: Ord + Clone, B: Ord + Clone, V> CompoundMap<A, B, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, a: A, b: B, v: V) {
        self.inner.entry(a).or_default().insert(b, v);
    }

    pub fn get(&self, a: &A, b: &B) -> Option<&V> {
        self.inner.get(a)?.get(b)
    }

    pub fn has(&self, a: &A, b: &B) -> bool {
        self.get(a, b).is_some()
    }

    pub fn del(&mut self, a: &A, b: &B) -> Option<V> {
        let inner_map = self.inner.get_mut(a)?;
        let removed = inner_map.remove(b);
        if inner_map.is_empty() {
            self.inner.remove(a);
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.inner.values().map(|m| m.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&A, &B, &V)> {
        self.inner
            .iter()
            .flat_map(|(a, inner)| inner.iter().map(move |(b, v)| (a, b, v)))
    }
}

/// The ledger: two hashchains, two holds, and the four unsettled /
/// unconfirmed-settled compound maps from `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashState {
    pub nock_hashchain: BTreeMap<NockHash, NockBlock>,
    pub last_nock_block: NockHash,
    pub nock_next_height: u64,

    pub base_hashchain: BTreeMap<BaseHash, BaseBlockBatch>,
    pub last_base_blocks: BaseHash,
    pub base_next_height: u64,

    pub nock_hold: Option<Hold<BaseHash>>,
    pub base_hold: Option<Hold<NockHash>>,

    pub unsettled_deposits: CompoundMap<NockHash, Name, Deposit>,
    pub unconfirmed_settled_deposits: CompoundMap<NockHash, Name, Deposit>,
    pub unsettled_withdrawals: CompoundMap<BaseHash, crate::types::BaseEventId, Withdrawal>,
    pub unconfirmed_settled_withdrawals: CompoundMap<BaseHash, crate::types::BaseEventId, Withdrawal>,
}

impl HashState {
    pub fn new(nockchain_start_height: u64, base_start_height: u64) -> Self {
        HashState {
            nock_hashchain: BTreeMap::new(),
            last_nock_block: NockHash::default(),
            nock_next_height: nockchain_start_height,
            base_hashchain: BTreeMap::new(),
            last_base_blocks: BaseHash::default(),
            base_next_height: base_start_height,
            nock_hold: None,
            base_hold: None,
            unsettled_deposits: CompoundMap::new(),
            unconfirmed_settled_deposits: CompoundMap::new(),
            unsettled_withdrawals: CompoundMap::new(),
            unconfirmed_settled_withdrawals: CompoundMap::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.nock_hashchain.is_empty()
    }
}
