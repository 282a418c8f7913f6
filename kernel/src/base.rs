//! Base chain advancer (`spec.md` §4.5/§4.5.1): validates and appends one
//! chunk of Base blocks, matches deposit settlements against the Nock-side
//! ledger (installing a hold when the referenced Nock block hasn't landed
//! yet), and records withdrawal burns (rejected outright — this release
//! does not support withdrawals).

use std::collections::BTreeMap;

use crate::based_list::BasedList;
use crate::error::KernelFault;
use crate::state::BridgeState;
use crate::types::{
    BaseBlockBatch, BaseBlockEntry, BaseBlockInput, BaseEvent, DepositSettlement, Effect, Hold,
};

/// Validate and encode one inbound chunk, match its deposit settlements,
/// and append it to `base_hashchain`.
pub fn advance(
    mut state: BridgeState,
    batch: &[BaseBlockInput],
) -> Result<(Vec<Effect>, BridgeState), KernelFault> {
    let Some(first) = batch.first() else {
        return Ok((vec![], state));
    };
    let first_height = first.height;
    let last_height = batch.last().unwrap().height;

    // 1. Chunk span must match the configured chunk size.
    let chunk = state.constants.base_blocks_chunk;
    if last_height.saturating_sub(first_height) + 1 != chunk {
        return Err(KernelFault::BaseChunkSizeMismatch);
    }

    // Heights must be contiguous and in order; no gaps, no reordering.
    for (i, b) in batch.iter().enumerate() {
        if b.height != first_height + i as u64 {
            return Err(KernelFault::BaseHeightsNotContiguous);
        }
    }

    // 2. Below the configured start height, ignore the whole chunk.
    if first_height < state.constants.base_start_height {
        return Ok((vec![], state));
    }

    // 3. First height must equal next height.
    if first_height != state.hash_state.base_next_height {
        return Err(KernelFault::BaseHeightMismatch);
    }

    // 4. Encode block ids/parents and check parent-chaining within the
    // chunk.
    let mut blocks = BTreeMap::new();
    let mut withdrawals = BTreeMap::new();
    let mut deposit_settlements = BTreeMap::new();
    let mut prev_bid: Option<BasedList> = None;
    for b in batch {
        let bid = BasedList::from_bytes_be(&b.block_id);
        let parent = BasedList::from_bytes_be(&b.parent_block_id);
        if let Some(prev) = &prev_bid {
            if &parent != prev {
                return Err(KernelFault::BaseParentMismatch);
            }
        }
        prev_bid = Some(bid.clone());
        blocks.insert(b.height, BaseBlockEntry { bid, parent });

        for tx in &b.txs {
            match tx {
                BaseEvent::DepositProcessed(s) => {
                    deposit_settlements.insert(s.event_id.clone(), s.clone());
                }
                BaseEvent::BurnForWithdrawal(w) => {
                    withdrawals.insert(w.event_id.clone(), w.clone());
                }
                BaseEvent::BridgeNodeUpdated => {
                    return Err(KernelFault::BridgeNodeUpdatedUnsupported);
                }
            }
        }
    }

    // 5. Build and append the batch record.
    let chunk_batch = BaseBlockBatch {
        first_height,
        last_height,
        blocks,
        withdrawals: withdrawals.clone(),
        deposit_settlements: deposit_settlements.clone(),
        prev: state.hash_state.last_base_blocks,
    };
    let batch_hash = chunk_batch.structural_hash();

    state.hash_state.base_hashchain.insert(batch_hash, chunk_batch);
    state.hash_state.last_base_blocks = batch_hash;
    state.hash_state.base_next_height += chunk;

    // 6. Record withdrawal burns, keyed by batch hash, then reject — this
    // release does not support withdrawals (`spec.md` explicit non-goal).
    if !withdrawals.is_empty() {
        for (event_id, w) in withdrawals {
            state.hash_state.unsettled_withdrawals.put(batch_hash, event_id, w);
        }
        return Err(KernelFault::WithdrawalSettlementDetected);
    }

    // 7. Match deposit settlements against the Nock-side ledger.
    process_deposit_settlements(&mut state, &deposit_settlements)?;

    // 8. `nock_hold` is keyed by a Base hash; clear it if this chunk is the
    // one it was waiting for.
    if let Some(hold) = state.hash_state.nock_hold {
        if hold.hash == batch_hash {
            tracing::info!(hash = %batch_hash, "clearing nock hold: awaited base batch arrived");
            state.hash_state.nock_hold = None;
        }
    }

    Ok((vec![], state))
}

/// `spec.md` §4.5.1: iterate settlements in map-order (ascending
/// `event_id`). The nonce and missing-Nock-block checks run for every
/// settlement regardless of whether an earlier one in this same batch
/// already installed a hold — a later settlement naming a higher Nock
/// height upgrades the hold to the greater height. Only the match/apply
/// step is skipped once a hold is pending, preserving the two-phase loop
/// the source implementation uses.
fn process_deposit_settlements(
    state: &mut BridgeState,
    settlements: &BTreeMap<BasedList, DepositSettlement>,
) -> Result<(), KernelFault> {
    for s in settlements.values() {
        if s.nonce >= state.next_nonce {
            return Err(KernelFault::SettlementNonceTooHigh);
        }

        if !state.hash_state.nock_hashchain.contains_key(&s.as_of) {
            let candidate = Hold {
                hash: s.as_of,
                height: s.nock_height,
            };
            state.hash_state.base_hold = Some(match state.hash_state.base_hold {
                Some(existing) if existing.height >= candidate.height => existing,
                _ => candidate,
            });
            continue;
        }

        if state.hash_state.base_hold.is_some() {
            continue;
        }

        let in_unsettled = state
            .hash_state
            .unsettled_deposits
            .has(&s.as_of, &s.counterpart_name);
        let in_unconfirmed = state
            .hash_state
            .unconfirmed_settled_deposits
            .has(&s.as_of, &s.counterpart_name);
        if !in_unsettled && !in_unconfirmed {
            return Err(KernelFault::SettlementDepositAbsent);
        }

        let deposit = state
            .hash_state
            .nock_hashchain
            .get(&s.as_of)
            .and_then(|b| b.deposits.get(&s.counterpart_name))
            .cloned()
            .ok_or(KernelFault::SettlementDepositAbsent)?;

        if deposit.dest != Some(s.dest) || deposit.amount_to_mint != s.settled_amount {
            return Err(KernelFault::SettlementMismatch);
        }

        state.hash_state.unsettled_deposits.del(&s.as_of, &s.counterpart_name);
        state
            .hash_state
            .unconfirmed_settled_deposits
            .del(&s.as_of, &s.counterpart_name);
        tracing::info!(
            name = ?s.counterpart_name,
            as_of = %s.as_of,
            "deposit settled on base"
        );
    }
    Ok(())
}
