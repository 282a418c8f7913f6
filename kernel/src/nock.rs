//! Nock chain advancer (`spec.md` §4.4): validates and appends one Nock
//! block, extracts bridge deposits/withdrawals from its transactions,
//! updates the ledger, and emits signature requests when this node is
//! proposer.

use std::collections::BTreeMap;

use crate::based_list::BasedList;
use crate::error::KernelFault;
use crate::rotator;
use crate::state::BridgeState;
use crate::types::{
    Deposit, Effect, EvmAddr, Name, NockBlock, NockBlockInput, NockHash, SignatureRequest, TxVersion,
    NICKS_PER_NOCK,
};

/// `ceil(assets / nicks_per_nock) * nicks_fee_per_nock`.
fn calculate_fee(assets: u128, nicks_fee_per_nock: u64) -> u128 {
    let npn = NICKS_PER_NOCK as u128;
    let units = (assets + npn - 1) / npn;
    units * nicks_fee_per_nock as u128
}

/// A 26-byte fixed layout: `{version: u8, base_marker: u8, chunk0: u64 BE,
/// chunk1: u64 BE, chunk2: u64 BE}`. This is this implementation's own
/// encoding of the `%bridge` note-data entry — the wire format Nock note
/// data uses beyond what the kernel observes is explicitly out of scope —
/// and is parsed under a fault barrier: any malformed input decodes to
/// `None`, never panics.
fn decode_bridge_entry(bytes: &[u8]) -> Option<EvmAddr> {
    if bytes.len() != 26 {
        return None;
    }
    let version = bytes[0];
    let base_marker = bytes[1];
    if version != 0 || base_marker != 1 {
        return None;
    }
    let mut read_u64 = |off: usize| -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[off..off + 8]);
        u64::from_be_bytes(buf)
    };
    let chunk0 = read_u64(2);
    let chunk1 = read_u64(10);
    let chunk2 = read_u64(18);
    let based = BasedList(vec![chunk0, chunk1, chunk2]);
    if !based.valid() {
        return None;
    }
    based.based_to_evm().ok()
}

/// Advance the Nock chain by one block.
pub fn advance(
    mut state: BridgeState,
    input: &NockBlockInput,
) -> Result<(Vec<Effect>, BridgeState), KernelFault> {
    // 1. V0 blocks are silently ignored.
    if input.version == TxVersion::V0 {
        return Ok((vec![], state));
    }

    // 2. tx-ids must match the supplied tx map exactly.
    let supplied: std::collections::BTreeSet<&NockHash> = input.txs.keys().collect();
    let named: std::collections::BTreeSet<&NockHash> = input.tx_ids.iter().collect();
    if supplied != named {
        return Err(KernelFault::TxIdsMismatch);
    }

    // 3. Below the configured start height, ignore.
    if input.height < state.constants.nockchain_start_height {
        return Ok((vec![], state));
    }

    // 4. Height must equal next height.
    if input.height != state.hash_state.nock_next_height {
        return Err(KernelFault::NockHeightMismatch);
    }

    // 5. Reorg check, skipped at the genesis-for-bridge block.
    if !state.hash_state.is_genesis() && input.prev != state.hash_state.last_nock_block {
        return Err(KernelFault::NockReorg);
    }

    // 6. Partition transactions into deposits and withdrawals.
    let mut deposit_txs: Vec<(&NockHash, &crate::types::NockTx)> = Vec::new();
    for tx_id in &input.tx_ids {
        let tx = &input.txs[tx_id];
        let is_v1 = tx.version == TxVersion::V1;

        let is_deposit = is_v1 && tx.outputs.iter().any(|o| o.note_data.bridge.is_some());

        let is_withdrawal = is_v1
            && !tx.inputs.is_empty()
            && tx
                .inputs
                .iter()
                .all(|i| i.spent_name.first == state.bridge_lock_root)
            && tx
                .outputs
                .iter()
                .any(|o| o.note_data.ba_blk.is_some() && o.note_data.ba_eid.is_some());

        if is_withdrawal {
            // Withdrawals disabled this release; a tx cannot satisfy both
            // tests, and a withdrawal tx is always fatal.
            return Err(KernelFault::WithdrawalTxDetected);
        }

        if is_deposit {
            deposit_txs.push((tx_id, tx));
        }
    }

    // 7. Extract one deposit per qualifying transaction.
    let mut deposits: BTreeMap<Name, Deposit> = BTreeMap::new();
    for (tx_id, tx) in deposit_txs {
        let min_assets = state.constants.minimum_event_nocks as u128 * NICKS_PER_NOCK as u128;
        let candidate = tx.outputs.iter().find(|o| {
            o.note_data.bridge.is_some()
                && o.name.first == state.bridge_lock_root
                && o.assets >= min_assets
        });
        let Some(output) = candidate else {
            continue;
        };

        let dest = output
            .note_data
            .bridge
            .as_deref()
            .and_then(decode_bridge_entry);

        let fee = calculate_fee(output.assets, state.constants.nicks_fee_per_nock);
        let amount_to_mint = output.assets.saturating_sub(fee);
        if amount_to_mint == 0 {
            continue;
        }

        deposits.insert(
            output.name,
            Deposit {
                tx_id: *tx_id,
                name: output.name,
                dest,
                amount_to_mint,
                fee,
            },
        );
    }

    // 8. Build and append the block record.
    let block = NockBlock {
        height: input.height,
        block_id: {
            // The block's own digest (distinct from its structural hash);
            // a placeholder derived deterministically from the inputs the
            // driver handed us, since the wire block-id format itself is
            // out of scope.
            let mut bytes = [0u8; 32];
            bytes[..8].copy_from_slice(&input.height.to_be_bytes());
            bytes[8..].copy_from_slice(&input.prev.0[..24]);
            NockHash(bytes)
        },
        deposits: deposits.clone(),
        withdrawal_settlements: BTreeMap::new(),
        prev: input.prev,
    };
    let block_hash = block.structural_hash();

    state.hash_state.nock_hashchain.insert(block_hash, block.clone());
    state.hash_state.last_nock_block = block_hash;
    state.hash_state.nock_next_height += 1;
    state.last_block = block.clone();

    // 9. Every deposit starts unsettled.
    for (name, deposit) in &deposits {
        state
            .hash_state
            .unsettled_deposits
            .put(block_hash, *name, deposit.clone());
    }

    // 10. Withdrawal settlements are always empty in this release; a
    // nonempty set would mean the driver observed one anyway.
    if !block.withdrawal_settlements.is_empty() {
        return Err(KernelFault::WithdrawalSettlementDetected);
    }

    // 11. Propose signature requests for deposits with a resolved
    // destination, in ascending key (Name) order, nonce ascending.
    let mut effects = Vec::new();
    if rotator::is_local_proposer(input.height, &state.config) {
        let mut requests = Vec::new();
        for (name, deposit) in deposits.iter() {
            let Some(dest) = deposit.dest else {
                continue;
            };
            let moved = state
                .hash_state
                .unsettled_deposits
                .del(&block_hash, name)
                .expect("deposit just inserted into unsettled_deposits");
            state
                .hash_state
                .unconfirmed_settled_deposits
                .put(block_hash, *name, moved);

            requests.push(SignatureRequest {
                tx_id: deposit.tx_id,
                name: *name,
                recipient: dest,
                amount: deposit.amount_to_mint,
                block_height: input.height,
                as_of: block_hash,
                nonce: state.next_nonce,
            });
            state.next_nonce += 1;
        }
        if !requests.is_empty() {
            tracing::info!(
                height = input.height,
                count = requests.len(),
                "proposing signature requests for new deposits"
            );
            effects.push(Effect::ProposeBaseCall { requests });
        }
    }

    // 12. `base_hold` is keyed by a Nock hash (it pauses Base advancement
    // until a named Nock block lands); clear it if this new block is the
    // one it was waiting for. `nock_hold` is keyed by a Base hash and is
    // only ever cleared by the Base advancer (`spec.md` §4.5 step 9).
    if let Some(hold) = state.hash_state.base_hold {
        if hold.hash == block_hash {
            tracing::info!(hash = %block_hash, "clearing base hold: awaited nock block arrived");
            state.hash_state.base_hold = None;
        }
    }

    Ok((effects, state))
}
