//! End-to-end scenario coverage for the six concrete cases `spec.md` §8
//! calls out, driven through the public `dispatch` entry point rather
//! than the individual advancers.

use std::collections::BTreeMap;

use bridge_kernel::based_list::BasedList;
use bridge_kernel::dispatcher::dispatch;
use bridge_kernel::state::BridgeState;
use bridge_kernel::types::{
    BaseEvent, BaseBlockInput, BridgeConstants, Cause, DepositSettlement, Effect, EvmAddr, Name,
    NockBlockInput, NockHash, NockTx, NoteData, SignatureRequest, TxOutput, TxVersion,
};

fn name(tag: u8) -> Name {
    Name {
        first: NockHash([tag; 32]),
        last: NockHash([tag.wrapping_add(1); 32]),
    }
}

fn bridge_entry(addr: &EvmAddr) -> Vec<u8> {
    let based = BasedList::evm_to_based(addr).unwrap();
    let mut out = vec![0u8, 1u8];
    for chunk in &based.0 {
        out.extend_from_slice(&chunk.to_be_bytes());
    }
    out
}

fn genesis_state(lock_root: NockHash) -> BridgeState {
    let constants = BridgeConstants {
        nockchain_start_height: 0,
        ..BridgeConstants::default()
    };
    let mut state = BridgeState::genesis(Default::default(), constants);
    state.bridge_lock_root = lock_root;
    state
}

fn deposit_block(
    height: u64,
    prev: NockHash,
    tx_id: NockHash,
    output_name: Name,
    assets: u128,
    dest: &EvmAddr,
) -> NockBlockInput {
    let tx = NockTx {
        version: TxVersion::V1,
        inputs: vec![],
        outputs: vec![TxOutput {
            name: output_name,
            assets,
            note_data: NoteData {
                bridge: Some(bridge_entry(dest)),
                ba_blk: None,
                ba_eid: None,
            },
        }],
    };
    NockBlockInput {
        version: TxVersion::V1,
        height,
        prev,
        tx_ids: vec![tx_id],
        txs: BTreeMap::from([(tx_id, tx)]),
    }
}

#[test]
fn scenario_1_happy_deposit() {
    let lock_root = NockHash([0xAA; 32]);
    let state = genesis_state(lock_root);
    let addr = EvmAddr([0xCD; 20]);
    let assets = 100_000u128 * bridge_kernel::types::NICKS_PER_NOCK as u128;
    let output_name = name(1);
    let tx_id = NockHash([7; 32]);
    let input = deposit_block(0, NockHash::default(), tx_id, output_name, assets, &addr);

    let (effects, new_state) = dispatch(state, Cause::NockchainBlock(input));

    assert_eq!(effects.len(), 1);
    let Effect::ProposeBaseCall { requests } = &effects[0] else {
        panic!("expected ProposeBaseCall, got {effects:?}");
    };
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].nonce, 1);
    let fee = (assets + 65_535) / 65_536 * 195;
    assert_eq!(requests[0].amount, assets - fee);
    assert_eq!(new_state.next_nonce, 2);

    let block_hash = new_state.hash_state.last_nock_block;
    assert!(new_state
        .hash_state
        .unconfirmed_settled_deposits
        .has(&block_hash, &output_name));
}

#[test]
fn scenario_2_malformed_recipient() {
    let lock_root = NockHash([0xAA; 32]);
    let state = genesis_state(lock_root);
    let assets = 100_000u128 * bridge_kernel::types::NICKS_PER_NOCK as u128;
    let output_name = name(2);
    let tx_id = NockHash([8; 32]);
    let tx = NockTx {
        version: TxVersion::V1,
        inputs: vec![],
        outputs: vec![TxOutput {
            name: output_name,
            assets,
            note_data: NoteData {
                bridge: Some(vec![0xDE, 0xAD]),
                ba_blk: None,
                ba_eid: None,
            },
        }],
    };
    let input = NockBlockInput {
        version: TxVersion::V1,
        height: 0,
        prev: NockHash::default(),
        tx_ids: vec![tx_id],
        txs: BTreeMap::from([(tx_id, tx)]),
    };

    let (effects, new_state) = dispatch(state, Cause::NockchainBlock(input));

    assert!(effects.is_empty());
    assert_eq!(new_state.next_nonce, 1);
    let block_hash = new_state.hash_state.last_nock_block;
    let deposit = new_state
        .hash_state
        .unsettled_deposits
        .get(&block_hash, &output_name)
        .unwrap();
    assert_eq!(deposit.dest, None);
}

#[test]
fn scenario_3_double_proposal_stops_and_rolls_back() {
    let lock_root = NockHash([0xAA; 32]);
    let state = genesis_state(lock_root);
    let addr = EvmAddr([0xCD; 20]);
    let assets = 100_000u128 * bridge_kernel::types::NICKS_PER_NOCK as u128;
    let output_name = name(1);
    let tx_id = NockHash([7; 32]);
    let input = deposit_block(0, NockHash::default(), tx_id, output_name, assets, &addr);
    let (_, state) = dispatch(state, Cause::NockchainBlock(input));

    let block_hash = state.hash_state.last_nock_block;
    let replay = SignatureRequest {
        tx_id,
        name: output_name,
        recipient: addr,
        amount: state
            .hash_state
            .unconfirmed_settled_deposits
            .get(&block_hash, &output_name)
            .unwrap()
            .amount_to_mint,
        block_height: 0,
        as_of: block_hash,
        nonce: 0,
    };

    let pre = state.clone();
    let (effects, new_state) = dispatch(state, Cause::ProposedBaseCall(vec![replay]));

    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::Stop { .. }));
    assert_eq!(new_state.next_nonce, pre.next_nonce);
    assert_eq!(
        new_state.hash_state.unconfirmed_settled_deposits.count(),
        pre.hash_state.unconfirmed_settled_deposits.count()
    );
}

#[test]
fn scenario_4_settlement_before_deposit_installs_hold() {
    let state = genesis_state(NockHash([0xAA; 32]));
    let mut state = state;
    state.constants.base_blocks_chunk = 1;
    state.next_nonce = 2;

    let unseen_nock_block = NockHash([0x55; 32]);
    let settlement = DepositSettlement {
        event_id: BasedList::from_atom(1),
        counterpart_name: name(9),
        as_of: unseen_nock_block,
        nock_height: 3,
        dest: EvmAddr([1; 20]),
        settled_amount: 10,
        nonce: 0,
    };
    let batch = vec![BaseBlockInput {
        height: 0,
        block_id: vec![1],
        parent_block_id: vec![0],
        txs: vec![BaseEvent::DepositProcessed(settlement)],
    }];

    let (effects, new_state) = dispatch(state, Cause::BaseBlocks(batch));
    assert!(effects.is_empty());
    let hold = new_state.hash_state.base_hold.expect("hold installed");
    assert_eq!(hold.hash, unseen_nock_block);
    assert_eq!(hold.height, 3);

    // While the hold is outstanding, any further cause is forced to stop.
    let (effects, newer_state) = dispatch(new_state, Cause::SetConstants(BridgeConstants::default()));
    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::Stop { .. }));
    assert!(newer_state.stop.is_some());
}

#[test]
fn scenario_5_reorg_stops_with_rollback() {
    let state = genesis_state(NockHash([0xAA; 32]));
    let empty_tx = || NockTx {
        version: TxVersion::V1,
        inputs: vec![],
        outputs: vec![],
    };
    let first = NockBlockInput {
        version: TxVersion::V1,
        height: 0,
        prev: NockHash::default(),
        tx_ids: vec![NockHash([1; 32])],
        txs: BTreeMap::from([(NockHash([1; 32]), empty_tx())]),
    };
    let (_, state) = dispatch(state, Cause::NockchainBlock(first));

    let second = NockBlockInput {
        version: TxVersion::V1,
        height: 1,
        prev: state.hash_state.last_nock_block,
        tx_ids: vec![NockHash([2; 32])],
        txs: BTreeMap::from([(NockHash([2; 32]), empty_tx())]),
    };
    let (_, state) = dispatch(state, Cause::NockchainBlock(second));

    let pre_third = state.clone();
    let third = NockBlockInput {
        version: TxVersion::V1,
        height: 2,
        prev: NockHash([0xFF; 32]), // does not match hash(second)
        tx_ids: vec![NockHash([3; 32])],
        txs: BTreeMap::from([(NockHash([3; 32]), empty_tx())]),
    };
    let (effects, new_state) = dispatch(state, Cause::NockchainBlock(third));

    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::Stop { .. }));
    assert_eq!(
        new_state.hash_state.nock_next_height,
        pre_third.hash_state.nock_next_height
    );
    assert_eq!(new_state.hash_state.last_nock_block, pre_third.hash_state.last_nock_block);
}

#[test]
fn scenario_6_withdrawal_tx_is_fatal() {
    let lock_root = NockHash([0xAA; 32]);
    let state = genesis_state(lock_root);
    let tx = NockTx {
        version: TxVersion::V1,
        inputs: vec![bridge_kernel::types::TxInput {
            spent_name: Name {
                first: lock_root,
                last: NockHash([1; 32]),
            },
        }],
        outputs: vec![TxOutput {
            name: name(3),
            assets: 1,
            note_data: NoteData {
                bridge: None,
                ba_blk: Some(vec![1]),
                ba_eid: Some(vec![2]),
            },
        }],
    };
    let tx_id = NockHash([9; 32]);
    let input = NockBlockInput {
        version: TxVersion::V1,
        height: 0,
        prev: NockHash::default(),
        tx_ids: vec![tx_id],
        txs: BTreeMap::from([(tx_id, tx)]),
    };

    let pre = state.clone();
    let (effects, new_state) = dispatch(state, Cause::NockchainBlock(input));

    assert_eq!(effects.len(), 1);
    assert!(matches!(effects[0], Effect::Stop { .. }));
    assert_eq!(
        new_state.hash_state.nock_next_height,
        pre.hash_state.nock_next_height
    );
}

#[test]
fn rejected_cause_never_partially_mutates_state() {
    let state = genesis_state(NockHash([0xAA; 32]));
    let pre = state.clone();
    // Height far above next_nonce's expectations -> NockHeightMismatch.
    let input = NockBlockInput {
        version: TxVersion::V1,
        height: 99,
        prev: NockHash::default(),
        tx_ids: vec![],
        txs: BTreeMap::new(),
    };
    let (effects, new_state) = dispatch(state, Cause::NockchainBlock(input));
    assert_eq!(effects.len(), 1);
    assert_eq!(
        new_state.hash_state.nock_next_height,
        pre.hash_state.nock_next_height
    );
    assert_eq!(new_state.hash_state.nock_hashchain.len(), pre.hash_state.nock_hashchain.len());
}
