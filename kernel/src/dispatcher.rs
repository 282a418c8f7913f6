//! Dispatcher (`spec.md` §4.6): gates every cause on `stop`/hold state,
//! routes to the per-cause advancer behind a fault barrier that converts
//! any propagated `KernelFault` — or an outright panic — into a `Stop`
//! effect, and answers read-only peek queries.

use std::panic::{self, AssertUnwindSafe};

use crate::base;
use crate::constants;
use crate::error::KernelFault;
use crate::nock;
use crate::state::BridgeState;
use crate::types::{Cause, Deposit, Effect, EvmAddr, Name, NockHash, SignatureRequest};

/// Process one cause to completion. Total: never panics, never leaves
/// `state` partially mutated by a failed handler.
pub fn dispatch(state: BridgeState, cause: Cause) -> (Vec<Effect>, BridgeState) {
    // `Start`/`Stop` bypass the stop/hold gates — otherwise a stopped
    // kernel could never be restarted by an operator-issued `Start`, and
    // an operator could never force a stop on a held kernel.
    match &cause {
        Cause::Start => {
            let mut state = state;
            if state.stop.is_some() {
                tracing::info!("clearing stop");
            }
            state.stop = None;
            return (vec![], state);
        }
        Cause::Stop(info) => {
            let mut state = state;
            state.stop = Some(*info);
            tracing::warn!("stop requested by driver");
            return (
                vec![Effect::Stop {
                    reason: "stop requested".into(),
                    last: *info,
                }],
                state,
            );
        }
        _ => {}
    }

    // Gate 1: already stopped — every other cause is a no-op.
    if state.stop.is_some() {
        tracing::debug!(cause = cause.name(), "dropping cause: kernel stopped");
        return (vec![], state);
    }

    // Gate 2: a hold is outstanding. This release treats holds as
    // unrecoverable once any further cause arrives.
    if state.hash_state.base_hold.is_some() || state.hash_state.nock_hold.is_some() {
        return fault_to_stop(state, cause.name(), "hold outstanding");
    }

    route(state, cause)
}

fn route(state: BridgeState, cause: Cause) -> (Vec<Effect>, BridgeState) {
    let cause_name = cause.name();
    let fallback = state.clone();

    match panic::catch_unwind(AssertUnwindSafe(|| handle(state, cause))) {
        Ok(Ok(ok)) => ok,
        Ok(Err(fault)) => fault_to_stop(fallback, cause_name, &fault.to_string()),
        Err(_) => fault_to_stop(fallback, cause_name, "panic during cause handling"),
    }
}

fn handle(state: BridgeState, cause: Cause) -> Result<(Vec<Effect>, BridgeState), KernelFault> {
    match cause {
        Cause::CfgLoad(cfg) => Ok(cfg_load(state, cfg)),
        Cause::SetConstants(new) => Ok(constants::apply(state, &new)),
        Cause::NockchainBlock(input) => nock::advance(state, &input),
        Cause::BaseBlocks(batch) => base::advance(state, &batch),
        Cause::ProposedBaseCall(requests) => proposed_base_call(state, &requests),
        Cause::ProposedNockTx(_) => Err(KernelFault::ProposedNockTxRejected),
        Cause::Start | Cause::Stop(_) => unreachable!("handled before gating"),
    }
}

fn cfg_load(mut state: BridgeState, cfg: Option<crate::types::NodeConfig>) -> (Vec<Effect>, BridgeState) {
    if let Some(cfg) = cfg {
        state.config = cfg;
    }
    (vec![], state)
}

/// `spec.md` §4.6.1. Every request in the list must pass all three checks
/// or the whole handler rolls back — no partial moves.
fn proposed_base_call(
    mut state: BridgeState,
    requests: &[SignatureRequest],
) -> Result<(Vec<Effect>, BridgeState), KernelFault> {
    for req in requests {
        if req.nonce >= state.next_nonce {
            return Err(KernelFault::ProposalNonceTooHigh);
        }
        // Checked before absence-from-unsettled: the ledger invariant
        // (never in both quadrants, never in neither) means a deposit
        // already moved to unconfirmed-settled is always also absent from
        // unsettled, so testing absence first would mask every genuine
        // double proposal behind the wrong fault.
        if state
            .hash_state
            .unconfirmed_settled_deposits
            .has(&req.as_of, &req.name)
        {
            return Err(KernelFault::DoubleProposal);
        }
        if !state.hash_state.unsettled_deposits.has(&req.as_of, &req.name) {
            return Err(KernelFault::ProposalDepositAbsent);
        }
        let deposit = state
            .hash_state
            .unsettled_deposits
            .del(&req.as_of, &req.name)
            .expect("presence just checked above");
        state
            .hash_state
            .unconfirmed_settled_deposits
            .put(req.as_of, req.name, deposit);
    }
    Ok((vec![], state))
}

fn fault_to_stop(mut state: BridgeState, cause_name: &str, reason: &str) -> (Vec<Effect>, BridgeState) {
    let last = state.stop_info();
    let reason = format!("{cause_name}: {reason}");
    tracing::error!(cause = cause_name, %reason, "cause hit fault barrier");
    state.stop = Some(last);
    (vec![Effect::Stop { reason, last }], state)
}

// ---------------------------------------------------------------------
// Read-only peeks (`spec.md` §4.6.3) — never mutate `state`.
// ---------------------------------------------------------------------

/// Vet a peer's proposed deposit before signing it.
///
/// - `Some(false)` — already confirmed (double proposal) or a hard
///   mismatch; the driver should treat this as a stop-signal.
/// - `None` — not found in either ledger quadrant; this node is still
///   syncing and cannot vouch either way.
/// - `Some(true)` — matches the unsettled entry on `dest`, `amount`, and
///   `tx_id`.
pub fn proposed_deposit(
    state: &BridgeState,
    tx_id: NockHash,
    nock_hash: NockHash,
    name: Name,
    receiver: EvmAddr,
    amount: u128,
    nonce: u64,
) -> Option<bool> {
    if state
        .hash_state
        .unconfirmed_settled_deposits
        .has(&nock_hash, &name)
    {
        return Some(false);
    }
    let deposit: &Deposit = state.hash_state.unsettled_deposits.get(&nock_hash, &name)?;
    if nonce >= state.next_nonce {
        return Some(false);
    }
    let matches =
        deposit.dest == Some(receiver) && deposit.amount_to_mint == amount && deposit.tx_id == tx_id;
    Some(matches)
}

/// Whether `base_hold`'s target has landed on the Base hashchain (`None`
/// if no hold is outstanding).
pub fn base_hold_satisfied(state: &BridgeState) -> Option<bool> {
    state
        .hash_state
        .base_hold
        .map(|h| state.hash_state.nock_hashchain.contains_key(&h.hash))
}

/// Whether `nock_hold`'s target has landed on the Nock hashchain (`None`
/// if no hold is outstanding).
pub fn nock_hold_satisfied(state: &BridgeState) -> Option<bool> {
    state
        .hash_state
        .nock_hold
        .map(|h| state.hash_state.base_hashchain.contains_key(&h.hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BridgeState;
    use crate::types::{BridgeConstants, Deposit};

    fn name(tag: u8) -> Name {
        Name {
            first: NockHash([tag; 32]),
            last: NockHash([tag.wrapping_add(1); 32]),
        }
    }

    #[test]
    fn start_clears_stop_even_while_held() {
        let mut state = BridgeState::genesis(Default::default(), Default::default());
        state.stop = Some(state.stop_info());
        state.hash_state.base_hold = Some(crate::types::Hold {
            hash: NockHash([1; 32]),
            height: 1,
        });
        let (effects, new_state) = dispatch(state, Cause::Start);
        assert!(effects.is_empty());
        assert!(new_state.stop.is_none());
    }

    #[test]
    fn stopped_kernel_drops_other_causes() {
        let mut state = BridgeState::genesis(Default::default(), Default::default());
        state.stop = Some(state.stop_info());
        let (effects, new_state) = dispatch(state.clone(), Cause::SetConstants(BridgeConstants::default()));
        assert!(effects.is_empty());
        assert_eq!(new_state.constants, state.constants);
    }

    #[test]
    fn outstanding_hold_converts_any_cause_to_stop() {
        let mut state = BridgeState::genesis(Default::default(), Default::default());
        state.hash_state.nock_hold = Some(crate::types::Hold {
            hash: crate::types::BaseHash::default(),
            height: 0,
        });
        let (effects, new_state) = dispatch(state, Cause::SetConstants(BridgeConstants::default()));
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::Stop { .. }));
        assert!(new_state.stop.is_some());
    }

    #[test]
    fn proposed_base_call_rolls_back_on_second_item_failure() {
        let mut state = BridgeState::genesis(Default::default(), Default::default());
        state.next_nonce = 5;
        let good_name = name(1);
        let deposit = Deposit {
            tx_id: NockHash([1; 32]),
            name: good_name,
            dest: Some(EvmAddr([1; 20])),
            amount_to_mint: 10,
            fee: 1,
        };
        let as_of = NockHash([9; 32]);
        state
            .hash_state
            .unsettled_deposits
            .put(as_of, good_name, deposit.clone());

        let good_request = SignatureRequest {
            tx_id: deposit.tx_id,
            name: good_name,
            recipient: EvmAddr([1; 20]),
            amount: 10,
            block_height: 1,
            as_of,
            nonce: 4,
        };
        let bad_request = SignatureRequest {
            nonce: 100, // >= next_nonce, fatal
            ..good_request
        };

        let (effects, new_state) =
            dispatch(state.clone(), Cause::ProposedBaseCall(vec![good_request, bad_request]));
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::Stop { .. }));
        // rolled back: the first (valid) item's move must not have stuck.
        assert!(new_state.hash_state.unsettled_deposits.has(&as_of, &good_name));
        assert!(!new_state
            .hash_state
            .unconfirmed_settled_deposits
            .has(&as_of, &good_name));
    }

    #[test]
    fn peek_proposed_deposit_three_way() {
        let mut state = BridgeState::genesis(Default::default(), Default::default());
        state.next_nonce = 5;
        let n = name(2);
        let as_of = NockHash([3; 32]);
        let deposit = Deposit {
            tx_id: NockHash([4; 32]),
            name: n,
            dest: Some(EvmAddr([5; 20])),
            amount_to_mint: 100,
            fee: 1,
        };
        state.hash_state.unsettled_deposits.put(as_of, n, deposit.clone());

        assert_eq!(
            proposed_deposit(&state, deposit.tx_id, as_of, n, EvmAddr([5; 20]), 100, 0),
            Some(true)
        );
        assert_eq!(
            proposed_deposit(&state, deposit.tx_id, as_of, n, EvmAddr([0xFF; 20]), 100, 0),
            Some(false)
        );
        let other = name(3);
        assert_eq!(
            proposed_deposit(&state, deposit.tx_id, as_of, other, EvmAddr([5; 20]), 100, 0),
            None
        );

        state.hash_state.unsettled_deposits.del(&as_of, &n);
        state
            .hash_state
            .unconfirmed_settled_deposits
            .put(as_of, n, deposit.clone());
        assert_eq!(
            proposed_deposit(&state, deposit.tx_id, as_of, n, EvmAddr([5; 20]), 100, 0),
            Some(false)
        );
    }

    #[test]
    fn proposed_nock_tx_is_always_rejected() {
        let state = BridgeState::genesis(Default::default(), Default::default());
        let (effects, new_state) = dispatch(state, Cause::ProposedNockTx(vec![1, 2, 3]));
        assert_eq!(effects.len(), 1);
        assert!(new_state.stop.is_some());
    }
}
