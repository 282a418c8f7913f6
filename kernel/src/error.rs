//! Kernel fault taxonomy.
//!
//! Every variant here corresponds to a row in the error taxonomy table: once
//! raised, a fault is converted by the dispatcher's fault barrier into a
//! terminal `Stop` effect. No variant is ever caught and recovered inside the
//! kernel — only an operator-issued `%start` cause clears `BridgeState::stop`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelFault {
    // --- Driver malfunction ---
    #[error("tx-ids mismatch")]
    TxIdsMismatch,
    #[error("received block with height not equal to next height")]
    NockHeightMismatch,
    #[error("base batch height span does not match configured chunk size")]
    BaseChunkSizeMismatch,
    #[error("received base batch with first height not equal to next height")]
    BaseHeightMismatch,
    #[error("base batch parent pointer mismatch")]
    BaseParentMismatch,
    #[error("base batch heights are not contiguous")]
    BaseHeightsNotContiguous,

    // --- Reorg ---
    #[error("hashchain reorg")]
    NockReorg,

    // --- Policy violation ---
    #[error("fatal: withdrawal tx detected")]
    WithdrawalTxDetected,
    #[error("withdrawal settlement detected but withdrawals are not permitted")]
    WithdrawalSettlementDetected,
    #[error("bridge node updated event is not yet implemented")]
    BridgeNodeUpdatedUnsupported,
    #[error("proposed nock tx is not supported; withdrawal gate closed")]
    ProposedNockTxRejected,

    // --- Proposal malfeasance ---
    #[error("nonce in proposed base call is greater than or equal to next-nonce")]
    ProposalNonceTooHigh,
    #[error("proposed deposit not in unsettled-deposits")]
    ProposalDepositAbsent,
    #[error("encountered double proposal for an already-confirmed deposit")]
    DoubleProposal,

    // --- Settlement malfeasance ---
    #[error("nonce in deposit settlement is not less than next nonce")]
    SettlementNonceTooHigh,
    #[error("deposit referenced by settlement is absent from the ledger")]
    SettlementDepositAbsent,
    #[error("deposit settlement amount or destination mismatch")]
    SettlementMismatch,

    // --- Internal invariant failure ---
    #[error("internal invariant failure: {0}")]
    InvariantFailure(String),
}
