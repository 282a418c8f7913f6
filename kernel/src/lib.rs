//! `bridge-kernel`: the deterministic coordination kernel for the
//! Nock<->Base federated bridge. Pure `(Cause, BridgeState) ->
//! (Vec<Effect>, BridgeState)`; no I/O, no interior mutability, no
//! asynchronous waiting. Everything a host driver needs to wire the
//! kernel to real chains — config loading, persistence, networking,
//! metrics — lives in `bridge-kernel-host`.

pub mod base;
pub mod based_list;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod hashable;
pub mod ledger;
pub mod nock;
pub mod rotator;
pub mod state;
pub mod types;

pub use dispatcher::dispatch;
pub use error::KernelFault;
pub use state::BridgeState;
pub use types::{Cause, Effect};
