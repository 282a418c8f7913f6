//! Admin-submitted constants validation (`spec.md` §4.6.2).

use crate::state::BridgeState;
use crate::types::{BridgeConstants, Effect};

/// Accepts iff `version == 0`, `1 <= min_signers <= total_signers`,
/// `minimum_event_nocks > 0`, and `base_blocks_chunk > 0`. A rejected update
/// is a soft no-op — admin-supplied parameters failing validation are not a
/// chain-protocol violation, so this never raises a `Stop`
/// ([open question resolution, see `DESIGN.md`]).
pub fn apply(mut state: BridgeState, new: &BridgeConstants) -> (Vec<Effect>, BridgeState) {
    let valid = new.version == 0
        && new.min_signers >= 1
        && new.min_signers <= new.total_signers
        && new.minimum_event_nocks > 0
        && new.base_blocks_chunk > 0;

    if !valid {
        tracing::warn!(?new, "rejected invalid constants update");
        return (vec![], state);
    }

    let old = state.constants;
    // Rebase start heights only if the bridge has not yet begun processing.
    if state.hash_state.nock_next_height == old.nockchain_start_height {
        state.hash_state.nock_next_height = new.nockchain_start_height;
    }
    if state.hash_state.base_next_height == old.base_start_height {
        state.hash_state.base_next_height = new.base_start_height;
    }
    state.constants = *new;
    tracing::info!(?new, "accepted constants update");
    (vec![], state)
}
