//! Bijective combination of several state ids into one.
//!
//! Product constructions address their states through these functions, which means the
//! id of a product state can be computed directly from its components without maintaining
//! a separate lookup table. All combinations are checked for overflow.

use crate::{
    error::{AutomatonError, Result},
    model::StateId,
};

fn modulus(max_id: StateId) -> Result<u64> {
    max_id
        .checked_add(1)
        .ok_or(AutomatonError::CombinedIdOverflow)
}

/// Combines a tuple of ids, each at most `max_id`, into a single id using a mixed radix encoding
/// with modulus `max_id + 1`. The first id is the most significant digit.
///
/// Fails if one of the ids exceeds `max_id` or if the result does not fit into 64 bits.
pub fn combine_ids(ids: &[StateId], max_id: StateId) -> Result<StateId> {
    let m = modulus(max_id)?;
    ids.iter().try_fold(0u64, |acc, &id| {
        if id > max_id {
            return Err(AutomatonError::InvalidStateId(id));
        }
        acc.checked_mul(m)
            .and_then(|shifted| shifted.checked_add(id))
            .ok_or(AutomatonError::CombinedIdOverflow)
    })
}

/// Inverse of [`combine_ids`], returns the digits most significant first. Leading zero digits are
/// not reproduced, which is unproblematic as valid state ids are never zero.
pub fn separate_ids(mut combined: StateId, max_id: StateId) -> Vec<StateId> {
    let Some(m) = max_id.checked_add(1) else {
        return vec![combined];
    };
    let mut ids = Vec::new();
    while combined != 0 {
        ids.push(combined % m);
        combined /= m;
    }
    ids.reverse();
    ids
}

/// Returns the largest id [`combine_ids`] can produce for `n` components bounded by `max_id`.
pub fn max_combined_id(n: usize, max_id: StateId) -> Result<StateId> {
    combine_ids(&vec![max_id; n], max_id)
}

/// Combines two ids by row/column addressing: `(id2 - 1) * n1 + id1`, where `n1` is the number of
/// states of the automaton `id1` belongs to.
pub fn combine_two_ids(id1: StateId, n1: u64, id2: StateId) -> Result<StateId> {
    if id1 == 0 || id1 > n1 {
        return Err(AutomatonError::InvalidStateId(id1));
    }
    if id2 == 0 {
        return Err(AutomatonError::InvalidStateId(id2));
    }
    (id2 - 1)
        .checked_mul(n1)
        .and_then(|row| row.checked_add(id1))
        .ok_or(AutomatonError::CombinedIdOverflow)
}

/// Inverse of [`combine_two_ids`].
pub fn separate_two_ids(combined: StateId, n1: u64) -> (StateId, StateId) {
    debug_assert!(combined > 0 && n1 > 0);
    ((combined - 1) % n1 + 1, (combined - 1) / n1 + 1)
}
