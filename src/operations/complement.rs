use bit_set::BitSet;
use tracing::debug;

use crate::{
    error::{AutomatonError, Result},
    model::Transition,
    operations::copy_events,
    store::{Automaton, StorePaths},
};

/// Label of the state that collects all transitions added by [`Automaton::complement`].
pub const DUMP_STATE_LABEL: &str = "Dump State";

impl Automaton {
    /// Builds the complement: every marking is toggled and every event that is undefined in a
    /// state leads into a shared dump state, which loops on all events. The dump state is only
    /// created if some state lacks a transition.
    ///
    /// Fails if a state is already labelled [`DUMP_STATE_LABEL`], as the automaton is then the
    /// result of an earlier complement.
    pub fn complement(&self, paths: StorePaths) -> Result<Automaton> {
        for state in self.states_excluding_transitions()? {
            if state?.label() == DUMP_STATE_LABEL {
                return Err(AutomatonError::OperationAlreadyApplied("complement"));
            }
        }

        let config = self.config();
        let transitions = config
            .capacities
            .transitions
            .max(self.n_events() as u32);
        let mut result =
            Automaton::create(paths, config.with_transition_capacity(transitions))?;
        copy_events(self, &mut result)?;

        let dump = self.highest_state_id()? + 1;
        let mut dump_needed = false;
        for state in self.states()? {
            let state = state?;
            let defined: BitSet = state
                .transitions()
                .iter()
                .map(|t| t.event as usize)
                .collect();
            let mut transitions = state.transitions().to_vec();
            for event in self.events() {
                if !defined.contains(event.id() as usize) {
                    transitions.push(Transition::new(event.id(), dump));
                    dump_needed = true;
                }
            }
            let initial = self.initial_state() == Some(state.id());
            result.add_state_at(
                state.label(),
                !state.is_marked(),
                &transitions,
                initial,
                state.id(),
            )?;
        }

        if dump_needed {
            let loops: Vec<_> = self
                .events()
                .iter()
                .map(|e| Transition::new(e.id(), dump))
                .collect();
            result.add_state_at(DUMP_STATE_LABEL, true, &loops, false, dump)?;
        }

        result.replace_special_transitions(self.special_transitions().clone());
        result.renumber_states()?;
        result.write_header()?;
        debug!(
            "complement has {} states, dump state {}",
            result.n_states(),
            if dump_needed { "added" } else { "not needed" }
        );
        Ok(result)
    }
}
