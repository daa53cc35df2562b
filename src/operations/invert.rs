use tracing::debug;

use crate::{
    error::Result,
    math::Map,
    model::StateId,
    operations::copy_events,
    store::{Automaton, SpecialTransitions, StorePaths},
};

impl Automaton {
    /// Builds the automaton with every transition reversed. States keep their ids, labels and
    /// markings. Special transitions refer to forward transitions, so the result carries none.
    pub fn invert(&self, paths: StorePaths) -> Result<Automaton> {
        let mut in_degree: Map<StateId, u32> = Map::default();
        for state in self.states()? {
            for t in state?.transitions() {
                *in_degree.entry(t.target).or_default() += 1;
            }
        }
        let needed = in_degree.values().copied().max().unwrap_or(1);
        let mut result =
            Automaton::create(paths, self.config().with_transition_capacity(needed))?;
        copy_events(self, &mut result)?;

        for state in self.states_excluding_transitions()? {
            let state = state?;
            let initial = self.initial_state() == Some(state.id());
            result.add_state_at(state.label(), state.is_marked(), &[], initial, state.id())?;
        }
        let mut reversed = 0u64;
        for state in self.states()? {
            let state = state?;
            for t in state.transitions() {
                if result.state_exists(t.target)? {
                    result.add_transition(t.target, t.event, state.id())?;
                    reversed += 1;
                }
            }
        }
        result.replace_special_transitions(SpecialTransitions::default());
        result.write_header()?;
        debug!("inverted {reversed} transitions");
        Ok(result)
    }
}
