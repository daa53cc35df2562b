use tracing::{debug, trace};

use crate::{
    error::Result,
    math::Set,
    model::StateId,
    operations::copy_events,
    store::{Automaton, StorePaths, TempContext},
};

impl Automaton {
    /// Builds the accessible part of the automaton, i.e. all states that can be reached from the
    /// initial state together with the transitions between them. Special transitions are kept if
    /// both of their endpoints are reachable. Returns `None` if no initial state is set.
    pub fn accessible(&self, paths: StorePaths) -> Result<Option<Automaton>> {
        let Some(initial) = self.initial_state() else {
            return Ok(None);
        };
        let mut result = Automaton::create(paths, self.config())?;
        copy_events(self, &mut result)?;

        let mut visited: Set<StateId> = Set::default();
        visited.insert(initial);
        let mut stack = vec![initial];
        while let Some(id) = stack.pop() {
            let Some(state) = self.get_state(id)? else {
                trace!("transition into missing state {id}");
                continue;
            };
            for t in state.transitions() {
                if visited.insert(t.target) {
                    stack.push(t.target);
                }
            }
            let (label, marked, transitions) = state.into_parts();
            result.add_state_at(&label, marked, &transitions, id == initial, id)?;
        }

        result.replace_special_transitions(
            self.special_transitions()
                .restricted_to(|q| visited.contains(&q)),
        );
        result.renumber_states()?;
        result.write_header()?;
        debug!(
            "accessible part has {} of {} states",
            result.n_states(),
            self.n_states()
        );
        Ok(Some(result))
    }

    /// Builds the co-accessible part of the automaton, i.e. all states from which a marked state
    /// can be reached. A transition is kept if both of its endpoints are co-accessible. The
    /// predecessors are found through an inverted copy that lives in `ctx`.
    pub fn coaccessible(&self, paths: StorePaths, ctx: &mut TempContext) -> Result<Automaton> {
        let inverted = self.invert(ctx.next_paths()?)?;
        let mut visited: Set<StateId> = Set::default();
        let mut stack = vec![];
        for state in inverted.states_excluding_transitions()? {
            let state = state?;
            if state.is_marked() {
                visited.insert(state.id());
                stack.push(state.id());
            }
        }
        while let Some(id) = stack.pop() {
            let Some(state) = inverted.get_state(id)? else {
                continue;
            };
            for t in state.transitions() {
                if visited.insert(t.target) {
                    stack.push(t.target);
                }
            }
        }
        inverted.delete()?;

        let mut result = Automaton::create(paths, self.config())?;
        copy_events(self, &mut result)?;
        let mut ids: Vec<_> = visited.iter().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(state) = self.get_state(id)? else {
                continue;
            };
            let (label, marked, transitions) = state.into_parts();
            let kept: Vec<_> = transitions
                .into_iter()
                .filter(|t| visited.contains(&t.target))
                .collect();
            let initial = self.initial_state() == Some(id);
            result.add_state_at(&label, marked, &kept, initial, id)?;
        }

        result.replace_special_transitions(
            self.special_transitions()
                .restricted_to(|q| visited.contains(&q)),
        );
        result.renumber_states()?;
        result.write_header()?;
        debug!(
            "co-accessible part has {} of {} states",
            result.n_states(),
            self.n_states()
        );
        Ok(result)
    }

    /// The co-accessible part of the accessible part. Returns `None` if no initial state is set.
    pub fn trim(&self, paths: StorePaths, ctx: &mut TempContext) -> Result<Option<Automaton>> {
        let Some(accessible) = self.accessible(ctx.next_paths()?)? else {
            return Ok(None);
        };
        let trimmed = accessible.coaccessible(paths, ctx)?;
        accessible.delete()?;
        Ok(Some(trimmed))
    }
}
