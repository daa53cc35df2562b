use tracing::debug;

use crate::{
    capacity::{Capacities, Layout},
    error::Result,
    math::Bijection,
    model::StateId,
    store::Automaton,
};

impl Automaton {
    /// Renumbers the states so that their ids are exactly `1..=n_states`, preserving the relative
    /// order of the ids. Transition targets, the initial state and the special transitions are
    /// translated accordingly and the state capacity is shrunk to the smallest one fitting all
    /// states. Returns the mapping from old to new ids.
    pub fn renumber_states(&mut self) -> Result<Bijection<StateId, StateId>> {
        let mut mapping = Bijection::new();
        let mut next = 1;
        for id in 1..=self.highest_state_id()? {
            if self.state_exists(id)? {
                mapping.insert(id, next);
                next += 1;
            }
        }
        let n = next - 1;

        let new = Layout::new(Capacities {
            states: n,
            ..self.layout.capacities()
        });
        let identity = mapping.iter().all(|(old, new)| old == new);
        if identity && new == self.layout {
            debug!("states already numbered densely");
            self.n_states = n;
            return Ok(mapping);
        }

        let old = self.layout;
        self.body.rebuild(&old, &new, Some(&mapping))?;
        self.layout = new;

        let translate = |q: StateId| mapping.get_by_left(&q).copied();
        self.specials = self.specials.remap_states(translate);
        self.initial_state = self.initial_state.and_then(translate);
        self.n_states = n;
        self.header_dirty = true;
        debug!("renumbered {n} states");
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test_log::test]
    fn holes_are_removed() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, AutomatonConfig::default()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        automaton
            .add_state_at("x", false, &[Transition::new(a, 70_000)], true, 300)
            .unwrap();
        automaton
            .add_state_at("y", true, &[Transition::new(a, 300)], false, 70_000)
            .unwrap();
        automaton.add_bad_transition(300, a, 70_000).unwrap();
        assert_eq!(automaton.capacities().states, 16_777_215);

        let mapping = automaton.renumber_states().unwrap();
        assert_eq!(mapping.get_by_left(&300), Some(&1));
        assert_eq!(mapping.get_by_left(&70_000), Some(&2));
        assert_eq!(automaton.capacities().states, 255);
        assert_eq!(automaton.initial_state(), Some(1));
        assert_eq!(automaton.state_ids().unwrap(), vec![1, 2]);
        assert_eq!(
            automaton.get_state(1).unwrap().unwrap().transitions(),
            &[Transition::new(a, 2)]
        );
        assert!(automaton.get_state(2).unwrap().unwrap().is_marked());
        assert!(automaton.is_bad_transition(1, a, 2));
        assert!(!automaton.is_bad_transition(300, a, 70_000));
    }

    #[test]
    fn dense_numbering_is_kept() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, AutomatonConfig::default()).unwrap();
        automaton.add_state("a", false, true).unwrap();
        automaton.add_state("b", false, false).unwrap();
        let mapping = automaton.renumber_states().unwrap();
        assert!(mapping.iter().all(|(l, r)| l == r));
        assert_eq!(automaton.n_states(), 2);
    }
}
