use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::{
    error::{AutomatonError, Result},
    id::combine_two_ids,
    math::{Map, Set},
    model::{EventId, StateId, Transition, TransitionData},
    store::{Automaton, AutomatonConfig, StorePaths},
};

/// How a product treats the events that only one of its components knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrivateEvents {
    /// Dropped, only shared events survive.
    Drop,
    /// Interleaved, the other component stays where it is.
    Interleave,
}

/// Fails if the two automata cannot be combined.
fn check_compatible(left: &Automaton, right: &Automaton) -> Result<()> {
    if left.n_controllers() != right.n_controllers() {
        return Err(AutomatonError::IncompatibleControllers {
            left: left.n_controllers(),
            right: right.n_controllers(),
        });
    }
    for event in left.events() {
        if let Some(other) = right.event_by_label(event.label()) {
            if !event.same_properties(other) {
                return Err(AutomatonError::IncompatibleEvent(event.label().to_string()));
            }
        }
    }
    Ok(())
}

impl Automaton {
    /// Builds the synchronous product of `self` and `other` over their shared events. Only pairs
    /// of states reachable from the pair of initial states are explored. A product state is
    /// marked if both components are, a product transition is bad if both component transitions
    /// are bad.
    ///
    /// Fails before anything is written if the automata have different numbers of controllers or
    /// if an event occurs in both with different observability or controllability. If one of the
    /// automata has no initial state the result has no states.
    pub fn intersection(&self, other: &Automaton, paths: StorePaths) -> Result<Automaton> {
        check_compatible(self, other)?;
        self.product(other, paths, PrivateEvents::Drop)
    }

    /// Builds the parallel composition of `self` and `other`: shared events synchronize, events
    /// known to only one of the automata interleave. A product state is marked if both components
    /// are, a product transition is bad if a participating component transition is bad.
    ///
    /// Fails under the same conditions as [`Automaton::intersection`].
    pub fn union(&self, other: &Automaton, paths: StorePaths) -> Result<Automaton> {
        check_compatible(self, other)?;
        self.product(other, paths, PrivateEvents::Interleave)
    }

    fn product(
        &self,
        other: &Automaton,
        paths: StorePaths,
        private: PrivateEvents,
    ) -> Result<Automaton> {
        let config = AutomatonConfig::default()
            .with_controllers(self.n_controllers())
            .with_event_capacity(self.capacities().events.max(other.capacities().events))
            .with_transition_capacity(
                self.capacities()
                    .transitions
                    .max(other.capacities().transitions),
            );
        let mut result = Automaton::create(paths, config)?;

        // event ids of both components mapped to ids of the result
        let mut left_events: Map<EventId, EventId> = Map::default();
        let mut right_events: Map<EventId, EventId> = Map::default();
        let mut shared: Set<EventId> = Set::default();
        for event in self.events() {
            let counterpart = other.event_by_label(event.label());
            if counterpart.is_none() && private == PrivateEvents::Drop {
                continue;
            }
            let id = result.add_event(event.label(), event.observable(), event.controllable())?;
            left_events.insert(event.id(), id);
            if let Some(counterpart) = counterpart {
                right_events.insert(counterpart.id(), id);
                shared.insert(id);
            }
        }
        if private == PrivateEvents::Interleave {
            for event in other.events() {
                if self.event_by_label(event.label()).is_none() {
                    let id =
                        result.add_event(event.label(), event.observable(), event.controllable())?;
                    right_events.insert(event.id(), id);
                }
            }
        }

        let (Some(left_initial), Some(right_initial)) =
            (self.initial_state(), other.initial_state())
        else {
            result.write_header()?;
            return Ok(result);
        };

        let n1 = self.highest_state_id()?.max(1);
        let combine = |q1: StateId, q2: StateId| combine_two_ids(q1, n1, q2);
        let start = combine(left_initial, right_initial)?;
        let mut seen: Set<StateId> = Set::default();
        seen.insert(start);
        let mut stack = vec![(left_initial, right_initial)];
        let mut bad = BTreeSet::new();

        while let Some((q1, q2)) = stack.pop() {
            let (Some(s1), Some(s2)) = (self.get_state(q1)?, other.get_state(q2)?) else {
                continue;
            };
            let id = combine(q1, q2)?;
            let mut transitions = vec![];
            let mut successor = |event: EventId, t1: StateId, t2: StateId, is_bad: bool| {
                let target = combine(t1, t2)?;
                transitions.push(Transition::new(event, target));
                if is_bad {
                    bad.insert(TransitionData::new(id, event, target));
                }
                if seen.insert(target) {
                    stack.push((t1, t2));
                }
                Ok::<_, AutomatonError>(())
            };

            for l in s1.transitions() {
                let Some(&event) = left_events.get(&l.event) else {
                    continue;
                };
                let l_bad = self.is_bad_transition(q1, l.event, l.target);
                if shared.contains(&event) {
                    for r in s2.transitions() {
                        if right_events.get(&r.event) != Some(&event) {
                            continue;
                        }
                        let r_bad = other.is_bad_transition(q2, r.event, r.target);
                        let is_bad = match private {
                            PrivateEvents::Drop => l_bad && r_bad,
                            PrivateEvents::Interleave => l_bad || r_bad,
                        };
                        successor(event, l.target, r.target, is_bad)?;
                    }
                } else {
                    successor(event, l.target, q2, l_bad)?;
                }
            }
            if private == PrivateEvents::Interleave {
                for r in s2.transitions() {
                    let Some(&event) = right_events.get(&r.event) else {
                        continue;
                    };
                    if !shared.contains(&event) {
                        let r_bad = other.is_bad_transition(q2, r.event, r.target);
                        successor(event, q1, r.target, r_bad)?;
                    }
                }
            }

            trace!("product state {id} = ({q1}, {q2})");
            let label = format!("{}_{}", s1.label(), s2.label());
            result.add_state_at(
                &label,
                s1.is_marked() && s2.is_marked(),
                &transitions,
                id == start,
                id,
            )?;
        }

        let mut specials = result.special_transitions().clone();
        specials.bad = bad;
        result.replace_special_transitions(specials);
        result.renumber_states()?;
        result.write_header()?;
        debug!(
            "product of {} and {} states has {} states",
            self.n_states(),
            other.n_states(),
            result.n_states()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::{prelude::*, tests::bad_transition_plant};

    /// 1 -a-> 2 -c-> 1, 2 marked
    fn with_private_event(ctx: &mut TempContext) -> Automaton {
        let mut automaton = Automaton::create_temporary(ctx, AutomatonConfig::default()).unwrap();
        let a = automaton.add_event("a", &[true], &[false]).unwrap();
        let c = automaton.add_event("c", &[false], &[true]).unwrap();
        let q1 = automaton.add_state("x", false, true).unwrap();
        let q2 = automaton.add_state("y", true, false).unwrap();
        automaton.add_transition(q1, a, q2).unwrap();
        automaton.add_transition(q2, c, q1).unwrap();
        automaton
    }

    #[test_log::test]
    fn intersection_keeps_shared_events() {
        let mut ctx = TempContext::new();
        let left = bad_transition_plant(&mut ctx);
        let right = with_private_event(&mut ctx);
        let product = left.intersection(&right, ctx.next_paths().unwrap()).unwrap();
        let labels = product.events().iter().map(|e| e.label()).collect_vec();
        assert_eq!(labels, vec!["a"]);
        assert_eq!(product.n_states(), 2);
        assert!(product.generates(&["a"]).unwrap());
        assert!(!product.generates(&["a", "a"]).unwrap());
        let target = product.get_state(2).unwrap().unwrap();
        assert_eq!(target.label(), "2_y");
        assert!(target.is_marked());
    }

    #[test]
    fn incompatible_events_are_rejected() {
        let mut ctx = TempContext::new();
        let left = bad_transition_plant(&mut ctx);
        let mut right = Automaton::create_temporary(&mut ctx, AutomatonConfig::default()).unwrap();
        right.add_event("a", &[false], &[false]).unwrap();
        let paths = ctx.next_paths().unwrap();
        assert!(matches!(
            left.intersection(&right, paths.clone()),
            Err(AutomatonError::IncompatibleEvent(_))
        ));
        assert!(matches!(
            left.union(&right, paths.clone()),
            Err(AutomatonError::IncompatibleEvent(_))
        ));
        assert!(!paths.header.exists());

        let two = Automaton::create_temporary(
            &mut ctx,
            AutomatonConfig::default().with_controllers(2),
        )
        .unwrap();
        assert!(matches!(
            left.union(&two, paths),
            Err(AutomatonError::IncompatibleControllers { left: 1, right: 2 })
        ));
    }

    #[test_log::test]
    fn union_interleaves_private_events() {
        let mut ctx = TempContext::new();
        let left = bad_transition_plant(&mut ctx);
        let right = with_private_event(&mut ctx);
        let product = left.union(&right, ctx.next_paths().unwrap()).unwrap();
        assert_eq!(product.n_events(), 3);
        assert!(product.generates(&["a", "o", "c"]).unwrap());
        assert!(product.generates(&["a", "c", "o"]).unwrap());
        assert!(!product.generates(&["c"]).unwrap());
        // the bad transition of the left component survives in every interleaving
        assert_eq!(product.special_transitions().bad.len(), 2);
    }

    #[test]
    fn union_is_commutative() {
        let mut ctx = TempContext::new();
        let left = bad_transition_plant(&mut ctx);
        let right = with_private_event(&mut ctx);
        let lr = left.union(&right, ctx.next_paths().unwrap()).unwrap();
        let rl = right.union(&left, ctx.next_paths().unwrap()).unwrap();
        assert_eq!(lr.n_states(), rl.n_states());
        assert_eq!(lr.n_transitions().unwrap(), rl.n_transitions().unwrap());
        let alphabet = ["a", "o", "c"];
        for len in 0..=4 {
            for word in std::iter::repeat(alphabet.iter().copied())
                .take(len)
                .multi_cartesian_product()
            {
                assert_eq!(
                    lr.generates(&word).unwrap(),
                    rl.generates(&word).unwrap(),
                    "{word:?}"
                );
            }
        }
    }
}
