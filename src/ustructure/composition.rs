use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    error::{AutomatonError, Result},
    id::combine_ids,
    math::Set,
    model::{Event, EventId, LabelVector, State, StateId, Transition, TransitionData},
    store::{Automaton, AutomatonConfig, AutomatonKind, StorePaths},
};

/// How a transition of a U-Structure is tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Ordinary,
    /// The plant transition is bad and no controller able to disable the event does so.
    UnconditionalViolation,
    /// The plant transition is fine, but the controllers able to disable the event disagree
    /// about doing so.
    ConditionalViolation,
}

impl Classification {
    /// Classifies a transition from the number of controllers that control its event and the
    /// number of those that would disable it. Only counts enter, so the order in which the
    /// controllers are looked at does not matter.
    fn from_counts(plant_bad: bool, controlling: usize, disabling: usize) -> Self {
        debug_assert!(disabling <= controlling);
        if plant_bad {
            if disabling == 0 {
                Classification::UnconditionalViolation
            } else {
                Classification::Ordinary
            }
        } else if controlling >= 2 && disabling > 0 && disabling < controlling {
            Classification::ConditionalViolation
        } else {
            Classification::Ordinary
        }
    }
}

/// One way for a controller to follow a plant transition.
#[derive(Debug, Clone, Copy)]
struct Follow {
    target: StateId,
    observed: bool,
}

/// A transition leaving a tuple of the U-Structure.
#[derive(Debug, Clone)]
struct Successor {
    components: Vec<StateId>,
    vector: LabelVector,
    source: EventId,
    classification: Classification,
}

impl Automaton {
    /// Builds the U-Structure of this plain automaton in a new store at `paths`.
    ///
    /// Every state of the U-Structure is a tuple of one plant state and one state per controller,
    /// addressed through [`combine_ids`] with the plant's largest state id as bound. From a tuple,
    /// every plant transition is followed by each controller that observes its event, which
    /// requires a matching transition of that controller's component; a controller that does not
    /// observe it stays. Additionally, each controller may on its own take transitions on events
    /// it does not observe. Transitions are tagged as unconditional or conditional violations
    /// according to the bad transitions of the plant.
    ///
    /// Returns `None` if no initial state is set.
    pub fn synchronized_composition(&self, paths: StorePaths) -> Result<Option<Automaton>> {
        if self.kind() != AutomatonKind::Plain {
            return Err(AutomatonError::WrongKind {
                expected: AutomatonKind::Plain,
                found: self.kind(),
            });
        }
        let Some(initial) = self.initial_state() else {
            return Ok(None);
        };
        let n = self.n_controllers();
        let max_id = self.highest_state_id()?;
        let config = AutomatonConfig::default()
            .with_kind(AutomatonKind::UStructure)
            .with_controllers(n)
            .with_event_capacity(self.capacities().events);
        let mut result = Automaton::create(paths, config)?;

        let start_tuple = vec![initial; n + 1];
        let start = combine_ids(&start_tuple, max_id)?;
        let mut pushed: Set<StateId> = Set::default();
        pushed.insert(start);
        let mut stack = vec![start_tuple];

        while let Some(tuple) = stack.pop() {
            let id = combine_ids(&tuple, max_id)?;
            let states = tuple
                .iter()
                .map(|q| {
                    self.get_state(*q)
                        .and_then(|s| s.ok_or(AutomatonError::UnknownState(*q)))
                })
                .collect::<Result<Vec<_>>>()?;

            let successors = self.successors(&tuple, &states)?;
            let mut transitions = Vec::with_capacity(successors.len());
            for successor in successors {
                let target = combine_ids(&successor.components, max_id)?;
                let event = self.vector_event(&mut result, &successor)?;
                transitions.push(Transition::new(event, target));

                let data = TransitionData::new(id, event, target);
                match successor.classification {
                    Classification::Ordinary => {}
                    Classification::UnconditionalViolation => {
                        trace!("unconditional violation {data}");
                        result.add_unconditional_violation(data)?
                    }
                    Classification::ConditionalViolation => {
                        trace!("conditional violation {data}");
                        result.add_conditional_violation(data)?
                    }
                }
                if pushed.insert(target) {
                    stack.push(successor.components);
                }
            }

            let label = states.iter().map(|s| s.label()).join("_");
            result.add_state_at(&label, states[0].is_marked(), &transitions, id == start, id)?;
        }

        result.renumber_states()?;
        result.write_header()?;
        debug!(
            "U-Structure has {} states, {} unconditional and {} conditional violations",
            result.n_states(),
            result.special_transitions().unconditional_violations.len(),
            result.special_transitions().conditional_violations.len()
        );
        Ok(Some(result))
    }

    /// Adds (or looks up) the vector event of a successor in the U-Structure.
    fn vector_event(&self, ustructure: &mut Automaton, successor: &Successor) -> Result<EventId> {
        let source = self
            .event(successor.source)
            .ok_or_else(|| AutomatonError::UnknownEvent(successor.source.to_string()))?;
        let observable: Vec<_> = (0..self.n_controllers())
            .map(|c| successor.vector.participates(c + 1))
            .collect();
        Ok(ustructure
            .add_event_if_absent(
                &successor.vector.to_label(),
                &observable,
                source.controllable(),
            )?
            .id())
    }

    /// Computes all transitions leaving the tuple `tuple`, whose states are `states`.
    fn successors(&self, tuple: &[StateId], states: &[State]) -> Result<Vec<Successor>> {
        let n = tuple.len() - 1;
        let mut out = vec![];

        for t in states[0].transitions() {
            let Some(event) = self.event(t.event) else {
                return Err(AutomatonError::UnknownEvent(t.event.to_string()));
            };
            let plant_bad = self.is_bad_transition(tuple[0], t.event, t.target);

            let mut choices = Vec::with_capacity(n);
            for c in 0..n {
                if event.is_observable_by(c) {
                    let follows: Vec<_> = states[c + 1]
                        .transitions_on(t.event)
                        .map(|m| Follow {
                            target: m.target,
                            observed: true,
                        })
                        .collect();
                    if follows.is_empty() {
                        break;
                    }
                    choices.push(follows);
                } else {
                    choices.push(vec![Follow {
                        target: tuple[c + 1],
                        observed: false,
                    }]);
                }
            }
            if choices.len() < n {
                trace!("controller cannot follow {} from {:?}", event.label(), tuple);
                continue;
            }

            for combination in choices
                .into_iter()
                .map(Vec::into_iter)
                .multi_cartesian_product()
            {
                out.push(self.follow_plant(tuple, states, t, event, plant_bad, &combination));
            }
        }

        for c in 0..n {
            for m in states[c + 1].transitions() {
                let Some(event) = self.event(m.event) else {
                    return Err(AutomatonError::UnknownEvent(m.event.to_string()));
                };
                if event.is_observable_by(c) {
                    continue;
                }
                let mut components = tuple.to_vec();
                components[c + 1] = m.target;
                let mut slots = vec![None; n + 1];
                slots[c + 1] = Some(event.label().to_string());
                out.push(Successor {
                    components,
                    vector: LabelVector::new(slots),
                    source: m.event,
                    classification: Classification::Ordinary,
                });
            }
        }
        Ok(out)
    }

    fn follow_plant(
        &self,
        tuple: &[StateId],
        states: &[State],
        t: &Transition,
        event: &Event,
        plant_bad: bool,
        combination: &[Follow],
    ) -> Successor {
        let mut components = Vec::with_capacity(tuple.len());
        components.push(t.target);
        let mut slots = vec![Some(event.label().to_string())];
        let mut controlling = 0;
        let mut disabling = 0;
        for (c, follow) in combination.iter().enumerate() {
            components.push(follow.target);
            slots.push(follow.observed.then(|| event.label().to_string()));
            if !event.is_controllable_by(c) {
                continue;
            }
            controlling += 1;
            let own = tuple[c + 1];
            let disables = if follow.observed {
                self.is_bad_transition(own, t.event, follow.target)
            } else {
                states[c + 1]
                    .transitions_on(t.event)
                    .any(|m| self.is_bad_transition(own, t.event, m.target))
            };
            if disables {
                disabling += 1;
            }
        }
        Successor {
            components,
            vector: LabelVector::new(slots),
            source: t.event,
            classification: Classification::from_counts(plant_bad, controlling, disabling),
        }
    }
}
