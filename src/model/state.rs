use crate::model::{EventId, StateId};

/// An outgoing transition of a [`State`], consisting of the event and the id of the target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition {
    /// Id of the event that labels the transition.
    pub event: EventId,
    /// Id of the state the transition leads to.
    pub target: StateId,
}

impl Transition {
    /// Creates a new transition.
    pub fn new(event: EventId, target: StateId) -> Self {
        Self { event, target }
    }
}

/// A state of an automaton together with its outgoing transitions.
///
/// The store does not deduplicate transitions, adding the same transition twice results
/// in two identical entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    id: StateId,
    label: String,
    marked: bool,
    transitions: Vec<Transition>,
}

impl State {
    /// Creates a state without outgoing transitions.
    pub fn new(id: StateId, label: impl Into<String>, marked: bool) -> Self {
        Self::with_transitions(id, label, marked, vec![])
    }

    /// Creates a state with the given outgoing transitions.
    pub fn with_transitions(
        id: StateId,
        label: impl Into<String>,
        marked: bool,
        transitions: Vec<Transition>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            marked,
            transitions,
        }
    }

    /// The id of the state.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// The label of the state.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the state is marked.
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// The outgoing transitions in the order in which they are stored.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Number of outgoing transitions.
    pub fn number_of_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Iterates over the outgoing transitions labelled with `event`.
    pub fn transitions_on(&self, event: EventId) -> impl Iterator<Item = &Transition> + '_ {
        self.transitions.iter().filter(move |t| t.event == event)
    }

    /// Whether at least one outgoing transition is labelled with `event`.
    pub fn has_transition_on(&self, event: EventId) -> bool {
        self.transitions.iter().any(|t| t.event == event)
    }

    pub(crate) fn transitions_mut(&mut self) -> &mut Vec<Transition> {
        &mut self.transitions
    }

    /// Decomposes the state into its label, marking and transitions.
    pub fn into_parts(self) -> (String, bool, Vec<Transition>) {
        (self.label, self.marked, self.transitions)
    }
}
