use crate::model::{EventId, StateId};

/// Identifies a transition of an automaton as a whole, rather than as part of a state. Used as the
/// key for "special" transitions such as bad transitions or violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionData {
    /// Id of the state the transition originates in.
    pub initial_state: StateId,
    /// Id of the event.
    pub event: EventId,
    /// Id of the target state.
    pub target_state: StateId,
}

impl TransitionData {
    /// Creates a new transition triple.
    pub fn new(initial_state: StateId, event: EventId, target_state: StateId) -> Self {
        Self {
            initial_state,
            event,
            target_state,
        }
    }

    /// Applies `f` to both endpoints, returns `None` if `f` does so for either endpoint.
    pub fn map_states<F>(&self, mut f: F) -> Option<Self>
    where
        F: FnMut(StateId) -> Option<StateId>,
    {
        Some(Self {
            initial_state: f(self.initial_state)?,
            event: self.event,
            target_state: f(self.target_state)?,
        })
    }
}

impl std::fmt::Display for TransitionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.initial_state, self.event, self.target_state
        )
    }
}

/// The role a controller plays in a communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CommunicationRole {
    /// The controller does not take part.
    #[default]
    None,
    /// The controller sends the message.
    Sender,
    /// The controller receives the message.
    Receiver,
}

impl CommunicationRole {
    /// Encodes the role as the byte used in header files.
    pub fn to_byte(self) -> u8 {
        match self {
            CommunicationRole::None => 0,
            CommunicationRole::Sender => 1,
            CommunicationRole::Receiver => 2,
        }
    }

    /// Decodes a role from its header byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CommunicationRole::None),
            1 => Some(CommunicationRole::Sender),
            2 => Some(CommunicationRole::Receiver),
            _ => None,
        }
    }
}

/// A (potential or invalid) communication between controllers, attached to a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommunicationData {
    /// One role per controller.
    pub roles: Vec<CommunicationRole>,
}

impl CommunicationData {
    /// Returns the index of the sending controller, if there is one.
    pub fn sender(&self) -> Option<usize> {
        self.roles
            .iter()
            .position(|r| *r == CommunicationRole::Sender)
    }

    /// Iterates over the indices of all receiving controllers.
    pub fn receivers(&self) -> impl Iterator<Item = usize> + '_ {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == CommunicationRole::Receiver)
            .map(|(i, _)| i)
    }
}

/// A communication that is part of a Nash equilibrium, annotated with its cost and probability.
#[derive(Debug, Clone, PartialEq)]
pub struct NashCommunicationData {
    /// One role per controller.
    pub roles: Vec<CommunicationRole>,
    /// Cost of the communication.
    pub cost: f64,
    /// Probability of the communication.
    pub probability: f64,
}

/// Disablement decisions of the controllers for a transition, one entry per controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisablementData {
    /// `true` at index `i` iff controller `i` disables the transition.
    pub controllers: Vec<bool>,
}
