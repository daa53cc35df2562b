//! The entities stored in an automaton: events, states with their transitions and the
//! transition triples that identify "special" transitions.

mod event;
pub use event::{Event, LabelVector, NON_PARTICIPATING};

mod state;
pub use state::{State, Transition};

mod special;
pub use special::{
    CommunicationData, CommunicationRole, DisablementData, NashCommunicationData, TransitionData,
};

/// Type of state ids. Valid ids start at one, zero is never used for a state.
pub type StateId = u64;

/// Type of event ids. Valid ids start at one.
pub type EventId = u32;
