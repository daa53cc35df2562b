use thiserror::Error;

use crate::store::AutomatonKind;

/// The resources of a store that are bounded by a capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Number of events.
    Events,
    /// Number of states, or rather the largest state id.
    States,
    /// Number of outgoing transitions of a single state.
    Transitions,
    /// Length of a state label in bytes.
    LabelLength,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Resource::Events => "event",
            Resource::States => "state",
            Resource::Transitions => "transition",
            Resource::LabelLength => "label length",
        };
        write!(f, "{name}")
    }
}

/// Everything that can go wrong when working with an automaton store or one of the
/// operations defined on top of it.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum AutomatonError {
    #[error("{resource} capacity exceeded: requested {requested}, at most {maximum} is representable")]
    CapacityExceeded {
        resource: Resource,
        requested: u64,
        maximum: u64,
    },
    #[error("an event labelled \"{0}\" already exists")]
    DuplicateEvent(String),
    #[error("state {0} does not exist")]
    UnknownState(u64),
    #[error("unknown event {0}")]
    UnknownEvent(String),
    #[error("{0} is not a valid state id")]
    InvalidStateId(u64),
    #[error("automata have a different number of controllers ({left} and {right})")]
    IncompatibleControllers { left: usize, right: usize },
    #[error("event \"{0}\" differs in observability or controllability between the automata")]
    IncompatibleEvent(String),
    #[error("{0} has already been applied to this automaton")]
    OperationAlreadyApplied(&'static str),
    #[error("combined state id does not fit into 64 bits")]
    CombinedIdOverflow,
    #[error("operation requires an automaton of kind {expected:?}, found {found:?}")]
    WrongKind {
        expected: AutomatonKind,
        found: AutomatonKind,
    },
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for AutomatonError {
    fn from(value: tempfile::PersistError) -> Self {
        AutomatonError::Io(value.error)
    }
}

/// Result type used throughout the crate.
pub type Result<T, E = AutomatonError> = std::result::Result<T, E>;
