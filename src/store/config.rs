use std::path::{Path, PathBuf};

use crate::{
    capacity::{Capacities, Layout, MAX_CONTROLLERS},
    store::AutomatonKind,
};

/// Extension of header files.
pub const HEADER_EXTENSION: &str = "hdr";
/// Extension of body files.
pub const BODY_EXTENSION: &str = "bdy";

/// The pair of files backing an automaton.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePaths {
    /// Path of the header file.
    pub header: PathBuf,
    /// Path of the body file.
    pub body: PathBuf,
}

impl StorePaths {
    /// Creates a pair from two explicit paths.
    pub fn new(header: impl Into<PathBuf>, body: impl Into<PathBuf>) -> Self {
        Self {
            header: header.into(),
            body: body.into(),
        }
    }

    /// Returns the pair `<dir>/<stem>.hdr` and `<dir>/<stem>.bdy`.
    pub fn in_dir(dir: impl AsRef<Path>, stem: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            header: dir.join(format!("{stem}.{HEADER_EXTENSION}")),
            body: dir.join(format!("{stem}.{BODY_EXTENSION}")),
        }
    }
}

/// Describes how a new automaton is to be created. Requested capacities are normalized by the
/// capacity model, so the effective capacities of the store may be larger than requested.
///
/// ```
/// use automata_store::prelude::*;
///
/// let config = AutomatonConfig::default()
///     .with_controllers(2)
///     .with_label_length(8)
///     .with_state_capacity(1000);
/// assert_eq!(config.layout().capacities().states, 65_535);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AutomatonConfig {
    /// Kind of the automaton.
    pub kind: AutomatonKind,
    /// Requested capacities.
    pub capacities: Capacities,
    /// Number of controllers, clamped into `1..=MAX_CONTROLLERS`.
    pub n_controllers: usize,
}

impl AutomatonConfig {
    /// Sets the kind.
    pub fn with_kind(mut self, kind: AutomatonKind) -> Self {
        self.kind = kind;
        self
    }

    /// Requests an event capacity.
    pub fn with_event_capacity(mut self, events: u32) -> Self {
        self.capacities.events = events;
        self
    }

    /// Requests a state capacity.
    pub fn with_state_capacity(mut self, states: u64) -> Self {
        self.capacities.states = states;
        self
    }

    /// Requests a per-state transition capacity.
    pub fn with_transition_capacity(mut self, transitions: u32) -> Self {
        self.capacities.transitions = transitions;
        self
    }

    /// Requests a label length.
    pub fn with_label_length(mut self, label_length: u32) -> Self {
        self.capacities.label_length = label_length;
        self
    }

    /// Sets all capacities at once.
    pub fn with_capacities(mut self, capacities: Capacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Sets the number of controllers.
    pub fn with_controllers(mut self, n_controllers: usize) -> Self {
        self.n_controllers = n_controllers;
        self
    }

    /// The number of controllers after clamping.
    pub fn controllers(&self) -> usize {
        self.n_controllers.clamp(1, MAX_CONTROLLERS)
    }

    /// The layout resulting from the requested capacities.
    pub fn layout(&self) -> Layout {
        Layout::new(self.capacities)
    }
}
