//! The automaton store. An [`Automaton`] is backed by a header file, which holds the events, the
//! capacities and the special transitions, and a body file, which holds one fixed-size record per
//! state. States are read and written lazily, so only the header is kept in memory.
//!
//! Whenever a capacity is exceeded, the body file is rebuilt with a larger record layout. This is
//! the most expensive operation of the store and happens exactly when a state, event, transition
//! or label first does not fit anymore.
//!
//! ```
//! use automata_store::prelude::*;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut automaton = Automaton::create(
//!     StorePaths::in_dir(dir.path(), "plant"),
//!     AutomatonConfig::default(),
//! )
//! .unwrap();
//! let a = automaton.add_event("a", &[true], &[true]).unwrap();
//! let q0 = automaton.add_state("q0", false, true).unwrap();
//! let q1 = automaton.add_state("q1", true, false).unwrap();
//! automaton.add_transition(q0, a, q1).unwrap();
//!
//! let state = automaton.get_state(q0).unwrap().unwrap();
//! assert_eq!(state.transitions(), &[Transition::new(a, q1)]);
//! assert_eq!(automaton.initial_state(), Some(q0));
//! ```

use std::{
    collections::BTreeSet,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
};

use tracing::{debug, error, trace};

use crate::{
    capacity::{Capacities, Layout},
    error::{AutomatonError, Resource, Result},
    math::Map,
    model::{
        CommunicationData, DisablementData, Event, EventId, NashCommunicationData, State, StateId,
        Transition, TransitionData,
    },
};

mod body;
use body::{decode_record, encode_record, Body, EXISTS, MARKED};

mod config;
pub use config::{AutomatonConfig, StorePaths, BODY_EXTENSION, HEADER_EXTENSION};

mod header;
use header::Header;
pub use header::PROLOGUE_SIZE;

mod kind;
pub use kind::AutomatonKind;

mod renumber;

mod special;
pub use special::SpecialTransitions;

mod table;

mod temp;
pub use temp::TempContext;

/// Result of [`Automaton::add_event_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAddition {
    /// The event was newly added with the given id.
    Added(EventId),
    /// An event with the same label already existed, it has the given id.
    Existing(EventId),
}

impl EventAddition {
    /// The id of the event, regardless of whether it was added or existed before.
    pub fn id(self) -> EventId {
        match self {
            EventAddition::Added(id) | EventAddition::Existing(id) => id,
        }
    }

    /// Whether the event was newly added.
    pub fn is_new(self) -> bool {
        matches!(self, EventAddition::Added(_))
    }
}

/// An automaton whose states live in a body file on disk.
///
/// Exactly one instance should have a given pair of files open at any time. The header is
/// written back when the automaton is closed (or dropped), [`Automaton::write_header`] can be
/// used to make it durable earlier.
#[derive(Debug)]
pub struct Automaton {
    kind: AutomatonKind,
    paths: StorePaths,
    header_file: File,
    body: Body,
    layout: Layout,
    n_states: u64,
    initial_state: Option<StateId>,
    n_controllers: usize,
    events: Vec<Event>,
    event_ids: Map<String, EventId>,
    specials: SpecialTransitions,
    header_dirty: bool,
}

impl Automaton {
    /// Creates a new, empty automaton, truncating the given files if they exist.
    pub fn create(paths: StorePaths, config: AutomatonConfig) -> Result<Self> {
        let header_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&paths.header)?;
        let body = Body::create(&paths.body)?;
        let mut automaton = Self {
            kind: config.kind,
            paths,
            header_file,
            body,
            layout: config.layout(),
            n_states: 0,
            initial_state: None,
            n_controllers: config.controllers(),
            events: vec![],
            event_ids: Map::default(),
            specials: SpecialTransitions::default(),
            header_dirty: true,
        };
        automaton.write_header()?;
        debug!(
            "created {:?} automaton at {} with capacities {:?}",
            automaton.kind,
            automaton.paths.header.display(),
            automaton.layout.capacities()
        );
        Ok(automaton)
    }

    /// Creates a new, empty automaton in a fresh pair of temporary files.
    pub fn create_temporary(ctx: &mut TempContext, config: AutomatonConfig) -> Result<Self> {
        Self::create(ctx.next_paths()?, config)
    }

    /// Opens an automaton that was previously written to the given files.
    pub fn open(paths: StorePaths) -> Result<Self> {
        let header_file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&paths.header)?;
        let body = Body::open(&paths.body)?;
        let mut automaton = Self {
            kind: AutomatonKind::Plain,
            paths,
            header_file,
            body,
            layout: Layout::new(Capacities::default()),
            n_states: 0,
            initial_state: None,
            n_controllers: 1,
            events: vec![],
            event_ids: Map::default(),
            specials: SpecialTransitions::default(),
            header_dirty: false,
        };
        automaton.read_header()?;
        Ok(automaton)
    }

    /// The files backing this automaton.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// The kind of the automaton.
    pub fn kind(&self) -> AutomatonKind {
        self.kind
    }

    /// Number of states.
    pub fn n_states(&self) -> u64 {
        self.n_states
    }

    /// Number of controllers.
    pub fn n_controllers(&self) -> usize {
        self.n_controllers
    }

    /// The initial state, if one is set.
    pub fn initial_state(&self) -> Option<StateId> {
        self.initial_state
    }

    /// The current (effective) capacities.
    pub fn capacities(&self) -> Capacities {
        self.layout.capacities()
    }

    /// The current record layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// A configuration that creates an automaton of the same kind, with the same capacities
    /// and number of controllers.
    pub fn config(&self) -> AutomatonConfig {
        AutomatonConfig {
            kind: self.kind,
            capacities: self.layout.capacities(),
            n_controllers: self.n_controllers,
        }
    }

    fn header(&self) -> Header {
        Header {
            kind: self.kind,
            n_states: self.n_states,
            capacities: self.layout.capacities(),
            initial_state: self.initial_state,
            n_controllers: self.n_controllers,
            events: self.events.clone(),
            specials: self.specials.clone(),
        }
    }

    /// Writes the header file if anything changed since it was last written or read.
    pub fn write_header(&mut self) -> Result<()> {
        if !self.header_dirty {
            return Ok(());
        }
        let bytes = self.header().encode();
        self.header_file.set_len(0)?;
        self.header_file.seek(SeekFrom::Start(0))?;
        self.header_file.write_all(&bytes)?;
        self.header_file.flush()?;
        self.header_dirty = false;
        trace!(
            "wrote {} header bytes to {}",
            bytes.len(),
            self.paths.header.display()
        );
        Ok(())
    }

    /// Replaces the in-memory header information with the content of the header file.
    pub fn read_header(&mut self) -> Result<()> {
        let mut bytes = vec![];
        self.header_file.seek(SeekFrom::Start(0))?;
        self.header_file.read_to_end(&mut bytes)?;
        let header = Header::decode(&bytes)?;

        self.kind = header.kind;
        self.n_states = header.n_states;
        self.layout = Layout::new(header.capacities);
        self.initial_state = header.initial_state;
        self.n_controllers = header.n_controllers;
        self.event_ids = header
            .events
            .iter()
            .map(|e| (e.label().to_string(), e.id()))
            .collect();
        self.events = header.events;
        self.specials = header.specials;
        self.header_dirty = false;
        trace!("read header of {}", self.paths.header.display());
        Ok(())
    }

    /// Writes the header and closes both files.
    pub fn close(mut self) -> Result<()> {
        self.write_header()
    }

    /// Closes the automaton and removes both of its files.
    pub fn delete(mut self) -> Result<()> {
        let paths = self.paths.clone();
        self.header_dirty = false;
        drop(self);
        std::fs::remove_file(&paths.header)?;
        std::fs::remove_file(&paths.body)?;
        trace!("deleted automaton {}", paths.header.display());
        Ok(())
    }

    /// Creates an independent copy of this automaton in the given files by copying both files
    /// byte for byte.
    pub fn duplicate(&mut self, paths: StorePaths) -> Result<Automaton> {
        self.write_header()?;
        std::fs::copy(&self.paths.header, &paths.header)?;
        self.body.copy_to(&paths.body)?;
        Automaton::open(paths)
    }

    /// Creates an independent copy of this automaton in a fresh pair of temporary files.
    pub fn duplicate_temporary(&mut self, ctx: &mut TempContext) -> Result<Automaton> {
        self.duplicate(ctx.next_paths()?)
    }

    /* ---------------------------------------------------------------- capacity growth */

    fn grow(&mut self, new: Layout) -> Result<()> {
        if new == self.layout {
            return Ok(());
        }
        let old = self.layout;
        if old.record_size() != new.record_size()
            || old.event_id_width() != new.event_id_width()
            || old.state_id_width() != new.state_id_width()
        {
            self.body.rebuild(&old, &new, None)?;
        }
        self.layout = new;
        self.header_dirty = true;
        Ok(())
    }

    /// The layout in which the record of `id` can be written with a label of `label_len` bytes
    /// and `transitions` transitions, and in which state ids up to `max_target` can be encoded.
    /// Every capacity that is too small is raised in the same layout.
    fn required_layout(
        &self,
        id: StateId,
        max_target: StateId,
        label_len: usize,
        transitions: usize,
    ) -> Result<Layout> {
        if id == 0 {
            return Err(AutomatonError::InvalidStateId(id));
        }
        let mut target = self.layout;
        if !target.fits_label(label_len) {
            target = target.grown_for_label(label_len)?;
        }
        let highest = id.max(max_target);
        if !target.fits_state(highest) {
            target = target.grown_for_state(highest);
        }
        if !target.fits_transitions(transitions as u64) {
            target = target.grown_for_transitions(transitions as u64)?;
        }
        target.record_offset(id)?;
        Ok(target)
    }

    /// Rebuilds the body at most once so that a record as described in
    /// [`Automaton::required_layout`] fits. Nothing changes if that fails.
    fn ensure_capacity(
        &mut self,
        id: StateId,
        max_target: StateId,
        label_len: usize,
        transitions: usize,
    ) -> Result<()> {
        let target = self.required_layout(id, max_target, label_len, transitions)?;
        self.grow(target)
    }

    fn check_event(&self, id: EventId) -> Result<()> {
        if self.event(id).is_none() {
            return Err(AutomatonError::UnknownEvent(id.to_string()));
        }
        Ok(())
    }

    /* ------------------------------------------------------------------------- events */

    /// All events, ordered by id.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events.
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// Looks up an event by its id.
    pub fn event(&self, id: EventId) -> Option<&Event> {
        if id == 0 {
            return None;
        }
        self.events.get(id as usize - 1)
    }

    /// Looks up an event by its label.
    pub fn event_by_label(&self, label: &str) -> Option<&Event> {
        self.event_ids.get(label).and_then(|id| self.event(*id))
    }

    /// Adds a new event and returns its id. Both masks should have one entry per controller,
    /// missing entries are treated as `false`. Fails if an event with the same label exists.
    pub fn add_event(
        &mut self,
        label: &str,
        observable: &[bool],
        controllable: &[bool],
    ) -> Result<EventId> {
        if self.event_ids.contains_key(label) {
            return Err(AutomatonError::DuplicateEvent(label.to_string()));
        }
        let n = self.events.len() as u64 + 1;
        if !self.layout.fits_events(n) {
            let grown = self.layout.grown_for_events(n)?;
            self.grow(grown)?;
        }
        let id = n as EventId;
        let mask = |m: &[bool]| {
            (0..self.n_controllers)
                .map(|i| m.get(i).copied().unwrap_or(false))
                .collect::<Vec<_>>()
        };
        let event = Event::new(id, label, mask(observable), mask(controllable));
        self.events.push(event);
        self.event_ids.insert(label.to_string(), id);
        self.header_dirty = true;
        trace!("added event {label} with id {id}");
        Ok(id)
    }

    /// Like [`Automaton::add_event`], but returns the id of an existing event with the same label
    /// instead of failing.
    pub fn add_event_if_absent(
        &mut self,
        label: &str,
        observable: &[bool],
        controllable: &[bool],
    ) -> Result<EventAddition> {
        if let Some(id) = self.event_ids.get(label).copied() {
            return Ok(EventAddition::Existing(id));
        }
        let id = self.add_event(label, observable, controllable)?;
        Ok(EventAddition::Added(id))
    }

    /* ------------------------------------------------------------------------- states */

    /// Appends a state behind the highest record of the body and returns its id. As long as no
    /// holes were left by [`Automaton::add_state_at`], this is `n_states() + 1`. If `initial` is
    /// set, the state becomes the initial state.
    pub fn add_state(&mut self, label: &str, marked: bool, initial: bool) -> Result<StateId> {
        let id = self
            .highest_state_id()?
            .checked_add(1)
            .ok_or(AutomatonError::CapacityExceeded {
                resource: Resource::States,
                requested: u64::MAX,
                maximum: u64::MAX,
            })?;
        self.ensure_capacity(id, id, label.len(), 0)?;
        let record = encode_record(&self.layout, label, marked, &[]);
        self.body.write_record(&self.layout, id, &record)?;
        self.n_states += 1;
        if initial {
            self.initial_state = Some(id);
        }
        self.header_dirty = true;
        Ok(id)
    }

    /// Writes a state at an explicit id, replacing whatever was stored there. Ids written this way
    /// need not be dense, [`Automaton::renumber_states`] removes the holes afterwards.
    pub fn add_state_at(
        &mut self,
        label: &str,
        marked: bool,
        transitions: &[Transition],
        initial: bool,
        id: StateId,
    ) -> Result<()> {
        for t in transitions {
            self.check_event(t.event)?;
            if t.target == 0 {
                return Err(AutomatonError::InvalidStateId(0));
            }
        }
        let max_target = transitions.iter().map(|t| t.target).max().unwrap_or(id);
        self.ensure_capacity(id, max_target, label.len(), transitions.len())?;

        let existed = self.state_exists(id)?;
        let record = encode_record(&self.layout, label, marked, transitions);
        self.body.write_record(&self.layout, id, &record)?;
        if !existed {
            self.n_states += 1;
        }
        if initial {
            self.initial_state = Some(id);
        }
        self.header_dirty = true;
        Ok(())
    }

    /// Checks whether a state with the given id exists, only the flag byte is read.
    pub fn state_exists(&self, id: StateId) -> Result<bool> {
        if id == 0 || !self.layout.fits_state(id) {
            return Ok(false);
        }
        Ok(self.body.flags(&self.layout, id)? & EXISTS != 0)
    }

    /// Reads a state including its transitions, `None` if it does not exist.
    pub fn get_state(&self, id: StateId) -> Result<Option<State>> {
        if id == 0 || !self.layout.fits_state(id) {
            return Ok(None);
        }
        let record = self.body.read_record(&self.layout, id)?;
        Ok(decode_record(&self.layout, id, &record, true))
    }

    /// Reads the label and marking of a state without decoding its transitions.
    pub fn get_state_excluding_transitions(&self, id: StateId) -> Result<Option<State>> {
        if id == 0 || !self.layout.fits_state(id) {
            return Ok(None);
        }
        let prefix = self.body.read_prefix(&self.layout, id)?;
        Ok(decode_record(&self.layout, id, &prefix, false))
    }

    fn require_state(&self, id: StateId) -> Result<State> {
        self.get_state(id)?.ok_or(AutomatonError::UnknownState(id))
    }

    /// Sets (or unsets) the initial state.
    pub fn set_initial_state(&mut self, id: Option<StateId>) -> Result<()> {
        if let Some(id) = id {
            if !self.state_exists(id)? {
                return Err(AutomatonError::UnknownState(id));
            }
        }
        self.initial_state = id;
        self.header_dirty = true;
        Ok(())
    }

    /// Changes the marking of a state, only the flag byte is rewritten.
    pub fn set_marked(&mut self, id: StateId, marked: bool) -> Result<()> {
        if !self.state_exists(id)? {
            return Err(AutomatonError::UnknownState(id));
        }
        let flags = EXISTS | if marked { MARKED } else { 0 };
        self.body.write_flags(&self.layout, id, flags)
    }

    /// The largest id for which a record is present in the body file. All existing states have an
    /// id of at most this value.
    pub fn highest_state_id(&self) -> Result<StateId> {
        self.body.highest_record(&self.layout)
    }

    /// Iterates over all existing states in increasing order of their ids.
    pub fn states(&self) -> Result<States<'_>> {
        Ok(States {
            automaton: self,
            next: 1,
            highest: self.highest_state_id()?,
            with_transitions: true,
        })
    }

    /// Iterates over all existing states without decoding their transitions.
    pub fn states_excluding_transitions(&self) -> Result<States<'_>> {
        Ok(States {
            with_transitions: false,
            ..self.states()?
        })
    }

    /// Collects the ids of all existing states in increasing order.
    pub fn state_ids(&self) -> Result<Vec<StateId>> {
        let mut ids = vec![];
        for id in 1..=self.highest_state_id()? {
            if self.state_exists(id)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /* -------------------------------------------------------------------- transitions */

    /// Adds a transition. Both states and the event must exist. If the source state already holds
    /// as many transitions as the transition capacity allows, the capacity is grown, which
    /// rewrites every record.
    pub fn add_transition(&mut self, from: StateId, event: EventId, to: StateId) -> Result<()> {
        self.check_event(event)?;
        if !self.state_exists(to)? {
            return Err(AutomatonError::UnknownState(to));
        }
        let mut state = self.require_state(from)?;
        state.transitions_mut().push(Transition::new(event, to));
        self.ensure_capacity(from, to, 0, state.number_of_transitions())?;
        self.write_state(&state)
    }

    /// Adds a transition labelled with the event that has the given label.
    pub fn add_transition_by_label(&mut self, from: StateId, label: &str, to: StateId) -> Result<()> {
        let event = self
            .event_by_label(label)
            .ok_or_else(|| AutomatonError::UnknownEvent(label.to_string()))?
            .id();
        self.add_transition(from, event, to)
    }

    /// Removes one occurrence of the given transition together with every special transition entry
    /// for it. Returns whether the transition was present.
    pub fn remove_transition(&mut self, from: StateId, event: EventId, to: StateId) -> Result<bool> {
        let mut state = self.require_state(from)?;
        let target = Transition::new(event, to);
        let Some(position) = state.transitions().iter().position(|t| *t == target) else {
            return Ok(false);
        };
        state.transitions_mut().remove(position);
        self.write_state(&state)?;
        if self.specials.remove(&TransitionData::new(from, event, to)) {
            self.header_dirty = true;
        }
        Ok(true)
    }

    fn write_state(&mut self, state: &State) -> Result<()> {
        let record = encode_record(
            &self.layout,
            state.label(),
            state.is_marked(),
            state.transitions(),
        );
        self.body.write_record(&self.layout, state.id(), &record)
    }

    /// Counts all transitions, this reads every record.
    pub fn n_transitions(&self) -> Result<u64> {
        let mut n = 0;
        for state in self.states()? {
            n += state?.number_of_transitions() as u64;
        }
        Ok(n)
    }

    /// Checks whether the sequence of event labels can be executed from the initial state, i.e.
    /// whether it belongs to the generated language of the automaton.
    pub fn generates(&self, labels: &[&str]) -> Result<bool> {
        let Some(initial) = self.initial_state else {
            return Ok(false);
        };
        let mut current = BTreeSet::from([initial]);
        for label in labels {
            let Some(event) = self.event_by_label(label) else {
                return Ok(false);
            };
            let mut next = BTreeSet::new();
            for q in &current {
                if let Some(state) = self.get_state(*q)? {
                    next.extend(state.transitions_on(event.id()).map(|t| t.target));
                }
            }
            if next.is_empty() {
                return Ok(false);
            }
            current = next;
        }
        Ok(true)
    }

    /* ------------------------------------------------------------ special transitions */

    /// The special transitions of this automaton.
    pub fn special_transitions(&self) -> &SpecialTransitions {
        &self.specials
    }

    pub(crate) fn replace_special_transitions(&mut self, specials: SpecialTransitions) {
        self.specials = specials;
        self.header_dirty = true;
    }

    fn require_kind(&self, plain: bool) -> Result<()> {
        match (plain, self.kind.is_ustructure()) {
            (true, true) => Err(AutomatonError::WrongKind {
                expected: AutomatonKind::Plain,
                found: self.kind,
            }),
            (false, false) => Err(AutomatonError::WrongKind {
                expected: AutomatonKind::UStructure,
                found: self.kind,
            }),
            _ => Ok(()),
        }
    }

    /// Marks a transition as bad. Only plain automata carry bad transitions.
    pub fn add_bad_transition(&mut self, from: StateId, event: EventId, to: StateId) -> Result<()> {
        self.require_kind(true)?;
        self.check_event(event)?;
        self.specials.bad.insert(TransitionData::new(from, event, to));
        self.header_dirty = true;
        Ok(())
    }

    /// Whether the given transition is marked as bad.
    pub fn is_bad_transition(&self, from: StateId, event: EventId, to: StateId) -> bool {
        self.specials
            .bad
            .contains(&TransitionData::new(from, event, to))
    }

    /// Records an unconditional violation (U-Structures only).
    pub fn add_unconditional_violation(&mut self, data: TransitionData) -> Result<()> {
        self.require_kind(false)?;
        self.specials.unconditional_violations.insert(data);
        self.header_dirty = true;
        Ok(())
    }

    /// Records a conditional violation (U-Structures only).
    pub fn add_conditional_violation(&mut self, data: TransitionData) -> Result<()> {
        self.require_kind(false)?;
        self.specials.conditional_violations.insert(data);
        self.header_dirty = true;
        Ok(())
    }

    /// Records a potential communication (U-Structures only).
    pub fn add_potential_communication(
        &mut self,
        data: TransitionData,
        communication: CommunicationData,
    ) -> Result<()> {
        self.require_kind(false)?;
        self.specials
            .potential_communications
            .insert(data, communication);
        self.header_dirty = true;
        Ok(())
    }

    /// Records an invalid communication (U-Structures only).
    pub fn add_invalid_communication(
        &mut self,
        data: TransitionData,
        communication: CommunicationData,
    ) -> Result<()> {
        self.require_kind(false)?;
        self.specials
            .invalid_communications
            .insert(data, communication);
        self.header_dirty = true;
        Ok(())
    }

    /// Records a communication that is part of a Nash equilibrium (U-Structures only).
    pub fn add_nash_communication(
        &mut self,
        data: TransitionData,
        communication: NashCommunicationData,
    ) -> Result<()> {
        self.require_kind(false)?;
        self.specials.nash_communications.insert(data, communication);
        self.header_dirty = true;
        Ok(())
    }

    /// Records the disablement decisions for a transition (U-Structures only).
    pub fn add_disablement_decision(
        &mut self,
        data: TransitionData,
        decision: DisablementData,
    ) -> Result<()> {
        self.require_kind(false)?;
        self.specials.disablement_decisions.insert(data, decision);
        self.header_dirty = true;
        Ok(())
    }
}

impl Drop for Automaton {
    fn drop(&mut self) {
        if let Err(e) = self.write_header() {
            error!(
                "could not write header of {}: {e}",
                self.paths.header.display()
            );
        }
    }
}

/// Iterator over the existing states of an [`Automaton`], see [`Automaton::states`].
#[derive(Debug)]
pub struct States<'a> {
    automaton: &'a Automaton,
    next: StateId,
    highest: StateId,
    with_transitions: bool,
}

impl<'a> Iterator for States<'a> {
    type Item = Result<State>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next <= self.highest {
            let id = self.next;
            self.next += 1;
            let state = if self.with_transitions {
                self.automaton.get_state(id)
            } else {
                self.automaton.get_state_excluding_transitions(id)
            };
            match state {
                Ok(Some(state)) => return Some(Ok(state)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{bad_transition_plant, plant_with_bad_dead_end};

    fn config() -> AutomatonConfig {
        AutomatonConfig::default()
    }

    #[test_log::test]
    fn header_and_body_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path(), "plant");
        let mut automaton = Automaton::create(paths.clone(), config().with_controllers(2)).unwrap();
        let a = automaton.add_event("a", &[true, false], &[false, true]).unwrap();
        let b = automaton.add_event("b", &[true, true], &[true, true]).unwrap();
        let q0 = automaton.add_state("zero", false, true).unwrap();
        let q1 = automaton.add_state("one", true, false).unwrap();
        automaton.add_transition(q0, a, q1).unwrap();
        automaton.add_transition(q0, b, q0).unwrap();
        automaton.add_transition(q1, b, q0).unwrap();
        automaton.add_bad_transition(q1, b, q0).unwrap();
        automaton.close().unwrap();

        let reopened = Automaton::open(paths).unwrap();
        assert_eq!(reopened.kind(), AutomatonKind::Plain);
        assert_eq!(reopened.n_states(), 2);
        assert_eq!(reopened.n_controllers(), 2);
        assert_eq!(reopened.initial_state(), Some(q0));
        assert_eq!(reopened.n_events(), 2);
        assert_eq!(reopened.event(a).unwrap().label(), "a");
        assert_eq!(reopened.event_by_label("b").unwrap().id(), b);
        assert_eq!(reopened.event(a).unwrap().controllable(), &[false, true]);

        let zero = reopened.get_state(q0).unwrap().unwrap();
        assert_eq!(zero.label(), "zero");
        assert!(!zero.is_marked());
        assert_eq!(
            zero.transitions(),
            &[Transition::new(a, q1), Transition::new(b, q0)]
        );
        let one = reopened.get_state(q1).unwrap().unwrap();
        assert!(one.is_marked());
        assert!(reopened.is_bad_transition(q1, b, q0));
        assert_eq!(reopened.n_transitions().unwrap(), 3);
    }

    #[test]
    fn duplicate_events_are_rejected() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        assert!(matches!(
            automaton.add_event("a", &[false], &[false]),
            Err(AutomatonError::DuplicateEvent(_))
        ));
        assert_eq!(
            automaton.add_event_if_absent("a", &[true], &[true]).unwrap(),
            EventAddition::Existing(a)
        );
        let b = automaton.add_event_if_absent("b", &[true], &[true]).unwrap();
        assert!(b.is_new());
        assert_eq!(b.id(), 2);
    }

    #[test]
    fn lookups_of_missing_entities_are_absent() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let q = automaton.add_state("q", false, false).unwrap();
        assert!(automaton.get_state(0).unwrap().is_none());
        assert!(automaton.get_state(q + 1).unwrap().is_none());
        assert!(automaton.get_state(u64::MAX).unwrap().is_none());
        assert!(!automaton.state_exists(q + 1).unwrap());
        assert!(automaton.event(0).is_none());
        assert!(automaton.event(1).is_none());
        assert!(automaton.event_by_label("x").is_none());
    }

    #[test]
    fn transitions_require_existing_endpoints() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        let q = automaton.add_state("q", false, true).unwrap();
        assert!(matches!(
            automaton.add_transition(q + 1, a, q),
            Err(AutomatonError::UnknownState(_))
        ));
        assert!(matches!(
            automaton.add_transition(q, a, q + 1),
            Err(AutomatonError::UnknownState(_))
        ));
        assert!(matches!(
            automaton.add_transition(q, a + 1, q),
            Err(AutomatonError::UnknownEvent(_))
        ));
        assert!(matches!(
            automaton.add_transition_by_label(q, "b", q),
            Err(AutomatonError::UnknownEvent(_))
        ));
    }

    #[test_log::test]
    fn state_capacity_growth_is_exact() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        for i in 1..=255u64 {
            automaton
                .add_state(&format!("{}", i % 10), i % 2 == 0, i == 1)
                .unwrap();
        }
        for i in 1..255u64 {
            automaton.add_transition(i, a, i + 1).unwrap();
        }
        assert_eq!(automaton.capacities().states, 255);
        assert_eq!(automaton.layout().state_id_width(), 1);

        let last = automaton.add_state("x", true, false).unwrap();
        assert_eq!(last, 256);
        assert_eq!(automaton.capacities().states, 65_535);
        assert_eq!(automaton.layout().state_id_width(), 2);
        automaton.add_transition(255, a, 256).unwrap();

        for i in 1..=255u64 {
            let state = automaton.get_state(i).unwrap().unwrap();
            assert_eq!(state.label(), format!("{}", i % 10));
            assert_eq!(state.is_marked(), i % 2 == 0);
            assert_eq!(state.transitions(), &[Transition::new(a, i + 1)]);
        }
        assert_eq!(automaton.get_state(256).unwrap().unwrap().label(), "x");
    }

    #[test_log::test]
    fn event_capacity_growth_is_exact() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let q0 = automaton.add_state("q0", false, true).unwrap();
        let q1 = automaton.add_state("q1", false, false).unwrap();
        for i in 0..255 {
            let e = automaton.add_event(&format!("e{i}"), &[true], &[false]).unwrap();
            automaton.add_transition(q0, e, q1).unwrap();
        }
        assert_eq!(automaton.capacities().events, 255);
        assert_eq!(automaton.layout().event_id_width(), 1);

        let last = automaton.add_event("last", &[true], &[true]).unwrap();
        assert_eq!(last, 256);
        assert_eq!(automaton.capacities().events, 65_535);
        assert_eq!(automaton.layout().event_id_width(), 2);
        automaton.add_transition(q1, last, q0).unwrap();

        let state = automaton.get_state(q0).unwrap().unwrap();
        assert_eq!(state.number_of_transitions(), 255);
        assert!(state.transitions().iter().all(|t| t.target == q1));
        assert_eq!(state.transitions()[254].event, 255);
        assert_eq!(
            automaton.get_state(q1).unwrap().unwrap().transitions(),
            &[Transition::new(last, q0)]
        );
    }

    #[test]
    fn label_growth_rewrites_records() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        let q0 = automaton.add_state("a", true, true).unwrap();
        automaton.add_transition(q0, a, q0).unwrap();
        assert_eq!(automaton.capacities().label_length, 1);
        let q1 = automaton.add_state("a much longer label", false, false).unwrap();
        assert_eq!(automaton.capacities().label_length, 19);
        assert_eq!(
            automaton.get_state(q1).unwrap().unwrap().label(),
            "a much longer label"
        );
        let first = automaton.get_state(q0).unwrap().unwrap();
        assert_eq!(first.label(), "a");
        assert_eq!(first.transitions(), &[Transition::new(a, q0)]);

        let too_long = "x".repeat(crate::capacity::MAX_LABEL_LENGTH as usize + 1);
        assert!(matches!(
            automaton.add_state(&too_long, false, false),
            Err(AutomatonError::CapacityExceeded {
                resource: Resource::LabelLength,
                ..
            })
        ));
        assert_eq!(automaton.n_states(), 2);
    }

    #[test]
    fn explicit_ids_leave_holes() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        automaton
            .add_state_at("far", false, &[Transition::new(a, 1000)], true, 7)
            .unwrap();
        automaton.add_state_at("farther", true, &[], false, 1000).unwrap();
        assert_eq!(automaton.n_states(), 2);
        assert_eq!(automaton.capacities().states, 65_535);
        assert_eq!(automaton.initial_state(), Some(7));
        assert_eq!(automaton.state_ids().unwrap(), vec![7, 1000]);
        assert!(!automaton.state_exists(8).unwrap());

        // overwriting does not change the number of states
        automaton.add_state_at("far", true, &[], true, 7).unwrap();
        assert_eq!(automaton.n_states(), 2);
        assert!(automaton.get_state(7).unwrap().unwrap().is_marked());
    }

    #[test]
    fn unaddressable_ids_are_reported() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        assert!(!automaton.state_exists(1 << 62).unwrap());
        assert!(automaton.get_state(1 << 62).unwrap().is_none());
        assert!(matches!(
            automaton.add_state_at("x", false, &[], false, 1 << 62),
            Err(AutomatonError::CapacityExceeded {
                resource: Resource::States,
                ..
            })
        ));
        assert_eq!(automaton.n_states(), 0);
        assert_eq!(automaton.capacities().states, 255);

        let huge = Automaton::create_temporary(
            &mut ctx,
            config().with_state_capacity(u64::MAX),
        )
        .unwrap();
        assert_eq!(huge.capacities().states, u64::MAX);
        assert!(!huge.state_exists(u64::MAX).unwrap());
        assert!(huge.get_state(u64::MAX).unwrap().is_none());
        assert!(huge
            .get_state_excluding_transitions(u64::MAX)
            .unwrap()
            .is_none());
    }

    #[test]
    fn appending_after_a_hole_keeps_existing_states() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        automaton.add_state_at("kept", true, &[], true, 2).unwrap();
        let id = automaton.add_state("new", false, false).unwrap();
        assert_eq!(id, 3);
        assert_eq!(automaton.n_states(), 2);
        assert_eq!(automaton.state_ids().unwrap(), vec![2, 3]);
        let kept = automaton.get_state(2).unwrap().unwrap();
        assert_eq!(kept.label(), "kept");
        assert!(kept.is_marked());
        assert_eq!(automaton.initial_state(), Some(2));
    }

    #[test]
    fn one_write_grows_all_capacities_at_once() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        let b = automaton.add_event("b", &[true], &[true]).unwrap();
        let q = automaton.add_state("q", false, true).unwrap();

        let label = "a longer label";
        let transitions = [Transition::new(a, q), Transition::new(b, 300)];
        let target = automaton
            .required_layout(300, 300, label.len(), transitions.len())
            .unwrap();
        assert_eq!(target.capacities().label_length, label.len() as u32);
        assert_eq!(target.capacities().states, 65_535);
        assert_eq!(target.capacities().transitions, 2);

        automaton
            .add_state_at(label, true, &transitions, false, 300)
            .unwrap();
        assert_eq!(*automaton.layout(), target);
        assert_eq!(automaton.get_state(q).unwrap().unwrap().label(), "q");
        assert_eq!(
            automaton.get_state(300).unwrap().unwrap().transitions(),
            &transitions
        );

        // a request that cannot be met leaves the layout untouched
        let too_long = "x".repeat(crate::capacity::MAX_LABEL_LENGTH as usize + 1);
        assert!(automaton
            .add_state_at(&too_long, false, &transitions, false, 100_000)
            .is_err());
        assert_eq!(*automaton.layout(), target);
    }

    #[test]
    fn excluding_transitions_reads_label_and_marking() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let a = automaton.add_event("a", &[true], &[true]).unwrap();
        let q = automaton.add_state("qq", true, true).unwrap();
        automaton.add_transition(q, a, q).unwrap();
        let light = automaton.get_state_excluding_transitions(q).unwrap().unwrap();
        assert_eq!(light.label(), "qq");
        assert!(light.is_marked());
        assert!(light.transitions().is_empty());
        assert!(automaton
            .get_state_excluding_transitions(q + 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn removing_transitions_drops_special_entries() {
        let mut ctx = TempContext::new();
        let mut automaton = bad_transition_plant(&mut ctx);
        let o = automaton.event_by_label("o").unwrap().id();
        assert!(automaton.is_bad_transition(2, o, 3));
        assert!(automaton.remove_transition(2, o, 3).unwrap());
        assert!(!automaton.is_bad_transition(2, o, 3));
        assert!(!automaton.remove_transition(2, o, 3).unwrap());
        assert!(!automaton
            .get_state(2)
            .unwrap()
            .unwrap()
            .has_transition_on(o));
    }

    #[test]
    fn special_tables_depend_on_kind() {
        let mut ctx = TempContext::new();
        let mut plain = bad_transition_plant(&mut ctx);
        assert!(matches!(
            plain.add_unconditional_violation(TransitionData::new(1, 1, 2)),
            Err(AutomatonError::WrongKind { .. })
        ));
        let mut ustructure = Automaton::create_temporary(
            &mut ctx,
            config().with_kind(AutomatonKind::UStructure),
        )
        .unwrap();
        let e = ustructure.add_event("<a,a>", &[true], &[true]).unwrap();
        assert!(matches!(
            ustructure.add_bad_transition(1, e, 2),
            Err(AutomatonError::WrongKind { .. })
        ));
        ustructure
            .add_disablement_decision(
                TransitionData::new(1, e, 2),
                DisablementData {
                    controllers: vec![true],
                },
            )
            .unwrap();
        let paths = ustructure.paths().clone();
        ustructure.close().unwrap();
        let reopened = Automaton::open(paths).unwrap();
        assert_eq!(reopened.kind(), AutomatonKind::UStructure);
        assert_eq!(reopened.special_transitions().disablement_decisions.len(), 1);
    }

    #[test]
    fn duplicate_is_independent() {
        let mut ctx = TempContext::new();
        let mut original = plant_with_bad_dead_end(&mut ctx);
        let mut copy = original.duplicate_temporary(&mut ctx).unwrap();
        assert_eq!(copy.n_states(), original.n_states());
        assert_eq!(copy.special_transitions(), original.special_transitions());
        for (a, b) in original.states().unwrap().zip(copy.states().unwrap()) {
            assert_eq!(a.unwrap(), b.unwrap());
        }
        copy.add_state("new", false, false).unwrap();
        assert_eq!(copy.n_states(), original.n_states() + 1);
        assert!(!original.state_exists(copy.n_states()).unwrap());
    }

    #[test]
    fn dropping_flushes_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path(), "dropped");
        {
            let mut automaton = Automaton::create(paths.clone(), config()).unwrap();
            automaton.add_event("a", &[true], &[false]).unwrap();
            automaton.add_state("q", true, true).unwrap();
        }
        let reopened = Automaton::open(paths).unwrap();
        assert_eq!(reopened.n_states(), 1);
        assert_eq!(reopened.n_events(), 1);
    }

    #[test]
    fn delete_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path(), "gone");
        let automaton = Automaton::create(paths.clone(), config()).unwrap();
        automaton.delete().unwrap();
        assert!(!paths.header.exists());
        assert!(!paths.body.exists());
    }

    #[test]
    fn generated_sequences() {
        let mut ctx = TempContext::new();
        let automaton = plant_with_bad_dead_end(&mut ctx);
        assert!(automaton.generates(&[]).unwrap());
        assert!(automaton.generates(&["a", "b", "o"]).unwrap());
        assert!(!automaton.generates(&["o"]).unwrap());
        assert!(!automaton.generates(&["nonexistent"]).unwrap());
    }

    #[test]
    fn marking_can_be_toggled() {
        let mut ctx = TempContext::new();
        let mut automaton = Automaton::create_temporary(&mut ctx, config()).unwrap();
        let q = automaton.add_state("q", false, false).unwrap();
        automaton.set_marked(q, true).unwrap();
        assert!(automaton.get_state(q).unwrap().unwrap().is_marked());
        assert!(automaton.set_marked(q + 1, true).is_err());
        assert!(automaton.set_initial_state(Some(q + 1)).is_err());
        automaton.set_initial_state(Some(q)).unwrap();
        assert_eq!(automaton.initial_state(), Some(q));
    }
}
