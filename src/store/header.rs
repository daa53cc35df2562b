//! Encoding of the header file.
//!
//! The header starts with a fixed prologue of [`PROLOGUE_SIZE`] bytes, followed by the event
//! table and the special transition tables of the automaton's kind. All integers are unsigned
//! and big-endian.
//!
//! ```text
//! offset  size  field
//! 0       1     kind
//! 1       8     number of states
//! 9       4     event capacity
//! 13      8     state capacity
//! 21      4     transition capacity
//! 25      4     label length
//! 29      8     initial state id (0 if unset)
//! 37      4     number of controllers
//! 41      4     number of events
//! ```

use crate::{
    capacity::{Capacities, MAX_CONTROLLERS},
    codec::{bytes_to_uint, uint_to_bytes},
    error::{AutomatonError, Result},
    model::{Event, EventId, StateId},
    store::{special::SpecialTransitions, AutomatonKind},
};

/// Size of the fixed part of a header.
pub const PROLOGUE_SIZE: usize = 45;

/// Everything that is stored in a header file.
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub kind: AutomatonKind,
    pub n_states: u64,
    pub capacities: Capacities,
    pub initial_state: Option<StateId>,
    pub n_controllers: usize,
    pub events: Vec<Event>,
    pub specials: SpecialTransitions,
}

/// Appends big-endian integers to a growing buffer.
pub(crate) struct HeaderWriter<'a>(&'a mut Vec<u8>);

impl<'a> HeaderWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self(out)
    }

    pub fn uint(&mut self, value: u64, width: usize) {
        let start = self.0.len();
        self.0.resize(start + width, 0);
        uint_to_bytes(value, width, &mut self.0[..], start);
    }

    pub fn byte(&mut self, value: u8) {
        self.0.push(value);
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.0.extend_from_slice(value);
    }
}

/// Reads big-endian integers from a header buffer, reporting truncation as a malformed header.
pub(crate) struct HeaderReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                AutomatonError::MalformedHeader(format!(
                    "expected {n} more bytes at offset {}, header has {}",
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn uint(&mut self, width: usize) -> Result<u64> {
        let bytes = self.bytes(width)?;
        Ok(bytes_to_uint(bytes, 0, width))
    }

    pub fn byte(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn flag(&mut self) -> Result<bool> {
        Ok(self.byte()? != 0)
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Header {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PROLOGUE_SIZE + self.events.len() * 8);
        let mut w = HeaderWriter::new(&mut out);
        w.byte(self.kind.to_byte());
        w.uint(self.n_states, 8);
        w.uint(self.capacities.events as u64, 4);
        w.uint(self.capacities.states, 8);
        w.uint(self.capacities.transitions as u64, 4);
        w.uint(self.capacities.label_length as u64, 4);
        w.uint(self.initial_state.unwrap_or(0), 8);
        w.uint(self.n_controllers as u64, 4);
        w.uint(self.events.len() as u64, 4);
        debug_assert_eq!(out.len(), PROLOGUE_SIZE);

        let mut w = HeaderWriter::new(&mut out);
        for event in &self.events {
            for i in 0..self.n_controllers {
                w.byte(event.is_observable_by(i) as u8);
                w.byte(event.is_controllable_by(i) as u8);
            }
            w.uint(event.label().len() as u64, 4);
            w.bytes(event.label().as_bytes());
        }

        self.kind
            .codec()
            .encode(&self.specials, self.n_controllers, &mut out);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = HeaderReader::new(buf);
        let kind_byte = r.byte()?;
        let kind = AutomatonKind::from_byte(kind_byte).ok_or_else(|| {
            AutomatonError::MalformedHeader(format!("unknown automaton kind {kind_byte}"))
        })?;
        let n_states = r.uint(8)?;
        let events_capacity = r.uint(4)? as u32;
        let states_capacity = r.uint(8)?;
        let transitions = r.uint(4)? as u32;
        let label_length = r.uint(4)? as u32;
        let initial_state = Some(r.uint(8)?).filter(|id| *id != 0);
        let n_controllers = r.uint(4)? as usize;
        let n_events = r.uint(4)?;
        if n_controllers == 0 || n_controllers > MAX_CONTROLLERS {
            return Err(AutomatonError::MalformedHeader(format!(
                "{n_controllers} controllers, expected between 1 and {MAX_CONTROLLERS}"
            )));
        }

        let mut events = Vec::new();
        for id in 1..=n_events {
            let mut observable = Vec::with_capacity(n_controllers);
            let mut controllable = Vec::with_capacity(n_controllers);
            for _ in 0..n_controllers {
                observable.push(r.flag()?);
                controllable.push(r.flag()?);
            }
            let len = r.uint(4)? as usize;
            let label = String::from_utf8(r.bytes(len)?.to_vec()).map_err(|e| {
                AutomatonError::MalformedHeader(format!("event label is not valid utf-8: {e}"))
            })?;
            events.push(Event::new(id as EventId, label, observable, controllable));
        }

        let specials = kind.codec().decode(&mut r, n_controllers)?;
        if r.position() != buf.len() {
            return Err(AutomatonError::MalformedHeader(format!(
                "{} trailing bytes",
                buf.len() - r.position()
            )));
        }

        Ok(Self {
            kind,
            n_states,
            capacities: Capacities {
                events: events_capacity,
                states: states_capacity,
                transitions,
                label_length,
            },
            initial_state,
            n_controllers,
            events,
            specials,
        })
    }
}
