//! Special transitions are attached to an automaton as a whole instead of to a single state.
//! Which tables an automaton carries is determined by its
//! [`AutomatonKind`](crate::store::AutomatonKind), the codec of a kind serializes exactly
//! those tables.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::{AutomatonError, Result},
    model::{
        CommunicationData, CommunicationRole, DisablementData, EventId, NashCommunicationData,
        StateId, TransitionData,
    },
    store::header::{HeaderReader, HeaderWriter},
};

/// All special transitions of an automaton.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialTransitions {
    /// Transitions that must never be taken (plain automata).
    pub bad: BTreeSet<TransitionData>,
    /// Unconditional violations (U-Structures).
    pub unconditional_violations: BTreeSet<TransitionData>,
    /// Conditional violations (U-Structures).
    pub conditional_violations: BTreeSet<TransitionData>,
    /// Potential communications (U-Structures).
    pub potential_communications: BTreeMap<TransitionData, CommunicationData>,
    /// Invalid communications (U-Structures).
    pub invalid_communications: BTreeMap<TransitionData, CommunicationData>,
    /// Communications that are part of a Nash equilibrium (U-Structures).
    pub nash_communications: BTreeMap<TransitionData, NashCommunicationData>,
    /// Disablement decisions (U-Structures).
    pub disablement_decisions: BTreeMap<TransitionData, DisablementData>,
}

impl SpecialTransitions {
    /// Total number of entries over all tables.
    pub fn len(&self) -> usize {
        self.bad.len()
            + self.unconditional_violations.len()
            + self.conditional_violations.len()
            + self.potential_communications.len()
            + self.invalid_communications.len()
            + self.nash_communications.len()
            + self.disablement_decisions.len()
    }

    /// Whether all tables are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the given transition from every table, returns true if it was present in any.
    pub fn remove(&mut self, data: &TransitionData) -> bool {
        let mut removed = self.bad.remove(data);
        removed |= self.unconditional_violations.remove(data);
        removed |= self.conditional_violations.remove(data);
        removed |= self.potential_communications.remove(data).is_some();
        removed |= self.invalid_communications.remove(data).is_some();
        removed |= self.nash_communications.remove(data).is_some();
        removed |= self.disablement_decisions.remove(data).is_some();
        removed
    }

    /// Rewrites the state ids of every entry through `f`. Entries for which `f` returns `None`
    /// on one of the endpoints are dropped.
    pub fn remap_states<F>(&self, f: F) -> Self
    where
        F: Fn(StateId) -> Option<StateId>,
    {
        fn set<F: Fn(StateId) -> Option<StateId>>(
            s: &BTreeSet<TransitionData>,
            f: &F,
        ) -> BTreeSet<TransitionData> {
            s.iter().filter_map(|t| t.map_states(f)).collect()
        }
        fn map<V: Clone, F: Fn(StateId) -> Option<StateId>>(
            m: &BTreeMap<TransitionData, V>,
            f: &F,
        ) -> BTreeMap<TransitionData, V> {
            m.iter()
                .filter_map(|(t, v)| Some((t.map_states(f)?, v.clone())))
                .collect()
        }
        Self {
            bad: set(&self.bad, &f),
            unconditional_violations: set(&self.unconditional_violations, &f),
            conditional_violations: set(&self.conditional_violations, &f),
            potential_communications: map(&self.potential_communications, &f),
            invalid_communications: map(&self.invalid_communications, &f),
            nash_communications: map(&self.nash_communications, &f),
            disablement_decisions: map(&self.disablement_decisions, &f),
        }
    }

    /// Keeps only the entries for which both endpoints satisfy `exists`.
    pub fn restricted_to<F>(&self, exists: F) -> Self
    where
        F: Fn(StateId) -> bool,
    {
        self.remap_states(|q| exists(q).then_some(q))
    }

    /// Rewrites the event ids of every entry through `f`, dropping entries without an image.
    pub fn remap_events<F>(&self, f: F) -> Self
    where
        F: Fn(EventId) -> Option<EventId>,
    {
        let map_event = |t: &TransitionData| {
            Some(TransitionData {
                event: f(t.event)?,
                ..*t
            })
        };
        Self {
            bad: self.bad.iter().filter_map(map_event).collect(),
            unconditional_violations: self
                .unconditional_violations
                .iter()
                .filter_map(map_event)
                .collect(),
            conditional_violations: self
                .conditional_violations
                .iter()
                .filter_map(map_event)
                .collect(),
            potential_communications: self
                .potential_communications
                .iter()
                .filter_map(|(t, v)| Some((map_event(t)?, v.clone())))
                .collect(),
            invalid_communications: self
                .invalid_communications
                .iter()
                .filter_map(|(t, v)| Some((map_event(t)?, v.clone())))
                .collect(),
            nash_communications: self
                .nash_communications
                .iter()
                .filter_map(|(t, v)| Some((map_event(t)?, v.clone())))
                .collect(),
            disablement_decisions: self
                .disablement_decisions
                .iter()
                .filter_map(|(t, v)| Some((map_event(t)?, v.clone())))
                .collect(),
        }
    }
}

/// Serializes the special transition tables of one automaton kind. Every table is prefixed
/// with a 4 byte count, every entry starts with an 8 byte initial state id, a 4 byte event id and
/// an 8 byte target state id.
pub(crate) trait SpecialTransitionCodec {
    fn encode(&self, specials: &SpecialTransitions, n_controllers: usize, out: &mut Vec<u8>);
    fn decode(
        &self,
        reader: &mut HeaderReader<'_>,
        n_controllers: usize,
    ) -> Result<SpecialTransitions>;
}

/// Codec of plain automata, which only store bad transitions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlainCodec;

/// Codec of U-Structures and the kinds derived from them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UStructureCodec;

fn write_data(w: &mut HeaderWriter<'_>, data: &TransitionData) {
    w.uint(data.initial_state, 8);
    w.uint(data.event as u64, 4);
    w.uint(data.target_state, 8);
}

fn read_data(r: &mut HeaderReader<'_>) -> Result<TransitionData> {
    Ok(TransitionData {
        initial_state: r.uint(8)?,
        event: r.uint(4)? as EventId,
        target_state: r.uint(8)?,
    })
}

fn write_roles(w: &mut HeaderWriter<'_>, roles: &[CommunicationRole], n_controllers: usize) {
    for i in 0..n_controllers {
        w.byte(roles.get(i).copied().unwrap_or_default().to_byte());
    }
}

fn read_roles(r: &mut HeaderReader<'_>, n_controllers: usize) -> Result<Vec<CommunicationRole>> {
    (0..n_controllers)
        .map(|_| {
            let byte = r.byte()?;
            CommunicationRole::from_byte(byte).ok_or_else(|| {
                AutomatonError::MalformedHeader(format!("unknown communication role {byte}"))
            })
        })
        .collect()
}

fn write_set(w: &mut HeaderWriter<'_>, set: &BTreeSet<TransitionData>) {
    w.uint(set.len() as u64, 4);
    for data in set {
        write_data(w, data);
    }
}

fn read_set(r: &mut HeaderReader<'_>) -> Result<BTreeSet<TransitionData>> {
    let n = r.uint(4)?;
    (0..n).map(|_| read_data(r)).collect()
}

fn write_communications(
    w: &mut HeaderWriter<'_>,
    map: &BTreeMap<TransitionData, CommunicationData>,
    n_controllers: usize,
) {
    w.uint(map.len() as u64, 4);
    for (data, communication) in map {
        write_data(w, data);
        write_roles(w, &communication.roles, n_controllers);
    }
}

fn read_communications(
    r: &mut HeaderReader<'_>,
    n_controllers: usize,
) -> Result<BTreeMap<TransitionData, CommunicationData>> {
    let n = r.uint(4)?;
    (0..n)
        .map(|_| {
            let data = read_data(r)?;
            let roles = read_roles(r, n_controllers)?;
            Ok((data, CommunicationData { roles }))
        })
        .collect()
}

impl SpecialTransitionCodec for PlainCodec {
    fn encode(&self, specials: &SpecialTransitions, _n_controllers: usize, out: &mut Vec<u8>) {
        write_set(&mut HeaderWriter::new(out), &specials.bad);
    }

    fn decode(
        &self,
        reader: &mut HeaderReader<'_>,
        _n_controllers: usize,
    ) -> Result<SpecialTransitions> {
        Ok(SpecialTransitions {
            bad: read_set(reader)?,
            ..Default::default()
        })
    }
}

impl SpecialTransitionCodec for UStructureCodec {
    fn encode(&self, specials: &SpecialTransitions, n_controllers: usize, out: &mut Vec<u8>) {
        let mut w = HeaderWriter::new(out);
        write_set(&mut w, &specials.unconditional_violations);
        write_set(&mut w, &specials.conditional_violations);
        write_communications(&mut w, &specials.potential_communications, n_controllers);
        write_communications(&mut w, &specials.invalid_communications, n_controllers);

        w.uint(specials.nash_communications.len() as u64, 4);
        for (data, nash) in &specials.nash_communications {
            write_data(&mut w, data);
            write_roles(&mut w, &nash.roles, n_controllers);
            w.uint(nash.cost.to_bits(), 8);
            w.uint(nash.probability.to_bits(), 8);
        }

        w.uint(specials.disablement_decisions.len() as u64, 4);
        for (data, decision) in &specials.disablement_decisions {
            write_data(&mut w, data);
            for i in 0..n_controllers {
                w.byte(decision.controllers.get(i).copied().unwrap_or(false) as u8);
            }
        }
    }

    fn decode(
        &self,
        r: &mut HeaderReader<'_>,
        n_controllers: usize,
    ) -> Result<SpecialTransitions> {
        let unconditional_violations = read_set(r)?;
        let conditional_violations = read_set(r)?;
        let potential_communications = read_communications(r, n_controllers)?;
        let invalid_communications = read_communications(r, n_controllers)?;

        let n = r.uint(4)?;
        let mut nash_communications = BTreeMap::new();
        for _ in 0..n {
            let data = read_data(r)?;
            let roles = read_roles(r, n_controllers)?;
            let cost = f64::from_bits(r.uint(8)?);
            let probability = f64::from_bits(r.uint(8)?);
            nash_communications.insert(
                data,
                NashCommunicationData {
                    roles,
                    cost,
                    probability,
                },
            );
        }

        let n = r.uint(4)?;
        let mut disablement_decisions = BTreeMap::new();
        for _ in 0..n {
            let data = read_data(r)?;
            let controllers = (0..n_controllers)
                .map(|_| r.flag())
                .collect::<Result<Vec<_>>>()?;
            disablement_decisions.insert(data, DisablementData { controllers });
        }

        Ok(SpecialTransitions {
            bad: BTreeSet::new(),
            unconditional_violations,
            conditional_violations,
            potential_communications,
            invalid_communications,
            nash_communications,
            disablement_decisions,
        })
    }
}
