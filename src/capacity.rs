//! The capacity model decides how wide event and state ids are encoded and how large a
//! single state record in the body file is.
//!
//! Event and state capacities are always of the form `256^k - 1`, where `k` is the number
//! of bytes used to encode an id of the respective kind. Transition capacity (per state) and
//! label length are stored as requested, after clamping them into their valid ranges.

use tracing::debug;

use crate::error::{AutomatonError, Resource, Result};

/// The longest label a state may carry, measured in bytes.
pub const MAX_LABEL_LENGTH: u32 = 100;
/// The largest number of controllers an automaton may have.
pub const MAX_CONTROLLERS: usize = 10;
/// Largest possible event capacity, event ids are 32 bit integers.
pub const MAX_EVENT_CAPACITY: u64 = u32::MAX as u64;
/// Largest possible state capacity, state ids are 64 bit integers.
pub const MAX_STATE_CAPACITY: u64 = u64::MAX;
/// Largest possible number of outgoing transitions of a single state.
pub const MAX_TRANSITION_CAPACITY: u64 = u32::MAX as u64;

/// Natural width of an event id.
pub const EVENT_ID_MAX_WIDTH: usize = 4;
/// Natural width of a state id.
pub const STATE_ID_MAX_WIDTH: usize = 8;

/// Computes the smallest width `k` (in bytes) such that `256^k - 1 >= requested`, together
/// with the capacity `256^k - 1` that this width provides. If `requested` cannot be represented
/// with at most `max_width` bytes, the capacity is clamped to the largest value of that width.
pub fn capacity_for(requested: u64, max_width: usize) -> (u64, usize) {
    let mut width = 1;
    while width < max_width {
        let capacity = (1u64 << (8 * width)) - 1;
        if capacity >= requested {
            return (capacity, width);
        }
        width += 1;
    }
    (max_for_width(max_width), max_width)
}

fn max_for_width(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * width)) - 1
    }
}

/// Requested (or effective) capacities of an automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capacities {
    /// Number of events the automaton can hold.
    pub events: u32,
    /// Largest state id the automaton can hold.
    pub states: u64,
    /// Number of outgoing transitions a single state can hold.
    pub transitions: u32,
    /// Maximal length of a state label in bytes.
    pub label_length: u32,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            events: 255,
            states: 255,
            transitions: 1,
            label_length: 1,
        }
    }
}

/// The fixed layout of a body file, derived from a set of [`Capacities`].
///
/// A state record consists of one flag byte, followed by the zero padded label and
/// `transitions` slots, each made up of an event id and a target state id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    capacities: Capacities,
    event_id_width: usize,
    state_id_width: usize,
}

impl Layout {
    /// Normalizes the given capacities and computes the resulting layout. Event and state
    /// capacities are rounded up to the next value of the form `256^k - 1`, the transition
    /// capacity is at least one and the label length lies in `1..=MAX_LABEL_LENGTH`.
    pub fn new(requested: Capacities) -> Self {
        let (events, event_id_width) = capacity_for(requested.events as u64, EVENT_ID_MAX_WIDTH);
        let (states, state_id_width) = capacity_for(requested.states, STATE_ID_MAX_WIDTH);
        Self {
            capacities: Capacities {
                events: events as u32,
                states,
                transitions: requested.transitions.max(1),
                label_length: requested.label_length.clamp(1, MAX_LABEL_LENGTH),
            },
            event_id_width,
            state_id_width,
        }
    }

    /// The effective capacities.
    pub fn capacities(&self) -> Capacities {
        self.capacities
    }

    /// Number of bytes used to encode an event id.
    pub fn event_id_width(&self) -> usize {
        self.event_id_width
    }

    /// Number of bytes used to encode a state id.
    pub fn state_id_width(&self) -> usize {
        self.state_id_width
    }

    /// Maximal label length in bytes.
    pub fn label_length(&self) -> usize {
        self.capacities.label_length as usize
    }

    /// Number of transition slots per record.
    pub fn transition_capacity(&self) -> usize {
        self.capacities.transitions as usize
    }

    /// Size of a single transition slot.
    pub fn slot_size(&self) -> usize {
        self.event_id_width + self.state_id_width
    }

    /// Offset of the first transition slot within a record.
    pub fn transitions_offset(&self) -> usize {
        1 + self.label_length()
    }

    /// Size of a single state record in bytes.
    pub fn record_size(&self) -> usize {
        self.transitions_offset() + self.transition_capacity() * self.slot_size()
    }

    /// The largest state id whose record ends within the 64 bit offset range of a file.
    pub fn max_addressable_state(&self) -> u64 {
        u64::MAX / self.record_size() as u64
    }

    /// Byte offset of the record of state `id` in the body file. Ids start at one. Fails if the
    /// record of `id` cannot be addressed with this layout.
    pub fn record_offset(&self, id: u64) -> Result<u64> {
        if id == 0 {
            return Err(AutomatonError::InvalidStateId(id));
        }
        if id > self.max_addressable_state() {
            return Err(AutomatonError::CapacityExceeded {
                resource: Resource::States,
                requested: id,
                maximum: self.max_addressable_state(),
            });
        }
        Ok((id - 1) * self.record_size() as u64)
    }

    /// Returns true if the current layout can hold `n` events.
    pub fn fits_events(&self, n: u64) -> bool {
        n <= self.capacities.events as u64
    }

    /// Returns true if a state with the given id can be stored.
    pub fn fits_state(&self, id: u64) -> bool {
        id <= self.capacities.states
    }

    /// Returns true if a single state may carry `n` transitions.
    pub fn fits_transitions(&self, n: u64) -> bool {
        n <= self.capacities.transitions as u64
    }

    /// Returns true if a label of `len` bytes fits into a record.
    pub fn fits_label(&self, len: usize) -> bool {
        len <= self.label_length()
    }

    /// Computes the layout that is able to hold `n` events.
    pub fn grown_for_events(&self, n: u64) -> Result<Self> {
        if n > MAX_EVENT_CAPACITY {
            return Err(AutomatonError::CapacityExceeded {
                resource: Resource::Events,
                requested: n,
                maximum: MAX_EVENT_CAPACITY,
            });
        }
        let grown = Self::new(Capacities {
            events: n as u32,
            ..self.capacities
        });
        debug!(
            "growing event capacity from {} to {}",
            self.capacities.events, grown.capacities.events
        );
        Ok(grown)
    }

    /// Computes the layout that is able to hold a state with id `id`.
    pub fn grown_for_state(&self, id: u64) -> Self {
        let grown = Self::new(Capacities {
            states: id,
            ..self.capacities
        });
        debug!(
            "growing state capacity from {} to {}",
            self.capacities.states, grown.capacities.states
        );
        grown
    }

    /// Computes the layout in which a single state can hold `n` transitions. The capacity is
    /// at least doubled, so a long series of insertions only triggers few rebuilds.
    pub fn grown_for_transitions(&self, n: u64) -> Result<Self> {
        if n > MAX_TRANSITION_CAPACITY {
            return Err(AutomatonError::CapacityExceeded {
                resource: Resource::Transitions,
                requested: n,
                maximum: MAX_TRANSITION_CAPACITY,
            });
        }
        let doubled = (self.capacities.transitions as u64).saturating_mul(2);
        let transitions = n.max(doubled).min(MAX_TRANSITION_CAPACITY) as u32;
        debug!(
            "growing transition capacity from {} to {}",
            self.capacities.transitions, transitions
        );
        Ok(Self::new(Capacities {
            transitions,
            ..self.capacities
        }))
    }

    /// Computes the layout in which labels of `len` bytes fit.
    pub fn grown_for_label(&self, len: usize) -> Result<Self> {
        if len > MAX_LABEL_LENGTH as usize {
            return Err(AutomatonError::CapacityExceeded {
                resource: Resource::LabelLength,
                requested: len as u64,
                maximum: MAX_LABEL_LENGTH as u64,
            });
        }
        debug!(
            "growing label length from {} to {}",
            self.capacities.label_length, len
        );
        Ok(Self::new(Capacities {
            label_length: len as u32,
            ..self.capacities
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capacities_are_powers_of_256_minus_one() {
        assert_eq!(capacity_for(0, 8), (255, 1));
        assert_eq!(capacity_for(255, 8), (255, 1));
        assert_eq!(capacity_for(256, 8), (65_535, 2));
        assert_eq!(capacity_for(65_536, 8), (16_777_215, 3));
        assert_eq!(capacity_for(u32::MAX as u64, 4), (u32::MAX as u64, 4));
        assert_eq!(capacity_for(u32::MAX as u64 + 1, 4), (u32::MAX as u64, 4));
        assert_eq!(
            capacity_for(MAX_STATE_CAPACITY, STATE_ID_MAX_WIDTH),
            (MAX_STATE_CAPACITY, 8)
        );
        assert_eq!(
            capacity_for(1 << 56, STATE_ID_MAX_WIDTH),
            (MAX_STATE_CAPACITY, 8)
        );
    }

    #[test]
    fn layout_normalizes_requests() {
        let layout = Layout::new(Capacities {
            events: 300,
            states: 10,
            transitions: 0,
            label_length: 1000,
        });
        let caps = layout.capacities();
        assert_eq!(caps.events, 65_535);
        assert_eq!(caps.states, 255);
        assert_eq!(caps.transitions, 1);
        assert_eq!(caps.label_length, MAX_LABEL_LENGTH);
        assert_eq!(layout.event_id_width(), 2);
        assert_eq!(layout.state_id_width(), 1);
        assert_eq!(layout.record_size(), 1 + 100 + 3);
    }

    #[test]
    fn record_offsets() {
        let layout = Layout::new(Capacities {
            transitions: 2,
            label_length: 3,
            ..Default::default()
        });
        assert_eq!(layout.record_size(), 1 + 3 + 2 * 2);
        assert_eq!(layout.record_offset(1).unwrap(), 0);
        assert_eq!(layout.record_offset(4).unwrap(), 24);
        assert!(matches!(
            layout.record_offset(0),
            Err(AutomatonError::InvalidStateId(0))
        ));

        let wide = layout.grown_for_state(MAX_STATE_CAPACITY);
        let last = wide.max_addressable_state();
        assert_eq!(
            wide.record_offset(last).unwrap(),
            (last - 1) * wide.record_size() as u64
        );
        assert!(matches!(
            wide.record_offset(last + 1),
            Err(AutomatonError::CapacityExceeded {
                resource: Resource::States,
                ..
            })
        ));
        assert!(wide.record_offset(u64::MAX).is_err());
    }

    #[test]
    fn growth_is_exact() {
        let layout = Layout::new(Capacities::default());
        assert!(layout.fits_state(255));
        assert!(!layout.fits_state(256));
        let grown = layout.grown_for_state(256);
        assert_eq!(grown.capacities().states, 65_535);
        assert_eq!(grown.state_id_width(), 2);

        let grown = layout.grown_for_events(256).unwrap();
        assert_eq!(grown.capacities().events, 65_535);
        assert_eq!(grown.event_id_width(), 2);
    }

    #[test]
    fn transition_growth_doubles() {
        let layout = Layout::new(Capacities {
            transitions: 3,
            ..Default::default()
        });
        assert_eq!(layout.grown_for_transitions(4).unwrap().transition_capacity(), 6);
        assert_eq!(layout.grown_for_transitions(10).unwrap().transition_capacity(), 10);
        assert!(matches!(
            layout.grown_for_transitions(MAX_TRANSITION_CAPACITY + 1),
            Err(AutomatonError::CapacityExceeded {
                resource: Resource::Transitions,
                ..
            })
        ));
    }

    #[test]
    fn overlong_labels_are_rejected() {
        let layout = Layout::new(Capacities::default());
        assert_eq!(layout.grown_for_label(7).unwrap().label_length(), 7);
        assert!(layout.grown_for_label(MAX_LABEL_LENGTH as usize + 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_capacity_is_minimal(requested in 0u64..(1u64 << 48)) {
            let (capacity, width) = capacity_for(requested, 8);
            prop_assert!(capacity >= requested);
            prop_assert_eq!(capacity, (1u64 << (8 * width)) - 1);
            if width > 1 {
                prop_assert!((1u64 << (8 * (width - 1))) - 1 < requested);
            }
        }
    }
}
