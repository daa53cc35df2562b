//! Transformations of automata. Every operation reads one or two stores and builds its result in
//! a new store, the inputs are never modified.

use crate::{error::Result, math::Map, model::EventId, store::Automaton};

mod complement;
pub use complement::DUMP_STATE_LABEL;

mod invert;

mod product;

mod reachability;

/// Adds all events of `from` to `to`, in order. If `to` is empty, event ids are preserved.
fn copy_events(from: &Automaton, to: &mut Automaton) -> Result<Map<EventId, EventId>> {
    let mut mapping = Map::default();
    for event in from.events() {
        let id = to.add_event(event.label(), event.observable(), event.controllable())?;
        mapping.insert(event.id(), id);
    }
    Ok(mapping)
}
