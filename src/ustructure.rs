//! U-Structures and the properties of decentralized control that are decided with them.
//!
//! A U-Structure is built from a plain automaton with `n` controllers by
//! [`Automaton::synchronized_composition`]. Each of its states is a tuple of `n + 1` states of
//! the plant: the first component tracks the plant itself, the others track what the respective
//! controller believes the plant to be in. Its events are vectors `<e0,e1,...,en>` in which a
//! controller's slot is `*` if it does not take part.

use tracing::debug;

use crate::{
    error::{AutomatonError, Result},
    store::{Automaton, AutomatonKind, TempContext},
};

mod composition;

impl Automaton {
    fn require_ustructure(&self) -> Result<()> {
        if self.kind().is_ustructure() {
            Ok(())
        } else {
            Err(AutomatonError::WrongKind {
                expected: AutomatonKind::UStructure,
                found: self.kind(),
            })
        }
    }

    /// Whether the U-Structure contains an unconditional violation. If it does, the plant it was
    /// built from is not observable.
    pub fn has_violations(&self) -> Result<bool> {
        self.require_ustructure()?;
        Ok(!self.special_transitions().unconditional_violations.is_empty())
    }

    /// Number of conditional violations in the U-Structure.
    pub fn count_conditional_violations(&self) -> Result<usize> {
        self.require_ustructure()?;
        Ok(self.special_transitions().conditional_violations.len())
    }

    /// Number of unconditional violations in the U-Structure.
    pub fn count_unconditional_violations(&self) -> Result<usize> {
        self.require_ustructure()?;
        Ok(self.special_transitions().unconditional_violations.len())
    }

    /// Decides observability of a plain automaton by building its U-Structure in `ctx` and
    /// checking it for unconditional violations. The U-Structure is deleted afterwards. An
    /// automaton without an initial state is trivially observable.
    pub fn test_observability(&self, ctx: &mut TempContext) -> Result<bool> {
        let Some(ustructure) = self.synchronized_composition(ctx.next_paths()?)? else {
            return Ok(true);
        };
        let observable = !ustructure.has_violations()?;
        ustructure.delete()?;
        debug!("observability test: {observable}");
        Ok(observable)
    }

    /// Decides controllability of a plain automaton: every bad transition must be labelled with
    /// an event that at least one controller can disable.
    pub fn test_controllability(&self) -> Result<bool> {
        if self.kind() != AutomatonKind::Plain {
            return Err(AutomatonError::WrongKind {
                expected: AutomatonKind::Plain,
                found: self.kind(),
            });
        }
        for bad in &self.special_transitions().bad {
            let controllable = self
                .event(bad.event)
                .is_some_and(|event| event.is_controllable());
            if !controllable {
                debug!("bad transition {bad} cannot be disabled");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
