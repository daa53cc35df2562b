use std::cmp::Ordering;

use itertools::Itertools;

use crate::model::EventId;

/// The label used in a [`LabelVector`] for a component that does not take part in an event.
pub const NON_PARTICIPATING: &str = "*";

/// An event of an automaton.
///
/// Two events describe the same event iff their labels coincide (see [`Event::same_label`]),
/// whereas they are ordered by their ids (see [`Event::cmp_by_id`]). The store relies on the former
/// for deduplication and on the latter for iteration order, which is why neither `PartialEq` nor
/// `Ord` are implemented.
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    label: String,
    observable: Vec<bool>,
    controllable: Vec<bool>,
}

impl Event {
    /// Creates a new event. Both masks have one entry per controller.
    pub fn new(
        id: EventId,
        label: impl Into<String>,
        observable: Vec<bool>,
        controllable: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(observable.len(), controllable.len());
        Self {
            id,
            label: label.into(),
            observable,
            controllable,
        }
    }

    /// The (1-based) id of the event.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The label of the event.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Observability of the event, one entry per controller.
    pub fn observable(&self) -> &[bool] {
        &self.observable
    }

    /// Controllability of the event, one entry per controller.
    pub fn controllable(&self) -> &[bool] {
        &self.controllable
    }

    /// Whether the controller with the given (0-based) index observes this event.
    pub fn is_observable_by(&self, controller: usize) -> bool {
        self.observable.get(controller).copied().unwrap_or(false)
    }

    /// Whether the controller with the given (0-based) index controls this event.
    pub fn is_controllable_by(&self, controller: usize) -> bool {
        self.controllable.get(controller).copied().unwrap_or(false)
    }

    /// Whether at least one controller is able to disable this event.
    pub fn is_controllable(&self) -> bool {
        self.controllable.iter().any(|c| *c)
    }

    /// Label equality, this is what makes two events "the same".
    pub fn same_label(&self, other: &Event) -> bool {
        self.label == other.label
    }

    /// Id based ordering, used to iterate over events.
    pub fn cmp_by_id(&self, other: &Event) -> Ordering {
        self.id.cmp(&other.id)
    }

    /// Whether both events agree on their observability and controllability masks.
    pub fn same_properties(&self, other: &Event) -> bool {
        self.observable == other.observable && self.controllable == other.controllable
    }

    /// Attempts to decompose the label into a [`LabelVector`].
    pub fn vector(&self) -> Option<LabelVector> {
        LabelVector::parse(&self.label)
    }
}

/// A decomposed event label of the form `<l1,l2,...,lk>` as produced by product constructions.
/// A component that does not participate in the event is represented by `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelVector(Vec<Option<String>>);

impl LabelVector {
    /// Builds a vector from its components, `None` stands for a non-participating component.
    pub fn new(components: Vec<Option<String>>) -> Self {
        Self(components)
    }

    /// Parses a label of the form `<l1,...,lk>`. Returns `None` if the label is not a vector.
    pub fn parse(label: &str) -> Option<Self> {
        let inner = label.strip_prefix('<')?.strip_suffix('>')?;
        if inner.is_empty() {
            return None;
        }
        Some(Self(
            inner
                .split(',')
                .map(|part| (part != NON_PARTICIPATING).then(|| part.to_string()))
                .collect(),
        ))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the vector has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The label at position `i`, if the component participates.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.0.get(i).and_then(|c| c.as_deref())
    }

    /// Whether the `i`-th component takes part in the event.
    pub fn participates(&self, i: usize) -> bool {
        self.get(i).is_some()
    }

    /// Iterates over the components.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|c| c.as_deref())
    }

    /// Renders the vector back into a label.
    pub fn to_label(&self) -> String {
        format!(
            "<{}>",
            self.0
                .iter()
                .map(|c| c.as_deref().unwrap_or(NON_PARTICIPATING))
                .join(",")
        )
    }
}

impl std::fmt::Display for LabelVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_label())
    }
}
