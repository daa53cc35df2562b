use crate::store::special::{PlainCodec, SpecialTransitionCodec, UStructureCodec};

/// The kind of an automaton. This is a closed set, each kind determines which tables of
/// special transitions are stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AutomatonKind {
    /// A plain automaton, which may carry bad transitions.
    #[default]
    Plain,
    /// The result of synchronized composition.
    UStructure,
    /// A U-Structure that has been pruned with respect to a communication protocol.
    PrunedUStructure,
    /// The crush of a U-Structure.
    Crush,
}

impl AutomatonKind {
    /// Byte used in the header file.
    pub fn to_byte(self) -> u8 {
        match self {
            AutomatonKind::Plain => 0,
            AutomatonKind::UStructure => 1,
            AutomatonKind::PrunedUStructure => 2,
            AutomatonKind::Crush => 3,
        }
    }

    /// Decodes the kind from its header byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(AutomatonKind::Plain),
            1 => Some(AutomatonKind::UStructure),
            2 => Some(AutomatonKind::PrunedUStructure),
            3 => Some(AutomatonKind::Crush),
            _ => None,
        }
    }

    /// Whether this kind is a U-Structure or derived from one.
    pub fn is_ustructure(self) -> bool {
        !matches!(self, AutomatonKind::Plain)
    }

    /// The codec that (de)serializes the special transition tables of this kind.
    pub(crate) fn codec(self) -> &'static dyn SpecialTransitionCodec {
        match self {
            AutomatonKind::Plain => &PlainCodec,
            AutomatonKind::UStructure | AutomatonKind::PrunedUStructure | AutomatonKind::Crush => {
                &UStructureCodec
            }
        }
    }
}
