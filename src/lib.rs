//! Library for finite automata that are too large to be kept in memory.
//!
//! An [`Automaton`](store::Automaton) lives in a pair of files: a header holding its events,
//! capacities and special transitions, and a body holding one fixed-size record per state. States
//! are read and written one at a time, so the number of states is only bounded by the disk. All
//! ids are stored with the smallest byte width that accommodates the current capacity, which is
//! always of the form `256^k - 1`. When a capacity is exceeded, the body is rebuilt with a wider
//! layout.
//!
//! On top of the store, the crate provides
//! - the automaton algebra in [`operations`]: accessible and co-accessible part, trim, complement,
//!   inversion, intersection and union, each of which builds a new store,
//! - the synchronized composition in [`ustructure`], which builds the U-Structure of an automaton
//!   with several controllers and classifies its transitions as unconditional or conditional
//!   violations. This is used to decide observability and controllability under decentralized
//!   control.
//!
//! Intermediate automata are placed in a [`TempContext`](store::TempContext), which owns a
//! temporary directory.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use automata_store::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        capacity::{Capacities, Layout},
        error::{AutomatonError, Resource, Result},
        math,
        model::{
            CommunicationData, CommunicationRole, DisablementData, Event, EventId, LabelVector,
            NashCommunicationData, State, StateId, Transition, TransitionData,
        },
        operations::DUMP_STATE_LABEL,
        store::{
            Automaton, AutomatonConfig, AutomatonKind, EventAddition, SpecialTransitions,
            StorePaths, TempContext,
        },
    };
}

/// Big-endian encoding of unsigned integers with a given byte width.
pub mod codec;

/// Capacities of a store and the record layout they result in.
pub mod capacity;

/// Errors that can occur when working with stored automata.
pub mod error;

/// Bijective combination of state ids, used to address the states of products.
pub mod id;

/// This module contains some definitions of mathematical objects which are used throughout the
/// crate and do not really fit to the top level.
pub mod math;

/// Events, states and transitions as they are read from and written to a store.
pub mod model;

/// The file-backed automaton store.
pub mod store;

/// Accessible and co-accessible part, trim, complement, inversion, intersection and union.
pub mod operations;

/// Synchronized composition into U-Structures and the checks built on them.
pub mod ustructure;
