//! Incremental difference-logic decision procedure.
//!
//! `dlnet` decides conjunctions of atoms of the form `x - y <= c` (and the
//! degenerate shapes `x <= y`, `x <= c`, `c <= x`) over integer or rational
//! variables, as a theory plugin behind a DPLL(T)-style SAT engine. It
//! supports:
//!  - incremental assertion and retraction of atoms, with feasibility
//!    checking by Cotton-Maler-style potential repair and negative-cycle
//!    explanations,
//!  - theory propagation: enumeration of unassigned atoms entailed by the
//!    asserted ones, with eager or lazily reconstructed reasons,
//!  - chronological backtracking through decision-level markers.
//!
//! The expected driver loop declares atoms with [DlTheory::declare], asserts
//! and retracts them with [DlTheory::assert_lit] / [Backtrack] as the
//! Boolean search proceeds, and drains entailed literals with
//! [DlTheory::deduce].

pub mod backtrack;
pub mod collections;
pub mod env;
pub mod num;
pub mod theory;

pub use backtrack::Backtrack;
pub use num::{Step, Weight};
pub use theory::atoms::{AtomId, LeqAtom, Operand, VarLabel};
pub use theory::graph::{AtomRecording, AtomState};
pub use theory::{Deduction, DlConfig, DlTheory, Explanation, Interrupter, Logic, TheoryStatus};

use thiserror::Error;

/// Failures of the core that are not theory conflicts. A conflicting
/// assertion is reported through [TheoryStatus::Inconsistent], not here.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum DlError {
    /// The atom does not canonicalize to a difference-logic shape. Atoms are
    /// expected to arrive pre-canonicalized, so this indicates a caller bug.
    #[error("atom does not canonicalize to a difference-logic shape")]
    MalformedAtom,
    /// The operation was cancelled through an [Interrupter]; all partial
    /// mutations have been rolled back.
    #[error("operation interrupted")]
    Interrupted,
}
