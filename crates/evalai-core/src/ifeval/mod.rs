//! Verifiable instruction-following checks.
//!
//! - `checkers`: the instruction predicates
//! - `registry`: instruction ids, argument names, checker construction
//! - `conflicts`: which instructions may not share an instance
//! - `language`: response-language identification used by some checkers

pub mod checkers;
pub mod conflicts;
pub mod language;
pub mod registry;

pub use checkers::{Instruction, Relation};
pub use conflicts::{conflict_registry, conflicts, find_conflict, symmetrize, ConflictTable};
pub use registry::{build_instruction, is_known, normalize_kwargs, InstructionError, INSTRUCTION_IDS};
