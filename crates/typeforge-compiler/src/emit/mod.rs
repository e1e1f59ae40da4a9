//! Instruction emission.
//!
//! The emitter is a flat assembler: it knows about labels, locals and
//! protected regions, but nothing about structured control flow. Stack
//! balance and region discipline are checked as instructions are appended.

mod emitter;
mod error;

#[cfg(test)]
mod region_tests;

pub use emitter::{Block, Emitter};
pub use error::EmitError;
