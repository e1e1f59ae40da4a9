//! Instruction set and method-body format for typeforge.
//!
//! This crate contains:
//! - Symbolic handles (`Label`, `Local`) scoped to one emission session
//! - The `Instruction` enum, generic over its branch-target representation
//! - Finalized method bodies with exception-handler tables
//! - A disassembler used for debugging and snapshot tests

#![allow(clippy::comparison_chain)]

mod body;
mod dump;
mod ids;
mod instruction;
mod module;


pub use body::{ExceptionHandler, HandlerKind, MethodBody, Target};
pub use dump::{dump, dump_module, format_instruction};
pub use ids::{Label, Local, SessionId};
pub use instruction::{Instruction, InstructionIR};
pub use module::Module;
