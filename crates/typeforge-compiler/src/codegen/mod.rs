//! Structured control flow over the emitter.
//!
//! `BodyBuilder` owns one `Emitter` and lowers blocks (`if`, loops,
//! `using`, `try`) into labels, branches and protected regions. Every block
//! body is a callback that receives the builder back, so blocks nest freely.
//! - `body.rs` - the builder, primitives and member access
//! - `control.rs` - conditionals and loops
//! - `protect.rs` - protected regions: `try`, `using`, `foreach`, `throw`

mod body;
mod control;
mod protect;

#[cfg(test)]
mod balance_tests;
#[cfg(test)]
mod protect_tests;

pub use body::{BodyBuilder, MethodContext};
pub use control::{ForRange, LoopScope};
pub use protect::{CatchArm, CatchScope};
