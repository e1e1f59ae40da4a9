//! Reference interpreter for typeforge method bodies.
//!
//! Executes a `Module` against the `TypeSystem` it was built with. Used to
//! check that lowered control flow behaves as written: loops, protected
//! regions, dispatch and exception propagation.

#![allow(clippy::comparison_chain)]

pub mod engine;

pub use engine::{
    FuelLimits, NativeFn, NoopTracer, ObjRef, PrintTracer, RuntimeError, Tracer, Value, Vm,
};
