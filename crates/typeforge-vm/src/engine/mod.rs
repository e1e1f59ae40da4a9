//! Execution engine.

mod error;
mod frame;
mod trace;
mod value;
mod vm;

#[cfg(test)]
mod exec_tests;

pub use error::RuntimeError;
pub use trace::{NoopTracer, PrintTracer, Tracer};
pub use value::{ObjRef, Value};
pub use vm::{FuelLimits, NativeFn, Vm};
