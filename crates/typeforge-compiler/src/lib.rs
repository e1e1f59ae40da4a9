//! Typeforge compiler: lowers structured control flow into method bodies.
//!
//! Layers, leaves first:
//! - `emit` - flat assembler with labels, locals, protected regions and stack simulation
//! - `constants` - type-keyed strategies for pushing constant values
//! - `access` - the single decision point for pushing `this` before a member access
//! - `codegen` - `if`/`for`/`foreach`/`using`/`try` builders over the emitter
//! - `build` - type construction: fields, constructors, methods and property skeletons

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod access;
pub mod build;
pub mod codegen;
pub mod config;
pub mod constants;
pub mod emit;

#[cfg(test)]
pub mod test_utils;

pub use access::{Access, Receiver, resolve_access};
pub use build::{MethodBuildInfo, PropertyBuildInfo, TypeBuilder};
pub use codegen::{BodyBuilder, CatchArm, CatchScope, ForRange, LoopScope, MethodContext};
pub use config::EmitConfig;
pub use constants::{
    CompositeLoader, Constant, ConstantLoader, ConstantRegistry, LoadCtx, LoadOutcome,
    PrimitiveLoader, Strategy,
};
pub use emit::{Block, EmitError, Emitter};

/// Result type for emission and construction.
pub type Result<T> = std::result::Result<T, EmitError>;
