//! Constant loading.
//!
//! A `ConstantRegistry` maps value types to loaders that emit "push this
//! constant" sequences. Registries are immutable snapshots extended by
//! copy-on-write, so build sessions running in parallel never observe each
//! other's registrations.

mod constant;
mod loader;
mod registry;


pub use constant::Constant;
pub use loader::{CompositeLoader, ConstantLoader, LoadCtx, PrimitiveLoader};
pub use registry::{ConstantRegistry, LoadOutcome, Strategy};
