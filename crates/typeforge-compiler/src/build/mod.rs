//! Type construction on top of the body builder.
//!
//! `TypeBuilder` declares members in the registry and fills their bodies into
//! a `Module`, one `BodyBuilder` per method.

mod type_builder;


pub use type_builder::{MethodBuildInfo, PropertyBuildInfo, TypeBuilder};
