#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Host type system for types created at run time.
//!
//! Two layers:
//! - **Definition layer**: `TypeRegistry` owns type, field, method and property tables
//!   and is the only place that mutates them.
//! - **Query layer**: the `TypeSystem` trait, which the emitter and the VM consume.
//!   Member lookup, assignability and the exception-family predicate are provided
//!   methods built on a handful of table accessors.
//!
//! Member descriptors handed out by the query layer (`FieldRef`, `MethodRef`,
//! `PropertyRef`) are plain `Copy` snapshots: once resolved they are read-only data.

mod error;
mod interner;
mod members;
mod registry;
mod system;
mod types;


pub use error::TypeError;
pub use interner::{Interner, Symbol};
pub use members::{FieldRef, MemberRef, MethodRef, PropertyRef};
pub use registry::TypeRegistry;
pub use system::TypeSystem;
pub use types::{
    FieldDef, FieldId, MethodDef, MethodId, MethodKind, MethodSig, Primitive, PropertyDef,
    PropertyId, TypeDef, TypeId, TypeKind,
};

/// Result type for type-system queries.
pub type Result<T> = std::result::Result<T, TypeError>;
