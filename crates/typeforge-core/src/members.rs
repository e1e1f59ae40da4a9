//! Member references: immutable descriptors resolved from the type tables.

use crate::types::{FieldId, MethodId, MethodKind, PropertyId, TypeId};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub id: FieldId,
    pub declaring: TypeId,
    pub ty: TypeId,
    pub is_static: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub id: MethodId,
    pub declaring: TypeId,
    /// Declared parameter count, excluding the receiver.
    pub arity: u16,
    pub ret: TypeId,
    pub kind: MethodKind,
    pub is_static: bool,
    pub is_virtual: bool,
}

impl MethodRef {
    #[inline]
    pub fn returns_value(&self) -> bool {
        self.ret != TypeId::VOID
    }

    #[inline]
    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PropertyRef {
    pub id: PropertyId,
    pub declaring: TypeId,
    pub ty: TypeId,
    pub is_static: bool,
    pub getter: Option<MethodId>,
    pub setter: Option<MethodId>,
}

/// Any member that can be loaded, stored or invoked.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MemberRef {
    Field(FieldRef),
    Property(PropertyRef),
    Method(MethodRef),
}

impl MemberRef {
    pub fn is_static(&self) -> bool {
        match self {
            Self::Field(f) => f.is_static,
            Self::Property(p) => p.is_static,
            Self::Method(m) => m.is_static,
        }
    }

    pub fn declaring(&self) -> TypeId {
        match self {
            Self::Field(f) => f.declaring,
            Self::Property(p) => p.declaring,
            Self::Method(m) => m.declaring,
        }
    }
}

impl From<FieldRef> for MemberRef {
    fn from(field: FieldRef) -> Self {
        Self::Field(field)
    }
}

impl From<PropertyRef> for MemberRef {
    fn from(property: PropertyRef) -> Self {
        Self::Property(property)
    }
}

impl From<MethodRef> for MemberRef {
    fn from(method: MethodRef) -> Self {
        Self::Method(method)
    }
}
