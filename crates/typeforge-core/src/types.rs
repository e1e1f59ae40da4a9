//! Type and member tables.

use serde::{Deserialize, Serialize};

use crate::interner::Symbol;

// ============================================================================
// Handles
// ============================================================================

/// Index into the registry's type table.
///
/// The first entries are seeded by `TypeRegistry::new()` in a fixed order,
/// so the well-known types have constant ids.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const I32: TypeId = TypeId(2);
    pub const I64: TypeId = TypeId(3);
    pub const F64: TypeId = TypeId(4);
    pub const STR: TypeId = TypeId(5);
    pub const OBJECT: TypeId = TypeId(6);
    /// Root of the exception family.
    pub const EXCEPTION: TypeId = TypeId(7);
    pub const INVALID_OPERATION: TypeId = TypeId(8);
    pub const ARGUMENT: TypeId = TypeId(9);
    pub const DISPOSABLE: TypeId = TypeId(10);
    pub const ENUMERATOR: TypeId = TypeId(11);
    pub const ENUMERABLE: TypeId = TypeId(12);

    /// Number of ids reserved for well-known types.
    pub(crate) const WELL_KNOWN: u32 = 13;

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

macro_rules! member_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

member_id!(
    /// Index into the registry's field table.
    FieldId
);
member_id!(
    /// Index into the registry's method table. Constructors and accessors are methods.
    MethodId
);
member_id!(
    /// Index into the registry's property table.
    PropertyId
);

// ============================================================================
// Type definitions
// ============================================================================

/// Built-in scalar types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Primitive {
    Void,
    Bool,
    I32,
    I64,
    F64,
    Str,
}

impl Primitive {
    /// Whether values of this primitive are copied rather than referenced.
    pub fn is_value(self) -> bool {
        !matches!(self, Self::Void | Self::Str)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::Str => "str",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TypeKind {
    Primitive(Primitive),
    Class,
    /// Value aggregate: copied on assignment, never null.
    Struct,
    Interface,
}

#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: Symbol,
    pub kind: TypeKind,
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    pub properties: Vec<PropertyId>,
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: Symbol,
    pub declaring: TypeId,
    pub ty: TypeId,
    pub is_static: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MethodKind {
    Normal,
    Constructor,
    Getter,
    Setter,
}

#[derive(Clone, Debug)]
pub struct MethodDef {
    pub name: Symbol,
    pub declaring: TypeId,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub kind: MethodKind,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    /// Base or interface method this one replaces in dispatch.
    pub overrides: Option<MethodId>,
}

#[derive(Clone, Debug)]
pub struct PropertyDef {
    pub name: Symbol,
    pub declaring: TypeId,
    pub ty: TypeId,
    pub is_static: bool,
    pub getter: Option<MethodId>,
    pub setter: Option<MethodId>,
}

// ============================================================================
// Method signatures
// ============================================================================

/// Signature used to declare a method on a type under construction.
#[derive(Clone, Debug)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    pub kind: MethodKind,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub overrides: Option<MethodId>,
}

impl MethodSig {
    /// Instance method with no parameters.
    pub fn new(name: impl Into<String>, ret: TypeId) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret,
            kind: MethodKind::Normal,
            is_static: false,
            is_virtual: false,
            is_abstract: false,
            overrides: None,
        }
    }

    /// Instance constructor taking `params`.
    pub fn constructor(params: impl IntoIterator<Item = TypeId>) -> Self {
        Self::new(".ctor", TypeId::VOID)
            .params(params)
            .kind(MethodKind::Constructor)
    }

    pub fn param(mut self, ty: TypeId) -> Self {
        self.params.push(ty);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = TypeId>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn make_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn make_virtual(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Abstract methods are virtual and have no body.
    pub fn make_abstract(mut self) -> Self {
        self.is_virtual = true;
        self.is_abstract = true;
        self
    }

    pub fn overriding(mut self, base: MethodId) -> Self {
        self.is_virtual = true;
        self.overrides = Some(base);
        self
    }
}
