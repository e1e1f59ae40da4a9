use std::fmt;

use serde::{Deserialize, Serialize};

use typeforge_core::TypeId;

/// A compile-time value to be materialized by a `ConstantLoader`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(String),
    /// Value of a user-defined type, given as its constructor arguments.
    Composite { ty: TypeId, fields: Vec<Constant> },
}

impl Constant {
    /// The type this value has on its own. `None` for `Null`, whose type
    /// cannot be inferred.
    pub fn natural_type(&self) -> Option<TypeId> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeId::BOOL),
            Self::I32(_) => Some(TypeId::I32),
            Self::I64(_) => Some(TypeId::I64),
            Self::F64(_) => Some(TypeId::F64),
            Self::Str(_) => Some(TypeId::STR),
            Self::Composite { ty, .. } => Some(*ty),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `Null` or a composite with no constructor arguments.
    pub(crate) fn is_default(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Composite { fields, .. } => fields.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}L"),
            Self::F64(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Composite { fields, .. } => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Constant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Constant {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for Constant {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}
