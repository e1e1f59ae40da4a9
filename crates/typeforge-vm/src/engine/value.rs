//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use typeforge_core::{FieldId, TypeId, TypeKind, TypeSystem};

/// Heap instance of a class or struct type.
#[derive(Debug)]
struct Instance {
    ty: TypeId,
    fields: RefCell<IndexMap<FieldId, Value>>,
}

/// Shared handle to an instance. Equality is identity.
#[derive(Clone)]
pub struct ObjRef(Rc<Instance>);

impl ObjRef {
    /// Allocate an instance of `ty` with every instance field, inherited
    /// ones included, set to its default.
    pub fn alloc(types: &dyn TypeSystem, ty: TypeId) -> Self {
        let mut fields = IndexMap::new();
        for t in types.base_chain(ty).into_iter().rev() {
            for &f in &types.type_def(t).fields {
                let def = types.field(f);
                if !def.is_static {
                    fields.insert(f, Value::default_of(types, def.ty));
                }
            }
        }
        Self(Rc::new(Instance {
            ty,
            fields: RefCell::new(fields),
        }))
    }

    pub fn ty(&self) -> TypeId {
        self.0.ty
    }

    /// Current value of `field`, or `None` if the instance has no such field.
    pub fn get(&self, field: FieldId) -> Option<Value> {
        self.0.fields.borrow().get(&field).cloned()
    }

    /// Overwrite `field`. Returns `false` if the instance has no such field.
    pub fn set(&self, field: FieldId, value: Value) -> bool {
        match self.0.fields.borrow_mut().get_mut(&field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn ptr_eq(&self, other: &ObjRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Field-by-field copy, used for struct assignment.
    fn deep_copy(&self) -> Self {
        let fields = self
            .0
            .fields
            .borrow()
            .iter()
            .map(|(&f, v)| (f, v.copied()))
            .collect();
        Self(Rc::new(Instance {
            ty: self.0.ty,
            fields: RefCell::new(fields),
        }))
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjRef")
            .field("ty", &self.0.ty)
            .field("fields", &self.0.fields.borrow())
            .finish()
    }
}

/// A value on the evaluation stack, in a local, argument or field.
///
/// Struct values are copied whenever they are loaded from storage, so two
/// storage locations never share one.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(Rc<str>),
    Object(ObjRef),
    Struct(ObjRef),
}

impl Value {
    /// Zero value for storage of type `ty`.
    pub fn default_of(types: &dyn TypeSystem, ty: TypeId) -> Value {
        match types.type_def(ty).kind {
            TypeKind::Struct => Value::Struct(ObjRef::alloc(types, ty)),
            _ => match ty {
                TypeId::BOOL => Value::Bool(false),
                TypeId::I32 => Value::I32(0),
                TypeId::I64 => Value::I64(0),
                TypeId::F64 => Value::F64(0.0),
                _ => Value::Null,
            },
        }
    }

    /// The value as it should be read out of storage.
    pub fn copied(&self) -> Value {
        match self {
            Value::Struct(s) => Value::Struct(s.deep_copy()),
            other => other.clone(),
        }
    }

    /// Runtime type, or `None` for null.
    pub fn type_id(&self) -> Option<TypeId> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => TypeId::BOOL,
            Value::I32(_) => TypeId::I32,
            Value::I64(_) => TypeId::I64,
            Value::F64(_) => TypeId::F64,
            Value::Str(_) => TypeId::STR,
            Value::Object(o) | Value::Struct(o) => o.ty(),
        })
    }

    /// The instance behind an object or struct value.
    pub fn instance(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(o) | Value::Struct(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truth value used by `brtrue`/`brfalse`: false, zero and null are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I32(v) => *v != 0,
            Value::I64(v) => *v != 0,
            Value::F64(v) => *v != 0.0,
            Value::Str(_) | Value::Object(_) | Value::Struct(_) => true,
        }
    }

    /// Equality used by `ceq`, `beq` and `Object::Equals`: primitives and
    /// strings by value, objects by identity, structs field by field.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::I32(a), Value::I64(b)) | (Value::I64(b), Value::I32(a)) => i64::from(*a) == *b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Struct(a), Value::Struct(b)) => {
                if a.ty() != b.ty() {
                    return false;
                }
                let fa = a.0.fields.borrow();
                let fb = b.0.fields.borrow();
                fa.len() == fb.len()
                    && fa
                        .iter()
                        .all(|(f, v)| fb.get(f).is_some_and(|w| v.equals(w)))
            }
            _ => false,
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            Value::Bool(_) => "bool".to_owned(),
            Value::I32(_) => "i32".to_owned(),
            Value::I64(_) => "i64".to_owned(),
            Value::F64(_) => "f64".to_owned(),
            Value::Str(_) => "str".to_owned(),
            Value::Object(_) => "object".to_owned(),
            Value::Struct(_) => "struct".to_owned(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}L"),
            Value::F64(v) => write!(f, "{v:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "object#{}", o.ty().index()),
            Value::Struct(o) => write!(f, "struct#{}", o.ty().index()),
        }
    }
}
