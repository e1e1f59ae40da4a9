//! Loader trait and the built-in loaders.

use typeforge_bytecode::Instruction;
use typeforge_core::{MethodKind, Primitive, TypeError, TypeId, TypeSystem};

use crate::Result;
use crate::emit::{EmitError, Emitter};

use super::constant::Constant;
use super::registry::ConstantRegistry;

/// Everything a loader may use while emitting.
pub struct LoadCtx<'a> {
    pub em: &'a mut Emitter,
    pub types: &'a dyn TypeSystem,
    /// The registry the loader was found in, for nested values.
    pub constants: &'a ConstantRegistry,
}

/// Strategy for pushing constants of one exact type.
pub trait ConstantLoader: Send + Sync {
    /// The type this loader claims.
    fn ty(&self) -> TypeId;

    /// Emit instructions that push `value`. Must leave exactly one value on
    /// the stack.
    fn load(&self, cx: &mut LoadCtx<'_>, value: &Constant) -> Result<()>;
}

fn mismatch(cx: &LoadCtx<'_>, ty: TypeId, value: &Constant) -> EmitError {
    EmitError::ConstantTypeMismatch {
        ty: cx.types.type_name(ty).to_owned(),
        value: value.to_string(),
    }
}

/// Loader for the scalar primitives and strings.
#[derive(Clone, Copy, Debug)]
pub struct PrimitiveLoader {
    primitive: Primitive,
}

impl PrimitiveLoader {
    pub fn new(primitive: Primitive) -> Self {
        Self { primitive }
    }
}

impl ConstantLoader for PrimitiveLoader {
    fn ty(&self) -> TypeId {
        match self.primitive {
            Primitive::Void => TypeId::VOID,
            Primitive::Bool => TypeId::BOOL,
            Primitive::I32 => TypeId::I32,
            Primitive::I64 => TypeId::I64,
            Primitive::F64 => TypeId::F64,
            Primitive::Str => TypeId::STR,
        }
    }

    fn load(&self, cx: &mut LoadCtx<'_>, value: &Constant) -> Result<()> {
        let instr = match (self.primitive, value) {
            (Primitive::Bool, Constant::Bool(v)) => Instruction::LdBool(*v),
            (Primitive::I32, Constant::I32(v)) => Instruction::LdI32(*v),
            (Primitive::I64, Constant::I64(v)) => Instruction::LdI64(*v),
            (Primitive::I64, Constant::I32(v)) => Instruction::LdI64(i64::from(*v)),
            (Primitive::F64, Constant::F64(v)) => Instruction::LdF64(*v),
            (Primitive::F64, Constant::I32(v)) => Instruction::LdF64(f64::from(*v)),
            (Primitive::Str, Constant::Str(s)) => Instruction::LdStr(s.clone()),
            (Primitive::Str, Constant::Null) => Instruction::LdNull,
            _ => return Err(mismatch(cx, self.ty(), value)),
        };
        cx.em.emit(instr)
    }
}

/// Loader for a user-defined type whose constants are built by calling a
/// constructor with the field constants as arguments.
#[derive(Clone, Copy, Debug)]
pub struct CompositeLoader {
    ty: TypeId,
}

impl CompositeLoader {
    pub fn new(ty: TypeId) -> Self {
        Self { ty }
    }
}

impl ConstantLoader for CompositeLoader {
    fn ty(&self) -> TypeId {
        self.ty
    }

    fn load(&self, cx: &mut LoadCtx<'_>, value: &Constant) -> Result<()> {
        let fields = match value {
            Constant::Composite { ty, fields } if *ty == self.ty => fields,
            _ => return Err(mismatch(cx, self.ty, value)),
        };

        let types = cx.types;
        let ctor = types
            .type_def(self.ty)
            .methods
            .iter()
            .copied()
            .find(|&m| {
                let def = types.method(m);
                def.kind == MethodKind::Constructor
                    && def.params.len() == fields.len()
                    && def.params.iter().zip(fields).all(|(&p, f)| match f.natural_type() {
                        Some(t) => types.is_assignable(t, p),
                        None => types.accepts_null(p),
                    })
            })
            .map(|m| types.method_ref(m))
            .ok_or_else(|| TypeError::ConstructorNotFound {
                ty: types.type_name(self.ty).to_owned(),
                args: fields
                    .iter()
                    .map(|f| f.natural_type().map_or("null", |t| types.type_name(t)))
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        let params = types.method(ctor.id).params.clone();
        for (param, field) in params.into_iter().zip(fields) {
            cx.constants.load(cx.em, types, param, field)?;
        }
        cx.em.emit_call(Instruction::NewObj(ctor.id), &ctor)
    }
}
