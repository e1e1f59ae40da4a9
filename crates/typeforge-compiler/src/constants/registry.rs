//! Copy-on-write loader registry.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::trace;

use typeforge_bytecode::Instruction;
use typeforge_core::{MethodRef, Primitive, TypeId, TypeKind, TypeSystem};

use crate::Result;
use crate::emit::{EmitError, Emitter};

use super::constant::Constant;
use super::loader::{ConstantLoader, LoadCtx, PrimitiveLoader};

const TARGET: &str = "typeforge::constants";

/// Which rule produced the emitted sequence.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Strategy {
    /// A registered loader for the exact type.
    Registered,
    /// `newobj` of the struct's zero-argument constructor.
    DefaultValue,
    /// `ldnull` for a type that accepts null.
    Null,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadOutcome {
    Loaded(Strategy),
    /// Nothing was emitted: the value has no representation as `ty`.
    NotConstant(TypeId),
}

static BUILTIN: OnceLock<ConstantRegistry> = OnceLock::new();

/// Immutable snapshot of constant loaders.
///
/// Cloning is cheap and shares storage; `register` copies the loader list
/// only when it is shared. Lookup is by exact type, and when several loaders
/// claim the same type the first registered one is used.
#[derive(Clone)]
pub struct ConstantRegistry {
    loaders: Arc<Vec<Arc<dyn ConstantLoader>>>,
}

impl fmt::Debug for ConstantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.loaders.iter().map(|l| l.ty()))
            .finish()
    }
}

impl Default for ConstantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ConstantRegistry {
    /// A registry with no loaders at all.
    pub fn empty() -> Self {
        Self {
            loaders: Arc::new(Vec::new()),
        }
    }

    /// The process-wide base snapshot with loaders for every scalar primitive
    /// and strings. Initialized on first use.
    pub fn builtin() -> Self {
        BUILTIN
            .get_or_init(|| {
                let mut registry = Self::empty();
                for p in [
                    Primitive::Bool,
                    Primitive::I32,
                    Primitive::I64,
                    Primitive::F64,
                    Primitive::Str,
                ] {
                    registry.register(PrimitiveLoader::new(p));
                }
                registry
            })
            .clone()
    }

    pub fn register(&mut self, loader: impl ConstantLoader + 'static) {
        Arc::make_mut(&mut self.loaders).push(Arc::new(loader));
    }

    /// Builder-style `register`.
    pub fn with(mut self, loader: impl ConstantLoader + 'static) -> Self {
        self.register(loader);
        self
    }

    /// First loader registered for exactly `ty`.
    pub fn find(&self, ty: TypeId) -> Option<&dyn ConstantLoader> {
        self.loaders
            .iter()
            .find(|l| l.ty() == ty)
            .map(|l| l.as_ref())
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Whether two registries are views of the same snapshot.
    pub fn shares_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.loaders, &other.loaders)
    }

    /// Push `value` as a `ty`, trying in order: a registered loader, the
    /// default value of a struct, `null`.
    pub fn try_load(
        &self,
        em: &mut Emitter,
        types: &dyn TypeSystem,
        ty: TypeId,
        value: &Constant,
    ) -> Result<LoadOutcome> {
        let outcome = if let Some(loader) = self.find(ty) {
            let mut cx = LoadCtx {
                em,
                types,
                constants: self,
            };
            loader.load(&mut cx, value)?;
            LoadOutcome::Loaded(Strategy::Registered)
        } else if let Some(ctor) = default_struct_ctor(types, ty, value) {
            em.emit_call(Instruction::NewObj(ctor.id), &ctor)?;
            LoadOutcome::Loaded(Strategy::DefaultValue)
        } else if value.is_null() && types.accepts_null(ty) {
            em.emit(Instruction::LdNull)?;
            LoadOutcome::Loaded(Strategy::Null)
        } else {
            LoadOutcome::NotConstant(ty)
        };

        trace!(target: TARGET, ty = types.type_name(ty), ?outcome, "load constant");
        Ok(outcome)
    }

    /// Like `try_load`, but a value with no representation is an error.
    pub fn load(
        &self,
        em: &mut Emitter,
        types: &dyn TypeSystem,
        ty: TypeId,
        value: &Constant,
    ) -> Result<Strategy> {
        match self.try_load(em, types, ty, value)? {
            LoadOutcome::Loaded(strategy) => Ok(strategy),
            LoadOutcome::NotConstant(ty) => {
                Err(EmitError::NotConstant(types.type_name(ty).to_owned()))
            }
        }
    }

    /// Push `value` as its own type. A missing value or a bare `null` is
    /// rejected, since no type can be inferred for it.
    pub fn load_value(
        &self,
        em: &mut Emitter,
        types: &dyn TypeSystem,
        value: Option<&Constant>,
    ) -> Result<Strategy> {
        let value = value.ok_or(EmitError::ArgumentRequired)?;
        let ty = value.natural_type().ok_or(EmitError::ArgumentRequired)?;
        self.load(em, types, ty, value)
    }
}

fn default_struct_ctor(types: &dyn TypeSystem, ty: TypeId, value: &Constant) -> Option<MethodRef> {
    if types.type_def(ty).kind != TypeKind::Struct || !value.is_default() {
        return None;
    }
    match value {
        Constant::Composite { ty: declared, .. } if *declared != ty => None,
        _ => types.default_constructor(ty),
    }
}
