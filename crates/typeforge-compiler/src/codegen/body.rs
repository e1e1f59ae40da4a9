//! Method body builder: primitives and member access.

use typeforge_bytecode::{Instruction, InstructionIR, Label, Local, MethodBody};
use typeforge_core::{FieldRef, MethodRef, PropertyRef, TypeId, TypeSystem};

use crate::Result;
use crate::access::{Receiver, push_receiver};
use crate::config::EmitConfig;
use crate::constants::{Constant, ConstantRegistry, Strategy};
use crate::emit::{EmitError, Emitter};

/// The method a body is being built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodContext {
    pub declaring: TypeId,
    pub is_static: bool,
    /// Declared parameters, excluding `this`.
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

impl MethodContext {
    pub fn instance(declaring: TypeId, params: impl IntoIterator<Item = TypeId>, ret: TypeId) -> Self {
        Self {
            declaring,
            is_static: false,
            params: params.into_iter().collect(),
            ret,
        }
    }

    pub fn static_method(
        declaring: TypeId,
        params: impl IntoIterator<Item = TypeId>,
        ret: TypeId,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::instance(declaring, params, ret)
        }
    }

    /// Context for the body of an existing method.
    pub fn of(types: &dyn TypeSystem, method: &MethodRef) -> Self {
        let def = types.method(method.id);
        Self {
            declaring: def.declaring,
            is_static: def.is_static,
            params: def.params.clone(),
            ret: def.ret,
        }
    }

    pub fn returns_value(&self) -> bool {
        self.ret != TypeId::VOID
    }

    /// Argument slots, `this` included.
    pub fn arg_count(&self) -> u16 {
        self.params.len() as u16 + u16::from(!self.is_static)
    }
}

/// Builds one method body.
///
/// Blocks take their bodies as callbacks and check that each callback leaves
/// the stack as the block expects. A callback that ends in unreachable code
/// (`throw`, `ret`, a branch) is exempt, since nothing falls through.
pub struct BodyBuilder<'a> {
    pub(super) em: Emitter,
    pub(super) types: &'a dyn TypeSystem,
    pub(super) constants: &'a ConstantRegistry,
    pub(super) ctx: MethodContext,
}

impl<'a> BodyBuilder<'a> {
    pub fn new(
        types: &'a dyn TypeSystem,
        constants: &'a ConstantRegistry,
        config: EmitConfig,
        ctx: MethodContext,
    ) -> Self {
        let em = Emitter::new(config, ctx.arg_count(), ctx.returns_value());
        Self {
            em,
            types,
            constants,
            ctx,
        }
    }

    pub fn context(&self) -> &MethodContext {
        &self.ctx
    }

    pub fn types(&self) -> &'a dyn TypeSystem {
        self.types
    }

    pub fn constants(&self) -> &'a ConstantRegistry {
        self.constants
    }

    pub fn emitter(&self) -> &Emitter {
        &self.em
    }

    /// Escape hatch for raw emission inside a block.
    pub fn emitter_mut(&mut self) -> &mut Emitter {
        &mut self.em
    }

    pub fn finish(self) -> Result<MethodBody> {
        self.em.finish()
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    pub fn emit(&mut self, instr: InstructionIR) -> Result<()> {
        self.em.emit(instr)
    }

    pub fn define_label(&mut self) -> Label {
        self.em.define_label()
    }

    pub fn bind_label(&mut self, label: Label) -> Result<()> {
        self.em.bind_label(label)
    }

    pub fn declare_local(&mut self, ty: TypeId) -> Result<Local> {
        self.em.declare_local(ty)
    }

    pub fn load_local(&mut self, local: Local) -> Result<()> {
        self.em.emit(Instruction::LdLoc(local))
    }

    pub fn store_local(&mut self, local: Local) -> Result<()> {
        self.em.emit(Instruction::StLoc(local))
    }

    pub fn load_this(&mut self) -> Result<()> {
        if self.ctx.is_static {
            return Err(EmitError::NoSelfInStaticContext("this".to_owned()));
        }
        self.em.emit(Instruction::LdArg(0))
    }

    /// Push declared parameter `index`; `this` is not counted.
    pub fn load_param(&mut self, index: u16) -> Result<()> {
        let slot = self.param_slot(index)?;
        self.em.emit(Instruction::LdArg(slot))
    }

    pub fn store_param(&mut self, index: u16) -> Result<()> {
        let slot = self.param_slot(index)?;
        self.em.emit(Instruction::StArg(slot))
    }

    fn param_slot(&self, index: u16) -> Result<u16> {
        let count = self.ctx.params.len() as u16;
        if index >= count {
            return Err(EmitError::ArgumentOutOfRange { index, count });
        }
        Ok(index + u16::from(!self.ctx.is_static))
    }

    /// Push `value` as a `ty` through the constant registry.
    pub fn load_constant(&mut self, ty: TypeId, value: &Constant) -> Result<Strategy> {
        self.constants.load(&mut self.em, self.types, ty, value)
    }

    /// Push `value` as its own type. `None` and a bare null are rejected;
    /// use `load_null` for a null reference.
    pub fn load_value(&mut self, value: Option<&Constant>) -> Result<Strategy> {
        self.constants.load_value(&mut self.em, self.types, value)
    }

    pub fn load_null(&mut self) -> Result<()> {
        self.em.emit(Instruction::LdNull)
    }

    pub fn ret(&mut self) -> Result<()> {
        self.em.emit(Instruction::Ret)
    }

    /// Push the result with `value` and return it.
    pub fn ret_value(&mut self, value: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.balanced("return value", 1, value)?;
        if !self.em.is_reachable() {
            return Ok(());
        }
        self.ret()
    }

    /// Run `f` and require it to change the stack depth by `expected`.
    pub(crate) fn balanced(
        &mut self,
        construct: &'static str,
        expected: i32,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let before = self.em.depth() as i32;
        f(self)?;
        if !self.em.is_reachable() {
            return Ok(());
        }
        let found = self.em.depth() as i32 - before;
        if found != expected {
            return Err(EmitError::UnbalancedBlock {
                construct,
                expected,
                found,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    pub fn load_field(&mut self, field: FieldRef, receiver: Receiver) -> Result<()> {
        let name = self.field_name(&field);
        push_receiver(&mut self.em, self.types, &self.ctx, field.into(), receiver, &name)?;
        self.em.emit(if field.is_static {
            Instruction::LdSFld(field.id)
        } else {
            Instruction::LdFld(field.id)
        })
    }

    /// Store the value pushed by `value` into `field`.
    pub fn store_field(
        &mut self,
        field: FieldRef,
        receiver: Receiver,
        value: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let name = self.field_name(&field);
        push_receiver(&mut self.em, self.types, &self.ctx, field.into(), receiver, &name)?;
        self.balanced("field value", 1, value)?;
        if !self.em.is_reachable() {
            return Ok(());
        }
        self.em.emit(if field.is_static {
            Instruction::StSFld(field.id)
        } else {
            Instruction::StFld(field.id)
        })
    }

    pub fn load_property(&mut self, property: PropertyRef, receiver: Receiver) -> Result<()> {
        let name = self.property_name(&property);
        let getter = property.getter.ok_or_else(|| EmitError::NoGetter(name.clone()))?;
        let getter = self.types.method_ref(getter);
        push_receiver(&mut self.em, self.types, &self.ctx, property.into(), receiver, &name)?;
        self.invoke(&getter)
    }

    pub fn store_property(
        &mut self,
        property: PropertyRef,
        receiver: Receiver,
        value: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let name = self.property_name(&property);
        let setter = property.setter.ok_or_else(|| EmitError::NoSetter(name.clone()))?;
        let setter = self.types.method_ref(setter);
        push_receiver(&mut self.em, self.types, &self.ctx, property.into(), receiver, &name)?;
        self.balanced("property value", 1, value)?;
        if !self.em.is_reachable() {
            return Ok(());
        }
        self.invoke(&setter)
    }

    /// Call `method`; `args` must push exactly its declared arguments.
    /// Virtual instance methods are dispatched with `callvirt`.
    pub fn call(
        &mut self,
        method: MethodRef,
        receiver: Receiver,
        args: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let name = self.method_name(&method);
        push_receiver(&mut self.em, self.types, &self.ctx, method.into(), receiver, &name)?;
        self.balanced("call arguments", i32::from(method.arity), args)?;
        if !self.em.is_reachable() {
            return Ok(());
        }
        self.invoke(&method)
    }

    /// Allocate an object with constructor `ctor`.
    pub fn new_object(
        &mut self,
        ctor: MethodRef,
        args: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if !ctor.is_constructor() {
            return Err(EmitError::NotAConstructor(self.method_name(&ctor)));
        }
        self.balanced("constructor arguments", i32::from(ctor.arity), args)?;
        if !self.em.is_reachable() {
            return Ok(());
        }
        self.em.emit_call(Instruction::NewObj(ctor.id), &ctor)
    }

    pub(super) fn invoke(&mut self, method: &MethodRef) -> Result<()> {
        let instr = if method.is_virtual && !method.is_static {
            Instruction::CallVirt(method.id)
        } else {
            Instruction::Call(method.id)
        };
        self.em.emit_call(instr, method)
    }

    pub(super) fn type_name(&self, ty: TypeId) -> String {
        self.types.type_name(ty).to_owned()
    }

    fn field_name(&self, field: &FieldRef) -> String {
        self.types.name(self.types.field(field.id).name).to_owned()
    }

    fn property_name(&self, property: &PropertyRef) -> String {
        self.types.name(self.types.property(property.id).name).to_owned()
    }

    pub(super) fn method_name(&self, method: &MethodRef) -> String {
        self.types.name(self.types.method(method.id).name).to_owned()
    }
}

