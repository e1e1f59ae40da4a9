//! Protected regions: `try`, `using`, `foreach` and `throw`.
//!
//! Bodies inside a region receive the label after the whole construct; it
//! must be reached with `leave`, since `br` cannot cross a region boundary.

use typeforge_bytecode::{Instruction, Label, Local};
use typeforge_core::{TypeError, TypeId};

use crate::Result;
use crate::emit::EmitError;

use super::body::BodyBuilder;
use super::control::LoopScope;

/// What a catch body gets: the local holding the caught exception and the
/// label after the `try` construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatchScope {
    pub exception: Local,
    pub exit: Label,
}

type CatchBody<'f, 'a> = Box<dyn FnOnce(&mut BodyBuilder<'a>, CatchScope) -> Result<()> + 'f>;

/// One `catch (ty)` clause. Created with [`BodyBuilder::catch_arm`], which
/// rejects types outside the exception family.
pub struct CatchArm<'f, 'a> {
    ty: TypeId,
    body: CatchBody<'f, 'a>,
}

impl CatchArm<'_, '_> {
    pub fn ty(&self) -> TypeId {
        self.ty
    }
}

impl std::fmt::Debug for CatchArm<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchArm").field("ty", &self.ty).finish_non_exhaustive()
    }
}

impl<'a> BodyBuilder<'a> {
    pub fn catch_arm<'f>(
        &self,
        ty: TypeId,
        body: impl FnOnce(&mut BodyBuilder<'a>, CatchScope) -> Result<()> + 'f,
    ) -> Result<CatchArm<'f, 'a>> {
        self.check_exception(ty)?;
        Ok(CatchArm {
            ty,
            body: Box::new(body),
        })
    }

    /// `try { body } finally { finally }`
    pub fn try_finally(
        &mut self,
        body: impl FnOnce(&mut Self, Label) -> Result<()>,
        finally: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let block = self.em.begin_try()?;
        let exit = block.end_label();
        self.balanced("try body", 0, |b| body(b, exit))?;
        self.em.begin_finally(&block)?;
        self.balanced("finally body", 0, finally)?;
        self.em.end_block(block)
    }

    /// `try { body } catch (..) { .. }`. Arms are tried in order, so more
    /// specific exception types go first.
    pub fn try_catch<'f>(
        &mut self,
        body: impl FnOnce(&mut Self, Label) -> Result<()>,
        arms: Vec<CatchArm<'f, 'a>>,
    ) -> Result<()> {
        if arms.is_empty() {
            return Err(EmitError::NoCatchArms);
        }

        let block = self.em.begin_try()?;
        let exit = block.end_label();
        self.balanced("try body", 0, |b| body(b, exit))?;

        for arm in arms {
            self.em.begin_catch(&block, arm.ty)?;
            let exception = self.declare_local(arm.ty)?;
            self.store_local(exception)?;
            let scope = CatchScope { exception, exit };
            let run = arm.body;
            self.balanced("catch body", 0, |b| run(b, scope))?;
        }

        self.em.end_block(block)
    }

    /// `try { body } catch (..) { .. } finally { finally }`, lowered as a
    /// catch region nested inside a finally region.
    pub fn try_catch_finally<'f>(
        &mut self,
        body: impl FnOnce(&mut Self, Label) -> Result<()>,
        arms: Vec<CatchArm<'f, 'a>>,
        finally: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if arms.is_empty() {
            return Err(EmitError::NoCatchArms);
        }
        self.try_finally(
            |b, exit| b.try_catch(|b, _| body(b, exit), arms),
            finally,
        )
    }

    /// `using (resource_ty r = resource) { body }`. `resource` pushes the
    /// value to dispose; `resource_ty` must implement `IDisposable`.
    pub fn using(
        &mut self,
        resource_ty: TypeId,
        resource: impl FnOnce(&mut Self) -> Result<()>,
        body: impl FnOnce(&mut Self, Label) -> Result<()>,
    ) -> Result<()> {
        self.check_disposable(resource_ty)?;
        let local = self.declare_local(resource_ty)?;
        self.balanced("using resource", 1, resource)?;
        self.store_local(local)?;
        self.using_local(local, body)
    }

    /// Run `body` and dispose the value in `local` on every exit. A null
    /// resource is skipped.
    pub fn using_local(
        &mut self,
        local: Local,
        body: impl FnOnce(&mut Self, Label) -> Result<()>,
    ) -> Result<()> {
        self.check_disposable(self.em.local_type(local)?)?;
        let dispose = self.types.resolve_method(TypeId::DISPOSABLE, "Dispose", &[])?;

        self.try_finally(body, |b| {
            let skip = b.define_label();
            b.load_local(local)?;
            b.emit(Instruction::BrFalse(skip))?;
            b.load_local(local)?;
            b.invoke(&dispose)?;
            b.bind_label(skip)
        })
    }

    /// `foreach (element_ty item in source) { body }` over the enumerator
    /// protocol. The enumerator is disposed on every exit.
    pub fn for_each(
        &mut self,
        element_ty: TypeId,
        source: impl FnOnce(&mut Self) -> Result<()>,
        body: impl FnOnce(&mut Self, LoopScope) -> Result<()>,
    ) -> Result<()> {
        let types = self.types;
        let get_enumerator = types.resolve_method(TypeId::ENUMERABLE, "GetEnumerator", &[])?;
        let move_next = types.resolve_method(TypeId::ENUMERATOR, "MoveNext", &[])?;
        let current = types.resolve_property(TypeId::ENUMERATOR, "Current")?;
        let get_current = current
            .getter
            .map(|m| types.method_ref(m))
            .ok_or_else(|| EmitError::NoGetter("Current".to_owned()))?;

        let enumerator = self.declare_local(TypeId::ENUMERATOR)?;
        let item = self.declare_local(element_ty)?;
        self.balanced("foreach source", 1, source)?;
        self.invoke(&get_enumerator)?;
        self.store_local(enumerator)?;

        self.using_local(enumerator, |b, _| {
            let top = b.define_label();
            let check = b.define_label();
            let end = b.define_label();

            b.branch(check)?;
            b.bind_label(top)?;
            b.load_local(enumerator)?;
            b.invoke(&get_current)?;
            b.store_local(item)?;

            let scope = b.loop_scope(item, end, check);
            b.balanced("foreach body", 0, |b| body(b, scope))?;

            b.bind_label(check)?;
            b.load_local(enumerator)?;
            b.invoke(&move_next)?;
            b.emit(Instruction::BrTrue(top))?;
            b.bind_label(end)
        })
    }

    fn check_disposable(&self, ty: TypeId) -> Result<()> {
        if !self.types.is_assignable(ty, TypeId::DISPOSABLE) {
            return Err(EmitError::NotDisposable(self.type_name(ty)));
        }
        Ok(())
    }

    /// Construct `ty` with its zero-argument constructor and throw it.
    pub fn throw_new(&mut self, ty: TypeId) -> Result<()> {
        self.check_exception(ty)?;
        let ctor = self.types.default_constructor(ty).ok_or_else(|| {
            TypeError::ConstructorNotFound {
                ty: self.type_name(ty),
                args: String::new(),
            }
        })?;
        self.new_object(ctor, |_| Ok(()))?;
        self.throw_value()
    }

    /// Construct `ty` with a message and throw it.
    pub fn throw_message(&mut self, ty: TypeId, message: &str) -> Result<()> {
        self.check_exception(ty)?;
        let ctor = self.types.resolve_constructor(ty, &[TypeId::STR])?;
        self.new_object(ctor, |b| b.emit(Instruction::LdStr(message.to_owned())))?;
        self.throw_value()
    }

    /// Throw the exception on top of the stack.
    pub fn throw_value(&mut self) -> Result<()> {
        self.emit(Instruction::Throw)
    }

    /// Rethrow the exception being handled; only valid inside a catch body.
    pub fn rethrow(&mut self) -> Result<()> {
        self.emit(Instruction::Rethrow)
    }

    fn check_exception(&self, ty: TypeId) -> Result<()> {
        if self.types.is_exception(ty) {
            Ok(())
        } else {
            Err(EmitError::NotAnException(self.type_name(ty)))
        }
    }
}
