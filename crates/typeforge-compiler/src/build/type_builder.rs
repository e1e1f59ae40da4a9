use tracing::debug;
use typeforge_bytecode::{Instruction, Module};
use typeforge_core::{
    FieldRef, MethodId, MethodKind, MethodRef, MethodSig, PropertyRef, TypeId, TypeKind,
    TypeRegistry, TypeSystem,
};

use crate::Result;
use crate::access::Receiver;
use crate::codegen::{BodyBuilder, MethodContext};
use crate::config::EmitConfig;
use crate::constants::{Constant, ConstantRegistry};
use crate::emit::EmitError;

const TARGET: &str = "typeforge::build";

/// A method declared on the type under construction, with its body in the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodBuildInfo {
    pub method: MethodRef,
}

/// A property declared on the type under construction, with the members
/// generated for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyBuildInfo {
    pub property: PropertyRef,
    /// Storage slot; `None` for computed and constant properties.
    pub backing_field: Option<FieldRef>,
    pub getter: MethodRef,
    pub setter: Option<MethodRef>,
}

/// Builds one class or struct: declares its members and emits their bodies.
///
/// Members become visible in the registry as they are added, so later bodies
/// can refer to earlier members.
pub struct TypeBuilder<'a> {
    types: &'a mut TypeRegistry,
    module: &'a mut Module,
    constants: &'a ConstantRegistry,
    config: EmitConfig,
    ty: TypeId,
}

impl<'a> TypeBuilder<'a> {
    /// Start a class deriving from `base`, or from `Object` if `None`.
    pub fn define_class(
        types: &'a mut TypeRegistry,
        module: &'a mut Module,
        constants: &'a ConstantRegistry,
        name: &str,
        base: Option<TypeId>,
    ) -> Result<Self> {
        let ty = types.define_type(name, TypeKind::Class, base)?;
        debug!(target: TARGET, name, "define class");
        Ok(Self::start(types, module, constants, ty))
    }

    pub fn define_struct(
        types: &'a mut TypeRegistry,
        module: &'a mut Module,
        constants: &'a ConstantRegistry,
        name: &str,
    ) -> Result<Self> {
        let ty = types.define_type(name, TypeKind::Struct, None)?;
        debug!(target: TARGET, name, "define struct");
        Ok(Self::start(types, module, constants, ty))
    }

    fn start(
        types: &'a mut TypeRegistry,
        module: &'a mut Module,
        constants: &'a ConstantRegistry,
        ty: TypeId,
    ) -> Self {
        Self {
            types,
            module,
            constants,
            config: EmitConfig::default(),
            ty,
        }
    }

    pub fn with_config(mut self, config: EmitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> TypeId {
        self.ty
    }

    pub fn types(&self) -> &TypeRegistry {
        self.types
    }

    pub fn implement(&mut self, interface: TypeId) -> Result<()> {
        self.types.add_interface(self.ty, interface)?;
        Ok(())
    }

    pub fn add_field(&mut self, name: &str, ty: TypeId) -> Result<FieldRef> {
        self.field(name, ty, false)
    }

    pub fn add_static_field(&mut self, name: &str, ty: TypeId) -> Result<FieldRef> {
        self.field(name, ty, true)
    }

    fn field(&mut self, name: &str, ty: TypeId, is_static: bool) -> Result<FieldRef> {
        let id = self.types.add_field(self.ty, name, ty, is_static)?;
        debug!(target: TARGET, ty = self.types.type_name(self.ty), name, is_static, "field");
        Ok(self.types.field_ref(id))
    }

    // ------------------------------------------------------------------
    // Methods and constructors
    // ------------------------------------------------------------------

    /// Declare a method and build its body.
    pub fn add_method(
        &mut self,
        sig: MethodSig,
        body: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<MethodBuildInfo> {
        let method = self.declare(sig)?;
        self.build(&method, body)?;
        Ok(MethodBuildInfo { method })
    }

    /// Declare an abstract method. It has no body.
    pub fn add_abstract_method(&mut self, sig: MethodSig) -> Result<MethodBuildInfo> {
        let method = self.declare(sig.make_abstract())?;
        Ok(MethodBuildInfo { method })
    }

    /// Override a virtual method of a base class or implemented interface with
    /// the same signature.
    pub fn override_method(
        &mut self,
        base: MethodId,
        body: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<MethodBuildInfo> {
        let def = self.types.method(base);
        let name = self.types.name(def.name).to_owned();
        if !def.is_virtual || def.is_static {
            return Err(EmitError::NotOverridable(name));
        }
        let sig = MethodSig::new(name, def.ret)
            .params(def.params.clone())
            .kind(def.kind)
            .overriding(base);
        self.add_method(sig, body)
    }

    /// Declare a constructor. Class constructors first chain to the base
    /// class's zero-argument constructor, then run `body`.
    pub fn add_constructor(
        &mut self,
        params: impl IntoIterator<Item = TypeId>,
        body: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<MethodBuildInfo> {
        let base_ctor = match self.types.type_def(self.ty).base {
            Some(base) => {
                let ctor = self.types.resolve_constructor(base, &[])?;
                Some(ctor)
            }
            None => None,
        };

        let method = self.declare(MethodSig::constructor(params))?;
        self.build(&method, |b| {
            if let Some(ctor) = base_ctor {
                b.call(ctor, Receiver::Implicit, |_| Ok(()))?;
            }
            body(b)
        })?;
        Ok(MethodBuildInfo { method })
    }

    pub fn add_default_constructor(&mut self) -> Result<MethodBuildInfo> {
        self.add_constructor([], |_| Ok(()))
    }

    fn declare(&mut self, sig: MethodSig) -> Result<MethodRef> {
        let name = sig.name.clone();
        let id = self.types.add_method(self.ty, sig)?;
        debug!(target: TARGET, ty = self.types.type_name(self.ty), name, "method");
        Ok(self.types.method_ref(id))
    }

    fn build(
        &mut self,
        method: &MethodRef,
        body: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<()> {
        let types: &TypeRegistry = self.types;
        let ctx = MethodContext::of(types, method);
        let mut b = BodyBuilder::new(types, self.constants, self.config, ctx);
        body(&mut b)?;
        let code = b.finish()?;
        self.module.insert(method.id, code);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Property backed by a generated field; the getter loads it and the
    /// setter stores into it.
    pub fn add_auto_property(&mut self, name: &str, ty: TypeId) -> Result<PropertyBuildInfo> {
        let field = self.add_field(&backing_field_name(name), ty)?;
        let getter = self.add_getter(name, ty, |b| b.load_field(field, Receiver::Implicit))?;
        let setter = self.add_method(setter_sig(name, ty), |b| {
            b.store_field(field, Receiver::Implicit, |b| b.load_param(0))
        })?;
        self.property(name, ty, Some(field), getter, Some(setter.method))
    }

    /// Read-only property whose getter pushes the value computed by `value`.
    pub fn add_computed_property(
        &mut self,
        name: &str,
        ty: TypeId,
        value: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<PropertyBuildInfo> {
        let getter = self.add_getter(name, ty, value)?;
        self.property(name, ty, None, getter, None)
    }

    /// Read-only property that always returns `value`.
    pub fn add_constant_property(
        &mut self,
        name: &str,
        ty: TypeId,
        value: Constant,
    ) -> Result<PropertyBuildInfo> {
        let getter = self.add_getter(name, ty, |b| b.load_constant(ty, &value).map(drop))?;
        self.property(name, ty, None, getter, None)
    }

    /// Auto property whose setter skips the store, and `on_change`, when the
    /// incoming value equals the current one. Value types compare with `ceq`,
    /// reference types with the null-aware static `Object::Equals`.
    pub fn add_notifying_property(
        &mut self,
        name: &str,
        ty: TypeId,
        on_change: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<PropertyBuildInfo> {
        let field = self.add_field(&backing_field_name(name), ty)?;
        let getter = self.add_getter(name, ty, |b| b.load_field(field, Receiver::Implicit))?;

        let by_value = self.types.is_value_type(ty);
        let equals = if by_value {
            None
        } else {
            Some(self.types.resolve_method(TypeId::OBJECT, "Equals", &[TypeId::OBJECT, TypeId::OBJECT])?)
        };

        let setter = self.add_method(setter_sig(name, ty), |b| {
            let changed = |b: &mut BodyBuilder<'_>| {
                let current_and_new = |b: &mut BodyBuilder<'_>| {
                    b.load_field(field, Receiver::Implicit)?;
                    b.load_param(0)
                };
                match equals {
                    None => {
                        current_and_new(b)?;
                        b.emit(Instruction::Ceq)?;
                    }
                    Some(equals) => b.call(equals, Receiver::Implicit, current_and_new)?,
                }
                b.emit(Instruction::Not)
            };
            b.if_then(changed, |b| {
                b.store_field(field, Receiver::Implicit, |b| b.load_param(0))?;
                on_change(b)
            })
        })?;
        self.property(name, ty, Some(field), getter, Some(setter.method))
    }

    fn add_getter(
        &mut self,
        name: &str,
        ty: TypeId,
        value: impl FnOnce(&mut BodyBuilder<'_>) -> Result<()>,
    ) -> Result<MethodRef> {
        let sig = MethodSig::new(format!("get_{name}"), ty).kind(MethodKind::Getter);
        let info = self.add_method(sig, |b| b.ret_value(value))?;
        Ok(info.method)
    }

    fn property(
        &mut self,
        name: &str,
        ty: TypeId,
        backing_field: Option<FieldRef>,
        getter: MethodRef,
        setter: Option<MethodRef>,
    ) -> Result<PropertyBuildInfo> {
        let id = self.types.add_property(self.ty, name, ty, false)?;
        self.types
            .set_property_accessors(id, Some(getter.id), setter.map(|s| s.id));
        debug!(
            target: TARGET,
            ty = self.types.type_name(self.ty),
            name,
            backed = backing_field.is_some(),
            "property"
        );
        Ok(PropertyBuildInfo {
            property: self.types.property_ref(id),
            backing_field,
            getter,
            setter,
        })
    }

    /// Complete the type.
    pub fn finish(self) -> TypeId {
        let def = self.types.type_def(self.ty);
        debug!(
            target: TARGET,
            ty = self.types.type_name(self.ty),
            fields = def.fields.len(),
            methods = def.methods.len(),
            properties = def.properties.len(),
            "finish type"
        );
        self.ty
    }
}

fn backing_field_name(property: &str) -> String {
    format!("<{property}>k__BackingField")
}

fn setter_sig(name: &str, ty: TypeId) -> MethodSig {
    MethodSig::new(format!("set_{name}"), TypeId::VOID)
        .param(ty)
        .kind(MethodKind::Setter)
}
