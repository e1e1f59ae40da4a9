//! Read-only query interface over the type tables.

use crate::Result;
use crate::error::TypeError;
use crate::interner::Symbol;
use crate::members::{FieldRef, MethodRef, PropertyRef};
use crate::types::{
    FieldDef, FieldId, MethodDef, MethodId, MethodKind, PropertyDef, PropertyId, TypeDef, TypeId,
    TypeKind,
};

/// Host type-system queries consumed by the emitter and the VM.
///
/// Implementors provide table access; resolution, assignability and
/// classification are derived from it.
pub trait TypeSystem {
    fn type_def(&self, id: TypeId) -> &TypeDef;
    fn field(&self, id: FieldId) -> &FieldDef;
    fn method(&self, id: MethodId) -> &MethodDef;
    fn property(&self, id: PropertyId) -> &PropertyDef;

    /// Resolve an interned name.
    fn name(&self, sym: Symbol) -> &str;

    /// Find a type by its full name.
    fn lookup_type(&self, name: &str) -> Option<TypeId>;

    /// Find an interned name without interning it.
    fn lookup_symbol(&self, name: &str) -> Option<Symbol>;

    fn type_name(&self, id: TypeId) -> &str {
        self.name(self.type_def(id).name)
    }

    fn field_ref(&self, id: FieldId) -> FieldRef {
        let def = self.field(id);
        FieldRef {
            id,
            declaring: def.declaring,
            ty: def.ty,
            is_static: def.is_static,
        }
    }

    fn method_ref(&self, id: MethodId) -> MethodRef {
        let def = self.method(id);
        MethodRef {
            id,
            declaring: def.declaring,
            arity: def.params.len() as u16,
            ret: def.ret,
            kind: def.kind,
            is_static: def.is_static,
            is_virtual: def.is_virtual,
        }
    }

    fn property_ref(&self, id: PropertyId) -> PropertyRef {
        let def = self.property(id);
        PropertyRef {
            id,
            declaring: def.declaring,
            ty: def.ty,
            is_static: def.is_static,
            getter: def.getter,
            setter: def.setter,
        }
    }

    /// Find a field declared on `ty` or inherited from its base chain.
    fn resolve_field(&self, ty: TypeId, name: &str) -> Result<FieldRef> {
        let found = self.lookup_symbol(name).and_then(|sym| {
            self.base_chain(ty).into_iter().find_map(|t| {
                self.type_def(t)
                    .fields
                    .iter()
                    .copied()
                    .find(|&f| self.field(f).name == sym)
            })
        });

        match found {
            Some(id) => Ok(self.field_ref(id)),
            None => Err(TypeError::FieldNotFound {
                ty: self.type_name(ty).to_owned(),
                name: name.to_owned(),
            }),
        }
    }

    fn resolve_property(&self, ty: TypeId, name: &str) -> Result<PropertyRef> {
        let found = self.lookup_symbol(name).and_then(|sym| {
            self.base_chain(ty).into_iter().find_map(|t| {
                self.type_def(t)
                    .properties
                    .iter()
                    .copied()
                    .find(|&p| self.property(p).name == sym)
            })
        });

        match found {
            Some(id) => Ok(self.property_ref(id)),
            None => Err(TypeError::PropertyNotFound {
                ty: self.type_name(ty).to_owned(),
                name: name.to_owned(),
            }),
        }
    }

    /// Find a non-constructor method by name whose parameters accept `args`.
    ///
    /// The base chain is searched first, nearest type first, then the
    /// interfaces the type implements.
    fn resolve_method(&self, ty: TypeId, name: &str, args: &[TypeId]) -> Result<MethodRef> {
        let matches = |m: MethodId, sym: Symbol| {
            let def = self.method(m);
            def.name == sym && def.kind != MethodKind::Constructor && self.accepts(&def.params, args)
        };

        let found = self.lookup_symbol(name).and_then(|sym| {
            self.base_chain(ty)
                .into_iter()
                .find_map(|t| self.type_def(t).methods.iter().copied().find(|&m| matches(m, sym)))
                .or_else(|| {
                    self.all_interfaces(ty).into_iter().find_map(|i| {
                        self.type_def(i).methods.iter().copied().find(|&m| matches(m, sym))
                    })
                })
        });

        match found {
            Some(id) => Ok(self.method_ref(id)),
            None => Err(TypeError::MethodNotFound {
                ty: self.type_name(ty).to_owned(),
                name: name.to_owned(),
                args: self.render_args(args),
            }),
        }
    }

    /// Find a constructor declared on `ty` itself. Constructors are not inherited.
    fn resolve_constructor(&self, ty: TypeId, args: &[TypeId]) -> Result<MethodRef> {
        let found = self.type_def(ty).methods.iter().copied().find(|&m| {
            let def = self.method(m);
            def.kind == MethodKind::Constructor && self.accepts(&def.params, args)
        });

        match found {
            Some(id) => Ok(self.method_ref(id)),
            None => Err(TypeError::ConstructorNotFound {
                ty: self.type_name(ty).to_owned(),
                args: self.render_args(args),
            }),
        }
    }

    /// The zero-argument constructor of `ty`, if it declares one.
    fn default_constructor(&self, ty: TypeId) -> Option<MethodRef> {
        self.resolve_constructor(ty, &[]).ok()
    }

    /// Dispatch target of `method` for a receiver whose runtime type is `runtime`.
    ///
    /// Walks up from `runtime` looking for the most derived method that overrides
    /// `method`, directly or through a chain of overrides. Falls back to `method`.
    fn resolve_virtual(&self, runtime: TypeId, method: MethodId) -> MethodId {
        if !self.method(method).is_virtual {
            return method;
        }

        for t in self.base_chain(runtime) {
            for &candidate in &self.type_def(t).methods {
                if self.overrides_transitively(candidate, method) {
                    return candidate;
                }
            }
        }
        method
    }

    /// Whether a value of type `from` can be stored where `to` is expected.
    fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        // Everything but void converts to Object.
        if to == TypeId::OBJECT {
            return from != TypeId::VOID;
        }
        if self.base_chain(from).contains(&to) {
            return true;
        }
        self.all_interfaces(from).contains(&to)
    }

    /// Whether `ty` belongs to the exception family.
    fn is_exception(&self, ty: TypeId) -> bool {
        self.base_chain(ty).contains(&TypeId::EXCEPTION)
    }

    /// Value types are copied on assignment and never null.
    fn is_value_type(&self, ty: TypeId) -> bool {
        match self.type_def(ty).kind {
            TypeKind::Primitive(p) => p.is_value(),
            TypeKind::Struct => true,
            TypeKind::Class | TypeKind::Interface => false,
        }
    }

    fn accepts_null(&self, ty: TypeId) -> bool {
        ty != TypeId::VOID && !self.is_value_type(ty)
    }

    /// `ty` followed by its base classes, nearest first.
    fn base_chain(&self, ty: TypeId) -> Vec<TypeId> {
        let mut chain = vec![ty];
        let mut cur = self.type_def(ty).base;
        while let Some(t) = cur {
            chain.push(t);
            cur = self.type_def(t).base;
        }
        chain
    }

    /// Every interface `ty` implements, directly, through a base class, or
    /// through another interface.
    fn all_interfaces(&self, ty: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut work = self.base_chain(ty);
        while let Some(t) = work.pop() {
            for &i in &self.type_def(t).interfaces {
                if !out.contains(&i) {
                    out.push(i);
                    work.push(i);
                }
            }
        }
        out
    }

    #[doc(hidden)]
    fn accepts(&self, params: &[TypeId], args: &[TypeId]) -> bool {
        params.len() == args.len()
            && params
                .iter()
                .zip(args)
                .all(|(&p, &a)| self.is_assignable(a, p))
    }

    #[doc(hidden)]
    fn overrides_transitively(&self, candidate: MethodId, base: MethodId) -> bool {
        let mut cur = Some(candidate);
        while let Some(m) = cur {
            if m == base {
                return true;
            }
            cur = self.method(m).overrides;
        }
        false
    }

    #[doc(hidden)]
    fn render_args(&self, args: &[TypeId]) -> String {
        args.iter()
            .map(|&a| self.type_name(a))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<T: TypeSystem + ?Sized> TypeSystem for &T {
    fn type_def(&self, id: TypeId) -> &TypeDef {
        (**self).type_def(id)
    }

    fn field(&self, id: FieldId) -> &FieldDef {
        (**self).field(id)
    }

    fn method(&self, id: MethodId) -> &MethodDef {
        (**self).method(id)
    }

    fn property(&self, id: PropertyId) -> &PropertyDef {
        (**self).property(id)
    }

    fn name(&self, sym: Symbol) -> &str {
        (**self).name(sym)
    }

    fn lookup_type(&self, name: &str) -> Option<TypeId> {
        (**self).lookup_type(name)
    }

    fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        (**self).lookup_symbol(name)
    }
}
