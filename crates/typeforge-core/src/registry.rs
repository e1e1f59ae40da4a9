//! Owned type tables and the mutators that populate them.

use indexmap::IndexMap;

use crate::Result;
use crate::error::TypeError;
use crate::interner::{Interner, Symbol};
use crate::system::TypeSystem;
use crate::types::{
    FieldDef, FieldId, MethodDef, MethodId, MethodKind, MethodSig, Primitive, PropertyDef,
    PropertyId, TypeDef, TypeId, TypeKind,
};

/// Definition layer of the type system.
///
/// `new()` seeds the primitives and the well-known library types in the order
/// fixed by the `TypeId` constants. Types defined later get consecutive ids.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    interner: Interner,
    types: Vec<TypeDef>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    properties: Vec<PropertyDef>,
    by_name: IndexMap<Symbol, TypeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            interner: Interner::new(),
            types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            by_name: IndexMap::new(),
        };
        reg.seed();
        reg
    }

    fn seed(&mut self) {
        for p in [
            Primitive::Void,
            Primitive::Bool,
            Primitive::I32,
            Primitive::I64,
            Primitive::F64,
            Primitive::Str,
        ] {
            self.push_type(p.name(), TypeKind::Primitive(p), None);
        }

        let object = self.push_type("Object", TypeKind::Class, None);
        let exception = self.push_type("Exception", TypeKind::Class, Some(object));
        let invalid_op = self.push_type("InvalidOperationException", TypeKind::Class, Some(exception));
        let argument = self.push_type("ArgumentException", TypeKind::Class, Some(exception));
        let disposable = self.push_type("IDisposable", TypeKind::Interface, None);
        let enumerator = self.push_type("IEnumerator", TypeKind::Interface, None);
        let enumerable = self.push_type("IEnumerable", TypeKind::Interface, None);
        debug_assert_eq!(self.types.len() as u32, TypeId::WELL_KNOWN);

        self.push_method(object, MethodSig::constructor([]));
        self.push_method(
            object,
            MethodSig::new("Equals", TypeId::BOOL)
                .params([TypeId::OBJECT, TypeId::OBJECT])
                .make_static(),
        );

        self.push_field(exception, "_message", TypeId::STR, false);
        for ty in [exception, invalid_op, argument] {
            self.push_method(ty, MethodSig::constructor([]));
            self.push_method(ty, MethodSig::constructor([TypeId::STR]));
        }
        let get_message = self.push_method(
            exception,
            MethodSig::new("get_Message", TypeId::STR).kind(MethodKind::Getter),
        );
        self.push_property(exception, "Message", TypeId::STR, false, Some(get_message), None);

        self.push_method(disposable, MethodSig::new("Dispose", TypeId::VOID).make_abstract());

        self.types[enumerator.index()].interfaces.push(disposable);
        self.push_method(enumerator, MethodSig::new("MoveNext", TypeId::BOOL).make_abstract());
        let get_current = self.push_method(
            enumerator,
            MethodSig::new("get_Current", TypeId::OBJECT)
                .kind(MethodKind::Getter)
                .make_abstract(),
        );
        self.push_property(enumerator, "Current", TypeId::OBJECT, false, Some(get_current), None);

        self.push_method(
            enumerable,
            MethodSig::new("GetEnumerator", TypeId::ENUMERATOR).make_abstract(),
        );
    }

    fn push_type(&mut self, name: &str, kind: TypeKind, base: Option<TypeId>) -> TypeId {
        let id = TypeId::from_index(self.types.len());
        let sym = self.interner.intern(name);
        self.types.push(TypeDef {
            name: sym,
            kind,
            base,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        });
        self.by_name.insert(sym, id);
        id
    }

    fn push_field(&mut self, ty: TypeId, name: &str, field_ty: TypeId, is_static: bool) -> FieldId {
        let id = FieldId::from_index(self.fields.len());
        let name = self.interner.intern(name);
        self.fields.push(FieldDef {
            name,
            declaring: ty,
            ty: field_ty,
            is_static,
        });
        self.types[ty.index()].fields.push(id);
        id
    }

    fn push_method(&mut self, ty: TypeId, sig: MethodSig) -> MethodId {
        let id = MethodId::from_index(self.methods.len());
        let name = self.interner.intern(&sig.name);
        self.methods.push(MethodDef {
            name,
            declaring: ty,
            params: sig.params,
            ret: sig.ret,
            kind: sig.kind,
            is_static: sig.is_static,
            is_virtual: sig.is_virtual,
            is_abstract: sig.is_abstract,
            overrides: sig.overrides,
        });
        self.types[ty.index()].methods.push(id);
        id
    }

    fn push_property(
        &mut self,
        ty: TypeId,
        name: &str,
        prop_ty: TypeId,
        is_static: bool,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    ) -> PropertyId {
        let id = PropertyId::from_index(self.properties.len());
        let name = self.interner.intern(name);
        self.properties.push(PropertyDef {
            name,
            declaring: ty,
            ty: prop_ty,
            is_static,
            getter,
            setter,
        });
        self.types[ty.index()].properties.push(id);
        id
    }

    /// Define a new class, struct or interface.
    ///
    /// Classes without an explicit base derive from `Object`. Structs and
    /// interfaces cannot have a base.
    pub fn define_type(&mut self, name: &str, kind: TypeKind, base: Option<TypeId>) -> Result<TypeId> {
        if self.lookup_type(name).is_some() {
            return Err(TypeError::DuplicateType(name.to_owned()));
        }

        let base = match kind {
            TypeKind::Class => {
                let base = base.unwrap_or(TypeId::OBJECT);
                if self.types[base.index()].kind != TypeKind::Class {
                    return Err(TypeError::InvalidDeclaration {
                        ty: name.to_owned(),
                        what: "a base that is not a class",
                    });
                }
                Some(base)
            }
            TypeKind::Struct | TypeKind::Interface if base.is_some() => {
                return Err(TypeError::InvalidDeclaration {
                    ty: name.to_owned(),
                    what: "a base type",
                });
            }
            TypeKind::Struct | TypeKind::Interface => None,
            TypeKind::Primitive(_) => {
                return Err(TypeError::InvalidDeclaration {
                    ty: name.to_owned(),
                    what: "a primitive kind",
                });
            }
        };

        Ok(self.push_type(name, kind, base))
    }

    pub fn add_interface(&mut self, ty: TypeId, interface: TypeId) -> Result<()> {
        if self.types[interface.index()].kind != TypeKind::Interface {
            return Err(TypeError::InvalidDeclaration {
                ty: self.type_name(ty).to_owned(),
                what: "a non-interface type as an interface",
            });
        }
        let def = &mut self.types[ty.index()];
        if !def.interfaces.contains(&interface) {
            def.interfaces.push(interface);
        }
        Ok(())
    }

    pub fn add_field(&mut self, ty: TypeId, name: &str, field_ty: TypeId, is_static: bool) -> Result<FieldId> {
        self.check_member_name(ty, name, |reg, sym| {
            reg.types[ty.index()]
                .fields
                .iter()
                .any(|&f| reg.fields[f.index()].name == sym)
        })?;
        if self.types[ty.index()].kind == TypeKind::Interface && !is_static {
            return Err(TypeError::InvalidDeclaration {
                ty: self.type_name(ty).to_owned(),
                what: "instance fields",
            });
        }
        Ok(self.push_field(ty, name, field_ty, is_static))
    }

    /// Declare a method. Methods may share a name only if their parameter lists differ.
    pub fn add_method(&mut self, ty: TypeId, sig: MethodSig) -> Result<MethodId> {
        let clash = self.interner.get(&sig.name).is_some_and(|sym| {
            self.types[ty.index()].methods.iter().any(|&m| {
                let def = &self.methods[m.index()];
                def.name == sym && def.params == sig.params
            })
        });
        if clash {
            return Err(TypeError::DuplicateMember {
                ty: self.type_name(ty).to_owned(),
                name: sig.name,
            });
        }
        if sig.kind == MethodKind::Constructor && sig.is_static {
            return Err(TypeError::InvalidDeclaration {
                ty: self.type_name(ty).to_owned(),
                what: "static constructors",
            });
        }
        Ok(self.push_method(ty, sig))
    }

    pub fn add_property(&mut self, ty: TypeId, name: &str, prop_ty: TypeId, is_static: bool) -> Result<PropertyId> {
        self.check_member_name(ty, name, |reg, sym| {
            reg.types[ty.index()]
                .properties
                .iter()
                .any(|&p| reg.properties[p.index()].name == sym)
        })?;
        Ok(self.push_property(ty, name, prop_ty, is_static, None, None))
    }

    pub fn set_property_accessors(
        &mut self,
        property: PropertyId,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    ) {
        let def = &mut self.properties[property.index()];
        if getter.is_some() {
            def.getter = getter;
        }
        if setter.is_some() {
            def.setter = setter;
        }
    }

    fn check_member_name(
        &self,
        ty: TypeId,
        name: &str,
        exists: impl Fn(&Self, Symbol) -> bool,
    ) -> Result<()> {
        match self.interner.get(name) {
            Some(sym) if exists(self, sym) => Err(TypeError::DuplicateMember {
                ty: self.type_name(ty).to_owned(),
                name: name.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    /// Number of defined types, including the well-known ones.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }
}

impl TypeSystem for TypeRegistry {
    fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    fn property(&self, id: PropertyId) -> &PropertyDef {
        &self.properties[id.index()]
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    fn lookup_type(&self, name: &str) -> Option<TypeId> {
        let sym = self.interner.get(name)?;
        self.by_name.get(&sym).copied()
    }

    fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        self.interner.get(name)
    }
}
