//! Bodies lowered by the compiler, run end to end.

use typeforge_bytecode::{Instruction, Module};
use typeforge_compiler::{
    BodyBuilder, CompositeLoader, Constant, ConstantLoader, ConstantRegistry, ForRange, LoadCtx,
    Receiver, TypeBuilder,
};
use typeforge_core::{FieldId, FieldRef, MethodId, MethodSig, TypeId, TypeRegistry, TypeSystem};

use crate::{FuelLimits, PrintTracer, RuntimeError, Value, Vm};

type BuildResult<T> = typeforge_compiler::Result<T>;

struct Program {
    types: TypeRegistry,
    module: Module,
}

impl Program {
    fn new() -> Self {
        Self {
            types: TypeRegistry::new(),
            module: Module::new(),
        }
    }

    fn class<R>(&mut self, name: &str, f: impl FnOnce(&mut TypeBuilder<'_>) -> BuildResult<R>) -> R {
        self.class_with(&ConstantRegistry::builtin(), name, f)
    }

    fn class_with<R>(
        &mut self,
        constants: &ConstantRegistry,
        name: &str,
        f: impl FnOnce(&mut TypeBuilder<'_>) -> BuildResult<R>,
    ) -> R {
        let mut tb = TypeBuilder::define_class(&mut self.types, &mut self.module, constants, name, None).unwrap();
        let out = f(&mut tb).unwrap();
        tb.finish();
        out
    }

    fn structure<R>(&mut self, name: &str, f: impl FnOnce(&mut TypeBuilder<'_>) -> BuildResult<R>) -> R {
        let constants = ConstantRegistry::builtin();
        let mut tb = TypeBuilder::define_struct(&mut self.types, &mut self.module, &constants, name).unwrap();
        let out = f(&mut tb).unwrap();
        tb.finish();
        out
    }

    fn method(&self, ty: TypeId, name: &str) -> MethodId {
        self.types.resolve_method(ty, name, &[]).unwrap().id
    }

    fn vm(&self) -> Vm<'_> {
        Vm::new(&self.types, &self.module, FuelLimits::default())
    }
}

fn static_void(name: &str) -> MethodSig {
    MethodSig::new(name, TypeId::VOID).make_static()
}

fn increment(b: &mut BodyBuilder<'_>, field: FieldRef) -> BuildResult<()> {
    b.store_field(field, Receiver::Implicit, |b| {
        b.load_field(field, Receiver::Implicit)?;
        b.emit(Instruction::LdI32(1))?;
        b.emit(Instruction::Add)
    })
}

/// `log = log * 10 + digit`, where `digit` pushes the value to append.
fn append(
    b: &mut BodyBuilder<'_>,
    log: FieldRef,
    digit: impl FnOnce(&mut BodyBuilder<'_>) -> BuildResult<()>,
) -> BuildResult<()> {
    b.store_field(log, Receiver::Implicit, |b| {
        b.load_field(log, Receiver::Implicit)?;
        b.emit(Instruction::LdI32(10))?;
        b.emit(Instruction::Mul)?;
        digit(b)?;
        b.emit(Instruction::Add)
    })
}

fn append_digit(b: &mut BodyBuilder<'_>, log: FieldRef, digit: i32) -> BuildResult<()> {
    append(b, log, |b| b.emit(Instruction::LdI32(digit)))
}

fn equals_i32(b: &mut BodyBuilder<'_>, push: impl FnOnce(&mut BodyBuilder<'_>) -> BuildResult<()>, value: i32) -> BuildResult<()> {
    push(b)?;
    b.emit(Instruction::LdI32(value))?;
    b.emit(Instruction::Ceq)
}

#[test]
fn for_range_visits_every_value_even_with_continue() {
    let mut p = Program::new();
    let (inclusive, exclusive, sum, count) = p.class("Loops", |tb| {
        let sum = tb.add_static_field("sum", TypeId::I32)?;
        let count = tb.add_static_field("count", TypeId::I32)?;
        let inclusive = tb.add_method(static_void("Inclusive"), |b| {
            b.for_range(ForRange::inclusive(0, 4), |b, scope| {
                append(b, sum, |b| b.load_local(scope.var))?;
                b.if_then(|b| equals_i32(b, |b| b.load_local(scope.var), 2), |b| scope.cont(b))?;
                increment(b, count)
            })
        })?;
        let exclusive = tb.add_method(static_void("Exclusive"), |b| {
            b.for_range(ForRange::exclusive(0, 4), |b, scope| append(b, sum, |b| b.load_local(scope.var)))
        })?;
        Ok((inclusive.method.id, exclusive.method.id, sum.id, count.id))
    });

    let mut vm = p.vm();
    vm.invoke(inclusive, vec![]).unwrap();
    assert_eq!(vm.static_field(sum), Value::I32(1234));
    assert_eq!(vm.static_field(count), Value::I32(4));

    let mut vm = p.vm();
    vm.invoke(exclusive, vec![]).unwrap();
    assert_eq!(vm.static_field(sum), Value::I32(123));
}

struct Disposables {
    run: MethodId,
    run_null: MethodId,
    disposed: FieldId,
}

fn disposables(p: &mut Program) -> Disposables {
    let dispose = p.method(TypeId::DISPOSABLE, "Dispose");
    p.class("Resource", |tb| {
        tb.implement(TypeId::DISPOSABLE)?;
        let disposed = tb.add_static_field("disposed", TypeId::I32)?;
        let ctor = tb.add_default_constructor()?.method;
        tb.override_method(dispose, |b| increment(b, disposed))?;
        let resource = tb.id();

        let run = tb.add_method(static_void("Run").param(TypeId::BOOL), |b| {
            b.using(
                resource,
                |b| b.new_object(ctor, |_| Ok(())),
                |b, _| {
                    b.if_then(
                        |b| b.load_param(0),
                        |b| b.throw_message(TypeId::INVALID_OPERATION, "fail"),
                    )
                },
            )
        })?;
        let run_null = tb.add_method(static_void("RunNull"), |b| b.using(resource, |b| b.load_null(), |_, _| Ok(())))?;

        Ok(Disposables {
            run: run.method.id,
            run_null: run_null.method.id,
            disposed: disposed.id,
        })
    })
}

#[test]
fn using_disposes_on_normal_and_exceptional_exit() {
    let mut p = Program::new();
    let d = disposables(&mut p);
    let mut vm = p.vm();

    assert_eq!(vm.invoke(d.run, vec![Value::Bool(false)]), Ok(None));
    assert_eq!(vm.static_field(d.disposed), Value::I32(1));

    assert_eq!(
        vm.invoke(d.run, vec![Value::Bool(true)]),
        Err(RuntimeError::Unhandled {
            ty: "InvalidOperationException".into(),
            message: Some("fail".into()),
        })
    );
    assert_eq!(vm.static_field(d.disposed), Value::I32(2));
}

#[test]
fn using_never_disposes_null() {
    let mut p = Program::new();
    let d = disposables(&mut p);
    let mut vm = p.vm();

    assert_eq!(vm.invoke(d.run_null, vec![]), Ok(None));
    assert_eq!(vm.static_field(d.disposed), Value::I32(0));
}

#[test]
fn try_catch_finally_runs_in_order() {
    let mut p = Program::new();
    let (caught, escaped, log) = p.class("Flow", |tb| {
        let log = tb.add_static_field("log", TypeId::I32)?;
        let body = |arm_ty: TypeId| {
            move |b: &mut BodyBuilder<'_>| -> BuildResult<()> {
                let arm = b.catch_arm(arm_ty, move |b, _| append_digit(b, log, 2))?;
                b.try_catch_finally(
                    |b, _| {
                        append_digit(b, log, 1)?;
                        b.throw_message(TypeId::ARGUMENT, "bad")
                    },
                    vec![arm],
                    |b| append_digit(b, log, 3),
                )?;
                append_digit(b, log, 4)
            }
        };
        let caught = tb.add_method(static_void("Caught"), body(TypeId::ARGUMENT))?;
        let escaped = tb.add_method(static_void("Escaped"), body(TypeId::INVALID_OPERATION))?;
        Ok((caught.method.id, escaped.method.id, log.id))
    });

    let mut vm = p.vm();
    assert_eq!(vm.invoke(caught, vec![]), Ok(None));
    assert_eq!(vm.static_field(log), Value::I32(1234));

    let mut vm = p.vm();
    assert_eq!(
        vm.invoke(escaped, vec![]),
        Err(RuntimeError::Unhandled {
            ty: "ArgumentException".into(),
            message: Some("bad".into()),
        })
    );
    assert_eq!(vm.static_field(log), Value::I32(13));
}

#[test]
fn catch_sees_the_thrown_exception() {
    let mut p = Program::new();
    let message = p.types.resolve_property(TypeId::EXCEPTION, "Message").unwrap();
    let run = p.class("Probe", |tb| {
        let sig = MethodSig::new("Run", TypeId::STR).make_static();
        let info = tb.add_method(sig, |b| {
            let result = b.declare_local(TypeId::STR)?;
            let arm = b.catch_arm(TypeId::EXCEPTION, move |b, scope| {
                b.load_local(scope.exception)?;
                b.load_property(message, Receiver::OnStack)?;
                b.store_local(result)
            })?;
            b.try_catch(|b, _| b.throw_message(TypeId::ARGUMENT, "inner"), vec![arm])?;
            b.ret_value(|b| b.load_local(result))
        })?;
        Ok(info.method.id)
    });

    assert_eq!(p.vm().invoke(run, vec![]), Ok(Some(Value::from("inner"))));
}

struct Enumeration {
    all: MethodId,
    until_two: MethodId,
    sum: FieldId,
    disposed: FieldId,
}

/// `Range` yields 1, 2, 3 through a `Counter` enumerator.
fn enumeration(p: &mut Program) -> Enumeration {
    let move_next = p.method(TypeId::ENUMERATOR, "MoveNext");
    let get_current = p.method(TypeId::ENUMERATOR, "get_Current");
    let dispose = p.method(TypeId::DISPOSABLE, "Dispose");
    let get_enumerator = p.method(TypeId::ENUMERABLE, "GetEnumerator");

    let (counter_ctor, disposed) = p.class("Counter", |tb| {
        tb.implement(TypeId::ENUMERATOR)?;
        let i = tb.add_field("i", TypeId::I32)?;
        let disposed = tb.add_static_field("disposed", TypeId::I32)?;
        let ctor = tb.add_default_constructor()?.method;
        tb.override_method(move_next, |b| {
            increment(b, i)?;
            b.ret_value(|b| {
                b.load_field(i, Receiver::Implicit)?;
                b.emit(Instruction::LdI32(3))?;
                b.emit(Instruction::Cgt)?;
                b.emit(Instruction::Not)
            })
        })?;
        tb.override_method(get_current, |b| b.ret_value(|b| b.load_field(i, Receiver::Implicit)))?;
        tb.override_method(dispose, |b| increment(b, disposed))?;
        Ok((ctor, disposed.id))
    });

    let range_ctor = p.class("Range", |tb| {
        tb.implement(TypeId::ENUMERABLE)?;
        let ctor = tb.add_default_constructor()?.method;
        tb.override_method(get_enumerator, |b| {
            b.ret_value(|b| b.new_object(counter_ctor, |_| Ok(())))
        })?;
        Ok(ctor)
    });

    p.class("Program", |tb| {
        let sum = tb.add_static_field("sum", TypeId::I32)?;
        let source = |b: &mut BodyBuilder<'_>| b.new_object(range_ctor, |_| Ok(()));
        let all = tb.add_method(static_void("All"), |b| {
            b.for_each(TypeId::OBJECT, source, |b, scope| append(b, sum, |b| b.load_local(scope.var)))
        })?;
        let until_two = tb.add_method(static_void("UntilTwo"), |b| {
            b.for_each(TypeId::OBJECT, source, |b, scope| {
                b.if_then(|b| equals_i32(b, |b| b.load_local(scope.var), 2), |b| scope.brk(b))?;
                append(b, sum, |b| b.load_local(scope.var))
            })
        })?;
        Ok(Enumeration {
            all: all.method.id,
            until_two: until_two.method.id,
            sum: sum.id,
            disposed,
        })
    })
}

#[test]
fn foreach_visits_every_element_and_disposes() {
    let mut p = Program::new();
    let e = enumeration(&mut p);
    let mut vm = p.vm();

    vm.invoke(e.all, vec![]).unwrap();

    assert_eq!(vm.static_field(e.sum), Value::I32(123));
    assert_eq!(vm.static_field(e.disposed), Value::I32(1));
}

#[test]
fn foreach_break_still_disposes() {
    let mut p = Program::new();
    let e = enumeration(&mut p);
    let mut vm = p.vm();

    vm.invoke(e.until_two, vec![]).unwrap();

    assert_eq!(vm.static_field(e.sum), Value::I32(1));
    assert_eq!(vm.static_field(e.disposed), Value::I32(1));
}

#[test]
fn auto_property_reads_back_what_was_stored() {
    let mut p = Program::new();
    let (ctor, count) = p.class("Counter", |tb| {
        let ctor = tb.add_default_constructor()?;
        let count = tb.add_auto_property("Count", TypeId::I32)?;
        Ok((ctor.method.id, count.property.id))
    });
    let mut vm = p.vm();

    let counter = vm.construct(ctor, vec![]).unwrap();
    assert_eq!(vm.get_property(&counter, count), Ok(Value::I32(0)));

    vm.set_property(&counter, count, Value::I32(5)).unwrap();
    assert_eq!(vm.get_property(&counter, count), Ok(Value::I32(5)));
}

#[test]
fn struct_property_has_value_semantics() {
    let mut p = Program::new();
    let (ctor, x) = p.structure("Point", |tb| {
        let ctor = tb.add_default_constructor()?;
        let x = tb.add_auto_property("X", TypeId::I32)?;
        Ok((ctor.method.id, x.property.id))
    });
    let mut vm = p.vm();

    let point = vm.construct(ctor, vec![]).unwrap();
    vm.set_property(&point, x, Value::I32(5)).unwrap();
    let copy = point.copied();
    vm.set_property(&copy, x, Value::I32(7)).unwrap();

    assert_eq!(vm.get_property(&point, x), Ok(Value::I32(5)));
    assert_eq!(vm.get_property(&copy, x), Ok(Value::I32(7)));
}

#[test]
fn notifying_property_skips_equal_values() {
    let mut p = Program::new();
    let (ctor, count, name, changes) = p.class("Model", |tb| {
        let changes = tb.add_static_field("changes", TypeId::I32)?;
        let ctor = tb.add_default_constructor()?;
        let count = tb.add_notifying_property("Count", TypeId::I32, |b| increment(b, changes))?;
        let name = tb.add_notifying_property("Name", TypeId::STR, |b| increment(b, changes))?;
        Ok((ctor.method.id, count.property.id, name.property.id, changes.id))
    });
    let mut vm = p.vm();
    let model = vm.construct(ctor, vec![]).unwrap();

    vm.set_property(&model, count, Value::I32(5)).unwrap();
    vm.set_property(&model, count, Value::I32(5)).unwrap();
    assert_eq!(vm.static_field(changes), Value::I32(1));
    assert_eq!(vm.get_property(&model, count), Ok(Value::I32(5)));

    vm.set_property(&model, count, Value::I32(6)).unwrap();
    assert_eq!(vm.static_field(changes), Value::I32(2));

    // Reference types compare through `Object::Equals`, which handles null.
    vm.set_property(&model, name, Value::Null).unwrap();
    assert_eq!(vm.static_field(changes), Value::I32(2));
    vm.set_property(&model, name, Value::from("a")).unwrap();
    vm.set_property(&model, name, Value::from("a")).unwrap();
    assert_eq!(vm.static_field(changes), Value::I32(3));
    vm.set_property(&model, name, Value::Null).unwrap();
    assert_eq!(vm.static_field(changes), Value::I32(4));
}

struct Fixed(i32);

impl ConstantLoader for Fixed {
    fn ty(&self) -> TypeId {
        TypeId::I32
    }

    fn load(&self, cx: &mut LoadCtx<'_>, _value: &Constant) -> BuildResult<()> {
        cx.em.emit(Instruction::LdI32(self.0))
    }
}

#[test]
fn first_registered_loader_wins() {
    let mut p = Program::new();
    let limit = |p: &mut Program, name: &str, constants: ConstantRegistry| {
        p.class_with(&constants, name, |tb| {
            let ctor = tb.add_default_constructor()?;
            let limit = tb.add_constant_property("Limit", TypeId::I32, Constant::from(10))?;
            Ok((ctor.method.id, limit.property.id))
        })
    };
    let builtin_first = limit(&mut p, "Builtin", ConstantRegistry::builtin().with(Fixed(99)));
    let custom_only = limit(&mut p, "Custom", ConstantRegistry::empty().with(Fixed(99)));
    let mut vm = p.vm();

    for ((ctor, property), expected) in [(builtin_first, 10), (custom_only, 99)] {
        let obj = vm.construct(ctor, vec![]).unwrap();
        assert_eq!(vm.get_property(&obj, property), Ok(Value::I32(expected)));
    }
}

#[test]
fn struct_constants_use_the_composite_loader_or_the_default() {
    let mut p = Program::new();
    let (point, x, y) = p.structure("Point", |tb| {
        let x = tb.add_field("x", TypeId::I32)?;
        let y = tb.add_field("y", TypeId::I32)?;
        tb.add_default_constructor()?;
        tb.add_constructor([TypeId::I32, TypeId::I32], |b| {
            b.store_field(x, Receiver::Implicit, |b| b.load_param(0))?;
            b.store_field(y, Receiver::Implicit, |b| b.load_param(1))
        })?;
        Ok((tb.id(), x.id, y.id))
    });

    let constants = ConstantRegistry::builtin().with(CompositeLoader::new(point));
    let (shapes_ctor, origin) = p.class_with(&constants, "Shapes", |tb| {
        let ctor = tb.add_default_constructor()?;
        let origin = tb.add_constant_property(
            "Origin",
            point,
            Constant::Composite {
                ty: point,
                fields: vec![Constant::from(3), Constant::from(4)],
            },
        )?;
        Ok((ctor.method.id, origin.property.id))
    });
    // No loader for `Point` here: a null constant becomes its default value.
    let (defaults_ctor, empty) = p.class("Defaults", |tb| {
        let ctor = tb.add_default_constructor()?;
        let empty = tb.add_constant_property("Empty", point, Constant::Null)?;
        Ok((ctor.method.id, empty.property.id))
    });
    let mut vm = p.vm();

    let shapes = vm.construct(shapes_ctor, vec![]).unwrap();
    let value = vm.get_property(&shapes, origin).unwrap();
    let fields = value.instance().map(|o| (o.get(x), o.get(y)));
    assert_eq!(fields, Some((Some(Value::I32(3)), Some(Value::I32(4)))));

    let defaults = vm.construct(defaults_ctor, vec![]).unwrap();
    let value = vm.get_property(&defaults, empty).unwrap();
    assert_eq!(value.type_id(), Some(point));
    assert_eq!(value.instance().and_then(|o| o.get(x)), Some(Value::I32(0)));
}

#[test]
fn notifying_setter_stores_once_for_repeated_value() {
    let mut p = Program::new();
    let (ctor, count) = p.class("Model", |tb| {
        let ctor = tb.add_default_constructor()?;
        let count = tb.add_notifying_property("Count", TypeId::I32, |_| Ok(()))?;
        Ok((ctor.method.id, count))
    });
    let setter = count.setter.unwrap().id;
    let mut vm = p.vm();
    let model = vm.construct(ctor, vec![]).unwrap();
    let mut tracer = PrintTracer::new(&p.types).events_only();

    for _ in 0..2 {
        vm.invoke_with(setter, vec![model.clone(), Value::I32(5)], &mut tracer)
            .unwrap();
    }

    let stores = tracer.lines().iter().filter(|l| l.contains("store Model::")).count();
    assert_eq!(stores, 1);
    assert_eq!(vm.get_property(&model, count.property.id), Ok(Value::I32(5)));
}
