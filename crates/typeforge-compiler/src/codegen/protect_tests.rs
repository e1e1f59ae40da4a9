use typeforge_bytecode::{Instruction, Target};
use typeforge_core::{PropertyRef, TypeId, TypeKind, TypeRegistry, TypeSystem};

use crate::test_utils::{build_body, dump_static, static_error};
use crate::{EmitError, MethodContext, Receiver};

fn static_void() -> MethodContext {
    MethodContext::static_method(TypeId::OBJECT, [], TypeId::VOID)
}

#[test]
fn try_catch_finally_nests_catch_inside_finally() {
    let types = TypeRegistry::new();

    let out = dump_static(&types, |b| {
        let arm = b.catch_arm(TypeId::EXCEPTION, |_, _| Ok(()))?;
        b.try_catch_finally(
            |b, _| b.throw_new(TypeId::INVALID_OPERATION),
            vec![arm],
            |b| b.emit(Instruction::Nop),
        )
    });

    insta::assert_snapshot!(out, @r"
    max_stack: 1
    locals:
      #0 Exception
    code:
      0000 newobj InvalidOperationException::.ctor
      0001 throw
      0002 stloc #0
      0003 leave 0004
      0004 leave 0007
      0005 nop
      0006 endfinally
      0007 ret
    handlers:
      try [0000, 0002) catch Exception [0002, 0004)
      try [0000, 0005) finally [0005, 0007)
    ");
}

#[test]
fn using_skips_dispose_for_null() {
    let types = TypeRegistry::new();

    let out = dump_static(&types, |b| b.using(TypeId::DISPOSABLE, |b| b.load_null(), |_, _| Ok(())));

    insta::assert_snapshot!(out, @r"
    max_stack: 1
    locals:
      #0 IDisposable
    code:
      0000 ldnull
      0001 stloc #0
      0002 leave 0008
      0003 ldloc #0
      0004 brfalse 0007
      0005 ldloc #0
      0006 callvirt IDisposable::Dispose
      0007 endfinally
      0008 ret
    handlers:
      try [0002, 0003) finally [0003, 0008)
    ");
}

#[test]
fn foreach_lowers_to_enumerator_protocol() {
    let types = TypeRegistry::new();

    let out = dump_static(&types, |b| b.for_each(TypeId::OBJECT, |b| b.load_null(), |_, _| Ok(())));

    insta::assert_snapshot!(out, @r"
    max_stack: 1
    locals:
      #0 IEnumerator
      #1 Object
    code:
      0000 ldnull
      0001 callvirt IEnumerable::GetEnumerator
      0002 stloc #0
      0003 br 0007
      0004 ldloc #0
      0005 callvirt IEnumerator::get_Current
      0006 stloc #1
      0007 ldloc #0
      0008 callvirt IEnumerator::MoveNext
      0009 brtrue 0004
      0010 leave 0016
      0011 ldloc #0
      0012 brfalse 0015
      0013 ldloc #0
      0014 callvirt IDisposable::Dispose
      0015 endfinally
      0016 ret
    handlers:
      try [0003, 0011) finally [0011, 0016)
    ");
}

#[test]
fn foreach_break_stays_inside_the_using_region() {
    let types = TypeRegistry::new();

    let body = build_body(&types, static_void(), |b| {
        b.for_each(TypeId::OBJECT, |b| b.load_null(), |b, scope| scope.brk(b))
    })
    .unwrap();

    // Body `br` to the loop end, which sits before the region's own `leave`.
    assert_eq!(body.instructions[7], Instruction::Br(Target::new(11)));
    assert_eq!(body.instructions[11], Instruction::Leave(Target::new(17)));
}

#[test]
fn catch_arm_requires_exception_type() {
    let types = TypeRegistry::new();

    let err = static_error(&types, |b| {
        b.catch_arm(TypeId::STR, |_, _| Ok(()))?;
        Ok(())
    });

    assert_eq!(err, EmitError::NotAnException("str".into()));
}

#[test]
fn throw_requires_exception_type() {
    let types = TypeRegistry::new();

    let err = static_error(&types, |b| b.throw_new(TypeId::OBJECT));

    assert_eq!(err, EmitError::NotAnException("Object".into()));
}

#[test]
fn try_catch_needs_an_arm() {
    let types = TypeRegistry::new();

    let err = static_error(&types, |b| b.try_catch(|_, _| Ok(()), Vec::new()));

    assert_eq!(err, EmitError::NoCatchArms);
}

#[test]
fn raw_branch_to_exit_is_rejected() {
    let types = TypeRegistry::new();

    let err = static_error(&types, |b| b.try_finally(|b, exit| b.branch(exit), |_| Ok(())));

    assert!(matches!(err, EmitError::BranchOutOfRegion(_)));
}

#[test]
fn leave_to_exit_is_accepted() {
    let types = TypeRegistry::new();

    let body = build_body(&types, static_void(), |b| {
        b.try_finally(|b, exit| b.leave(exit), |_| Ok(()))
    })
    .unwrap();

    assert_eq!(body.instructions[0], Instruction::Leave(Target::new(2)));
    assert_eq!(body.handlers.len(), 1);
}

#[test]
fn catch_body_can_rethrow() {
    let types = TypeRegistry::new();

    let body = build_body(&types, static_void(), |b| {
        let arm = b.catch_arm(TypeId::ARGUMENT, |b, _| b.rethrow())?;
        b.try_catch(|b, _| b.throw_message(TypeId::ARGUMENT, "bad"), vec![arm])
    })
    .unwrap();

    assert_eq!(body.instructions[0], Instruction::LdStr("bad".into()));
    assert!(matches!(body.instructions[1], Instruction::NewObj(_)));
    assert_eq!(body.instructions[2], Instruction::Throw);
    assert_eq!(body.instructions[4], Instruction::Rethrow);
}

#[test]
fn catch_scope_exposes_the_exception() {
    let types = TypeRegistry::new();
    let message = types_message(&types);

    let out = dump_static(&types, |b| {
        let arm = b.catch_arm(TypeId::EXCEPTION, move |b, scope| {
            b.load_local(scope.exception)?;
            b.load_property(message, Receiver::OnStack)?;
            b.emit(Instruction::Pop)
        })?;
        b.try_catch(|_, _| Ok(()), vec![arm])
    });

    insta::assert_snapshot!(out, @r"
    max_stack: 1
    locals:
      #0 Exception
    code:
      0000 leave 0006
      0001 stloc #0
      0002 ldloc #0
      0003 call Exception::get_Message
      0004 pop
      0005 leave 0006
      0006 ret
    handlers:
      try [0000, 0001) catch Exception [0001, 0006)
    ");
}

#[test]
fn using_rejects_non_disposable_local() {
    let types = TypeRegistry::new();

    let err = static_error(&types, |b| {
        let local = b.declare_local(TypeId::I32)?;
        b.using_local(local, |_, _| Ok(()))
    });

    assert_eq!(err, EmitError::NotDisposable("i32".into()));
}

#[test]
fn using_rejects_non_disposable_resource_type() {
    let types = TypeRegistry::new();

    let err = static_error(&types, |b| {
        b.using(TypeId::OBJECT, |b| b.load_null(), |_, _| Ok(()))
    });

    assert_eq!(err, EmitError::NotDisposable("Object".into()));
}

#[test]
fn using_keeps_the_resource_type_on_its_local() {
    let mut types = TypeRegistry::new();
    let file = types.define_type("File", TypeKind::Class, None).unwrap();
    types.add_interface(file, TypeId::DISPOSABLE).unwrap();

    let out = dump_static(&types, |b| b.using(file, |b| b.load_null(), |_, _| Ok(())));

    assert!(out.contains("#0 File"), "{out}");
    assert!(out.contains("callvirt IDisposable::Dispose"), "{out}");
}

fn types_message(types: &TypeRegistry) -> PropertyRef {
    types.resolve_property(TypeId::EXCEPTION, "Message").unwrap()
}
