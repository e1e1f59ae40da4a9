use typeforge_bytecode::{ExceptionHandler, HandlerKind, Instruction, dump};
use typeforge_core::{TypeId, TypeRegistry};

use crate::{EmitConfig, EmitError, Emitter};

fn void_emitter() -> Emitter {
    Emitter::new(EmitConfig::default(), 0, false)
}

#[test]
fn try_finally_closes_parts_automatically() {
    let types = TypeRegistry::new();
    let mut em = void_emitter();

    let block = em.begin_try().unwrap();
    em.emit(Instruction::LdI32(1)).unwrap();
    em.emit(Instruction::Pop).unwrap();
    em.begin_finally(&block).unwrap();
    em.emit(Instruction::Nop).unwrap();
    em.end_block(block).unwrap();

    let body = em.finish().unwrap();

    insta::assert_snapshot!(dump(&body, &types), @r"
    max_stack: 1
    code:
      0000 ldc.i4 1
      0001 pop
      0002 leave 0005
      0003 nop
      0004 endfinally
      0005 ret
    handlers:
      try [0000, 0003) finally [0003, 0005)
    ");
}

#[test]
fn catch_handlers_start_with_exception_pushed() {
    let types = TypeRegistry::new();
    let mut em = void_emitter();

    let block = em.begin_try().unwrap();
    em.emit(Instruction::Nop).unwrap();
    em.begin_catch(&block, TypeId::ARGUMENT).unwrap();
    assert_eq!(em.depth(), 1);
    em.emit(Instruction::Pop).unwrap();
    em.begin_catch(&block, TypeId::EXCEPTION).unwrap();
    em.emit(Instruction::Pop).unwrap();
    em.end_block(block).unwrap();

    let body = em.finish().unwrap();

    insta::assert_snapshot!(dump(&body, &types), @r"
    max_stack: 1
    code:
      0000 nop
      0001 leave 0006
      0002 pop
      0003 leave 0006
      0004 pop
      0005 leave 0006
      0006 ret
    handlers:
      try [0000, 0002) catch ArgumentException [0002, 0004)
      try [0000, 0002) catch Exception [0004, 0006)
    ");
}

#[test]
fn nested_handlers_are_listed_innermost_first() {
    let mut em = void_emitter();

    let outer = em.begin_try().unwrap();
    let inner = em.begin_try().unwrap();
    em.emit(Instruction::Nop).unwrap();
    em.begin_finally(&inner).unwrap();
    em.end_block(inner).unwrap();
    em.begin_catch(&outer, TypeId::EXCEPTION).unwrap();
    em.emit(Instruction::Pop).unwrap();
    em.end_block(outer).unwrap();

    let body = em.finish().unwrap();

    assert_eq!(
        body.handlers,
        vec![
            ExceptionHandler {
                kind: HandlerKind::Finally,
                try_start: 0,
                try_end: 2,
                handler_start: 2,
                handler_end: 3,
            },
            ExceptionHandler {
                kind: HandlerKind::Catch(TypeId::EXCEPTION),
                try_start: 0,
                try_end: 4,
                handler_start: 4,
                handler_end: 6,
            },
        ]
    );
}

#[test]
fn branch_out_of_try_is_rejected() {
    let mut em = void_emitter();
    let outside = em.define_label();
    em.bind_label(outside).unwrap();

    let _block = em.begin_try().unwrap();
    let err = em.emit(Instruction::Br(outside)).unwrap_err();

    assert_eq!(err, EmitError::BranchOutOfRegion(outside));
}

#[test]
fn pending_branch_out_of_try_is_reported_at_bind() {
    let mut em = void_emitter();
    let outside = em.define_label();

    let block = em.begin_try().unwrap();
    em.emit(Instruction::Br(outside)).unwrap();
    em.begin_finally(&block).unwrap();
    em.end_block(block).unwrap();

    assert_eq!(
        em.bind_label(outside).unwrap_err(),
        EmitError::BranchOutOfRegion(outside)
    );
}

#[test]
fn leave_into_region_is_rejected() {
    let mut em = void_emitter();

    let block = em.begin_try().unwrap();
    let inside = em.define_label();
    em.bind_label(inside).unwrap();
    em.begin_finally(&block).unwrap();
    em.end_block(block).unwrap();

    assert_eq!(
        em.emit(Instruction::Leave(inside)).unwrap_err(),
        EmitError::LeaveIntoRegion(inside)
    );
}

#[test]
fn leave_to_enclosing_label_is_allowed() {
    let mut em = void_emitter();
    let after = em.define_label();

    let block = em.begin_try().unwrap();
    em.emit(Instruction::Leave(after)).unwrap();
    em.begin_finally(&block).unwrap();
    em.end_block(block).unwrap();
    em.bind_label(after).unwrap();

    assert!(em.finish().is_ok());
}

#[test]
fn try_requires_empty_stack() {
    let mut em = void_emitter();
    em.emit(Instruction::LdI32(1)).unwrap();

    assert_eq!(em.begin_try().unwrap_err(), EmitError::NonEmptyStackAtRegion(1));
}

#[test]
fn only_innermost_block_can_be_closed() {
    let mut em = void_emitter();
    let outer = em.begin_try().unwrap();
    let _inner = em.begin_try().unwrap();

    assert_eq!(em.begin_finally(&outer).unwrap_err(), EmitError::BlockNotInnermost);
}

#[test]
fn block_without_handler_cannot_close() {
    let mut em = void_emitter();
    let block = em.begin_try().unwrap();

    assert_eq!(em.end_block(block).unwrap_err(), EmitError::MissingHandler);
}

#[test]
fn catch_and_finally_do_not_mix() {
    let mut em = void_emitter();
    let block = em.begin_try().unwrap();
    em.begin_catch(&block, TypeId::EXCEPTION).unwrap();
    em.emit(Instruction::Pop).unwrap();

    assert_eq!(
        em.begin_finally(&block).unwrap_err(),
        EmitError::HandlerOrder("finally after catch")
    );
}

#[test]
fn open_blocks_fail_finish() {
    let mut em = void_emitter();
    let _block = em.begin_try().unwrap();

    assert_eq!(em.finish().unwrap_err(), EmitError::UnclosedBlocks(1));
}

#[test]
fn ret_inside_region_is_rejected() {
    let mut em = void_emitter();
    let _block = em.begin_try().unwrap();

    assert_eq!(em.emit(Instruction::Ret).unwrap_err(), EmitError::ReturnInsideRegion);
}

#[test]
fn rethrow_only_inside_catch() {
    let mut em = void_emitter();
    let block = em.begin_try().unwrap();

    assert_eq!(em.emit(Instruction::Rethrow).unwrap_err(), EmitError::RethrowOutsideCatch);

    em.begin_catch(&block, TypeId::EXCEPTION).unwrap();
    em.emit(Instruction::Pop).unwrap();
    em.emit(Instruction::Rethrow).unwrap();
    em.end_block(block).unwrap();
    assert!(em.finish().is_ok());
}

#[test]
fn non_empty_stack_at_handler_boundary_is_rejected() {
    let mut em = void_emitter();
    let block = em.begin_try().unwrap();
    em.emit(Instruction::LdI32(1)).unwrap();

    assert_eq!(
        em.begin_finally(&block).unwrap_err(),
        EmitError::NonEmptyStackAtRegion(1)
    );
}

#[test]
fn leave_out_of_finally_is_rejected() {
    let mut em = void_emitter();
    let before = em.define_label();
    em.bind_label(before).unwrap();

    let block = em.begin_try().unwrap();
    em.begin_finally(&block).unwrap();

    assert_eq!(
        em.emit(Instruction::Leave(before)).unwrap_err(),
        EmitError::LeaveOutOfFinally(before)
    );
}
