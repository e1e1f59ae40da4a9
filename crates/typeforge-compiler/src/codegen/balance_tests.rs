//! Randomly nested constructs must always produce a well-formed body.

use typeforge_bytecode::Instruction;
use typeforge_core::{TypeId, TypeRegistry};

use crate::test_utils::build_body;
use crate::{BodyBuilder, ForRange, LoopScope, MethodContext, Result};

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[derive(Clone, Copy, Debug)]
enum Exit {
    Break,
    Continue,
}

#[derive(Debug)]
enum Node {
    /// Push then pop `n` values.
    Push(u8),
    Seq(Vec<Node>, Option<Exit>),
    If(Box<Node>),
    IfElse(Box<Node>, Box<Node>),
    For(Box<Node>),
    Using(Box<Node>),
    TryCatch(Box<Node>, Box<Node>),
    TryFinally(Box<Node>, Box<Node>),
    /// Run the inner node with `n` extra values underneath it.
    Carry(u8, Box<Node>),
    /// `if_else` whose arms each leave one value, popped afterwards.
    Value(Box<Node>, Box<Node>),
}

/// `can_exit` is set inside a loop body, and cleared again inside a finally
/// handler, which cannot be left. `flat` forbids protected regions, which
/// need an empty stack.
fn generate(rng: &mut XorShift, depth: u32, can_exit: bool, flat: bool) -> Node {
    if depth == 0 {
        return Node::Push(1 + rng.below(2) as u8);
    }
    let d = depth - 1;
    let child = |rng: &mut XorShift, can_exit, flat| Box::new(generate(rng, d, can_exit, flat));
    match rng.below(10) {
        0 => Node::Push(1 + rng.below(2) as u8),
        1 => {
            let len = rng.below(3) as usize;
            let items = (0..len).map(|_| generate(rng, d, can_exit, flat)).collect();
            let exit = match (can_exit, rng.below(4)) {
                (true, 0) => Some(Exit::Break),
                (true, 1) => Some(Exit::Continue),
                _ => None,
            };
            Node::Seq(items, exit)
        }
        2 => Node::If(child(rng, can_exit, flat)),
        3 => Node::IfElse(child(rng, can_exit, flat), child(rng, can_exit, flat)),
        4 => Node::For(child(rng, true, flat)),
        5 if !flat => Node::Using(child(rng, can_exit, flat)),
        6 if !flat => Node::TryCatch(child(rng, can_exit, flat), child(rng, can_exit, flat)),
        7 if !flat => Node::TryFinally(child(rng, can_exit, flat), child(rng, false, flat)),
        5..=7 => Node::For(child(rng, true, flat)),
        8 => Node::Carry(1 + rng.below(2) as u8, child(rng, false, true)),
        _ => Node::Value(child(rng, false, flat), child(rng, false, flat)),
    }
}

/// Upper bound on the stack depth `node` reaches above its entry depth.
fn peak(node: &Node) -> u32 {
    match node {
        Node::Push(n) => u32::from(*n),
        Node::Seq(items, _) => items.iter().map(peak).max().unwrap_or(0),
        Node::If(then) | Node::Using(then) => peak(then).max(1),
        Node::IfElse(a, b) | Node::Value(a, b) | Node::TryCatch(a, b) | Node::TryFinally(a, b) => {
            peak(a).max(peak(b)).max(1)
        }
        Node::For(body) => peak(body).max(2),
        Node::Carry(n, inner) => u32::from(*n) + peak(inner),
    }
}

/// Lower `node` and check it leaves the stack where it found it.
fn lower(b: &mut BodyBuilder<'_>, node: &Node, scope: Option<LoopScope>) -> Result<()> {
    let before = b.emitter().depth();
    lower_node(b, node, scope)?;
    if b.emitter().is_reachable() {
        assert_eq!(b.emitter().depth(), before, "net depth of {node:?}");
    }
    Ok(())
}

fn lower_node(b: &mut BodyBuilder<'_>, node: &Node, scope: Option<LoopScope>) -> Result<()> {
    match node {
        Node::Push(n) => {
            for i in 0..*n {
                b.emit(Instruction::LdI32(i32::from(i)))?;
            }
            for _ in 0..*n {
                b.emit(Instruction::Pop)?;
            }
            Ok(())
        }
        Node::Seq(items, exit) => {
            for item in items {
                lower(b, item, scope)?;
            }
            match (exit, scope) {
                (Some(Exit::Break), Some(scope)) => scope.brk(b),
                (Some(Exit::Continue), Some(scope)) => scope.cont(b),
                _ => Ok(()),
            }
        }
        Node::If(then) => b.if_then(|b| b.emit(Instruction::LdBool(true)), |b| lower(b, then, scope)),
        Node::IfElse(then, otherwise) => b.if_else(
            |b| b.emit(Instruction::LdBool(false)),
            |b| lower(b, then, scope),
            |b| lower(b, otherwise, scope),
        ),
        Node::For(body) => b.for_range(ForRange::exclusive(0, 2), |b, inner| lower(b, body, Some(inner))),
        Node::Using(body) => b.using(TypeId::DISPOSABLE, |b| b.load_null(), |b, _| lower(b, body, scope)),
        Node::TryCatch(body, handler) => {
            let arm = b.catch_arm(TypeId::EXCEPTION, move |b, _| lower(b, handler, scope))?;
            b.try_catch(|b, _| lower(b, body, scope), vec![arm])
        }
        Node::TryFinally(body, finally) => {
            b.try_finally(|b, _| lower(b, body, scope), |b| lower(b, finally, None))
        }
        Node::Carry(n, inner) => {
            for i in 0..*n {
                b.emit(Instruction::LdI32(i32::from(i)))?;
            }
            lower(b, inner, None)?;
            for _ in 0..*n {
                b.emit(Instruction::Pop)?;
            }
            Ok(())
        }
        Node::Value(then, otherwise) => {
            let before = b.emitter().depth();
            b.if_else(
                |b| b.emit(Instruction::LdBool(true)),
                |b| {
                    lower(b, then, None)?;
                    b.emit(Instruction::LdI32(1))
                },
                |b| {
                    lower(b, otherwise, None)?;
                    b.emit(Instruction::LdI32(2))
                },
            )?;
            assert_eq!(b.emitter().depth(), before + 1, "if-else value of {node:?}");
            b.emit(Instruction::Pop)
        }
    }
}

#[test]
fn random_nesting_stays_balanced() {
    let types = TypeRegistry::new();

    for seed in 1..=200u64 {
        let mut rng = XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let tree = generate(&mut rng, 4, false, false);
        let ctx = MethodContext::static_method(TypeId::OBJECT, [], TypeId::VOID);

        let body = match build_body(&types, ctx, |b| lower(b, &tree, None)) {
            Ok(body) => body,
            Err(err) => panic!("seed {seed}: {err}\n{tree:#?}"),
        };

        let bound = peak(&tree);
        assert!(
            body.max_stack <= bound,
            "seed {seed}: max_stack {} above {bound}",
            body.max_stack
        );
        for h in &body.handlers {
            assert!(
                h.try_start < h.try_end && h.try_end <= h.handler_start && h.handler_start < h.handler_end,
                "seed {seed}: malformed handler {h:?}"
            );
        }
    }
}
