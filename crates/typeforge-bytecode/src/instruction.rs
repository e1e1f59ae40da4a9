//! Stack-machine instructions.

use serde::{Deserialize, Serialize};

use typeforge_core::{FieldId, MethodId, TypeId};

use crate::body::Target;
use crate::ids::{Label, Local};

/// One primitive operation.
///
/// `T` is the branch-target representation: `Label` while a body is being
/// emitted, `Target` (a resolved instruction index) once it is finalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Instruction<T = Target> {
    Nop,

    // Constants
    LdNull,
    LdBool(bool),
    LdI32(i32),
    LdI64(i64),
    LdF64(f64),
    LdStr(String),

    // Arguments and locals. Argument 0 is `this` for instance methods.
    LdArg(u16),
    StArg(u16),
    LdLoc(Local),
    StLoc(Local),

    // Stack
    Dup,
    Pop,

    // Arithmetic and comparison
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    Ceq,
    Cgt,
    Clt,

    // Branches
    Br(T),
    BrTrue(T),
    BrFalse(T),
    Beq(T),
    Bne(T),
    Bgt(T),
    Bge(T),
    Blt(T),
    Ble(T),

    // Members
    LdFld(FieldId),
    StFld(FieldId),
    LdSFld(FieldId),
    StSFld(FieldId),
    Call(MethodId),
    CallVirt(MethodId),
    NewObj(MethodId),

    // Types
    IsInst(TypeId),

    // Exceptional flow
    Throw,
    Rethrow,
    /// Exit a protected region, running intervening `finally` handlers.
    /// Empties the evaluation stack.
    Leave(T),
    EndFinally,

    Ret,
}

/// Pre-layout instruction with symbolic targets.
pub type InstructionIR = Instruction<Label>;

impl<T: Copy> Instruction<T> {
    /// Branch target, if this instruction transfers control to one.
    pub fn target(&self) -> Option<T> {
        match *self {
            Self::Br(t)
            | Self::BrTrue(t)
            | Self::BrFalse(t)
            | Self::Beq(t)
            | Self::Bne(t)
            | Self::Bgt(t)
            | Self::Bge(t)
            | Self::Blt(t)
            | Self::Ble(t)
            | Self::Leave(t) => Some(t),
            _ => None,
        }
    }
}

impl<T> Instruction<T> {
    /// Rewrite the branch target, failing if `f` does.
    pub fn try_map_target<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Instruction<U>, E> {
        use Instruction::*;
        Ok(match self {
            Br(t) => Br(f(t)?),
            BrTrue(t) => BrTrue(f(t)?),
            BrFalse(t) => BrFalse(f(t)?),
            Beq(t) => Beq(f(t)?),
            Bne(t) => Bne(f(t)?),
            Bgt(t) => Bgt(f(t)?),
            Bge(t) => Bge(f(t)?),
            Blt(t) => Blt(f(t)?),
            Ble(t) => Ble(f(t)?),
            Leave(t) => Leave(f(t)?),
            Nop => Nop,
            LdNull => LdNull,
            LdBool(v) => LdBool(v),
            LdI32(v) => LdI32(v),
            LdI64(v) => LdI64(v),
            LdF64(v) => LdF64(v),
            LdStr(s) => LdStr(s),
            LdArg(i) => LdArg(i),
            StArg(i) => StArg(i),
            LdLoc(l) => LdLoc(l),
            StLoc(l) => StLoc(l),
            Dup => Dup,
            Pop => Pop,
            Add => Add,
            Sub => Sub,
            Mul => Mul,
            Div => Div,
            Rem => Rem,
            Neg => Neg,
            Not => Not,
            Ceq => Ceq,
            Cgt => Cgt,
            Clt => Clt,
            LdFld(f) => LdFld(f),
            StFld(f) => StFld(f),
            LdSFld(f) => LdSFld(f),
            StSFld(f) => StSFld(f),
            Call(m) => Call(m),
            CallVirt(m) => CallVirt(m),
            NewObj(m) => NewObj(m),
            IsInst(t) => IsInst(t),
            Throw => Throw,
            Rethrow => Rethrow,
            EndFinally => EndFinally,
            Ret => Ret,
        })
    }

    /// Control never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Br(_) | Self::Leave(_) | Self::Ret | Self::Throw | Self::Rethrow | Self::EndFinally
        )
    }

    /// `(pops, pushes)` for instructions whose effect does not depend on a
    /// method signature. `None` for calls and `Ret`.
    pub fn fixed_stack_effect(&self) -> Option<(u32, u32)> {
        use Instruction::*;
        let effect = match self {
            Nop | Br(_) | Rethrow | Leave(_) | EndFinally => (0, 0),
            LdNull | LdBool(_) | LdI32(_) | LdI64(_) | LdF64(_) | LdStr(_) => (0, 1),
            LdArg(_) | LdLoc(_) | LdSFld(_) => (0, 1),
            StArg(_) | StLoc(_) | StSFld(_) | Pop => (1, 0),
            Dup => (1, 2),
            Add | Sub | Mul | Div | Rem | Ceq | Cgt | Clt => (2, 1),
            Neg | Not | LdFld(_) | IsInst(_) => (1, 1),
            BrTrue(_) | BrFalse(_) | Throw => (1, 0),
            Beq(_) | Bne(_) | Bgt(_) | Bge(_) | Blt(_) | Ble(_) | StFld(_) => (2, 0),
            Call(_) | CallVirt(_) | NewObj(_) | Ret => return None,
        };
        Some(effect)
    }

    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            Nop => "nop",
            LdNull => "ldnull",
            LdBool(_) => "ldc.bool",
            LdI32(_) => "ldc.i4",
            LdI64(_) => "ldc.i8",
            LdF64(_) => "ldc.r8",
            LdStr(_) => "ldstr",
            LdArg(_) => "ldarg",
            StArg(_) => "starg",
            LdLoc(_) => "ldloc",
            StLoc(_) => "stloc",
            Dup => "dup",
            Pop => "pop",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Rem => "rem",
            Neg => "neg",
            Not => "not",
            Ceq => "ceq",
            Cgt => "cgt",
            Clt => "clt",
            Br(_) => "br",
            BrTrue(_) => "brtrue",
            BrFalse(_) => "brfalse",
            Beq(_) => "beq",
            Bne(_) => "bne",
            Bgt(_) => "bgt",
            Bge(_) => "bge",
            Blt(_) => "blt",
            Ble(_) => "ble",
            LdFld(_) => "ldfld",
            StFld(_) => "stfld",
            LdSFld(_) => "ldsfld",
            StSFld(_) => "stsfld",
            Call(_) => "call",
            CallVirt(_) => "callvirt",
            NewObj(_) => "newobj",
            IsInst(_) => "isinst",
            Throw => "throw",
            Rethrow => "rethrow",
            Leave(_) => "leave",
            EndFinally => "endfinally",
            Ret => "ret",
        }
    }

    /// Local slot operand, if any.
    pub fn local(&self) -> Option<Local> {
        match self {
            Self::LdLoc(l) | Self::StLoc(l) => Some(*l),
            _ => None,
        }
    }
}
