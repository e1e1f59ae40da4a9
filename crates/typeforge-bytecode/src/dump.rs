//! Human-readable disassembly for debugging and snapshot tests.
//!
//! ```text
//! max_stack: 2
//! locals:
//!   #0 i32
//! code:
//!   0000 ldc.i4 0
//!   0001 stloc #0
//! handlers:
//!   try [0003, 0007) finally [0007, 0010)
//! ```

use std::fmt::{Display, Write as _};

use typeforge_core::{FieldId, MethodId, TypeSystem};

use crate::body::{HandlerKind, MethodBody};
use crate::instruction::Instruction;
use crate::module::Module;

/// Disassemble one body.
pub fn dump(body: &MethodBody, types: &dyn TypeSystem) -> String {
    let mut out = String::new();

    writeln!(out, "max_stack: {}", body.max_stack).unwrap();

    if !body.locals.is_empty() {
        out.push_str("locals:\n");
        for (i, &ty) in body.locals.iter().enumerate() {
            writeln!(out, "  #{i} {}", types.type_name(ty)).unwrap();
        }
    }

    out.push_str("code:\n");
    for (i, instr) in body.instructions.iter().enumerate() {
        writeln!(out, "  {i:04} {}", format_instruction(instr, types)).unwrap();
    }

    if !body.handlers.is_empty() {
        out.push_str("handlers:\n");
        for h in &body.handlers {
            let kind = match h.kind {
                HandlerKind::Catch(ty) => format!("catch {}", types.type_name(ty)),
                HandlerKind::Finally => "finally".to_owned(),
            };
            writeln!(
                out,
                "  try [{:04}, {:04}) {kind} [{:04}, {:04})",
                h.try_start, h.try_end, h.handler_start, h.handler_end
            )
            .unwrap();
        }
    }

    out
}

/// Disassemble every body in a module, headed by the owning method's name.
pub fn dump_module(module: &Module, types: &dyn TypeSystem) -> String {
    let mut out = String::new();
    for (i, (method, body)) in module.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        writeln!(out, "{}:", method_name(method, types)).unwrap();
        out.push_str(&dump(body, types));
    }
    out
}

/// Render one instruction with its operand, e.g. `ldfld Counter::count`.
pub fn format_instruction<T: Copy + Display>(instr: &Instruction<T>, types: &dyn TypeSystem) -> String {
    use Instruction::*;

    let mnemonic = instr.mnemonic();
    let operand = match instr {
        LdBool(v) => v.to_string(),
        LdI32(v) => v.to_string(),
        LdI64(v) => v.to_string(),
        LdF64(v) => format!("{v:?}"),
        LdStr(s) => format!("{s:?}"),
        LdArg(i) | StArg(i) => i.to_string(),
        LdLoc(l) | StLoc(l) => l.to_string(),
        LdFld(f) | StFld(f) | LdSFld(f) | StSFld(f) => field_name(*f, types),
        Call(m) | CallVirt(m) | NewObj(m) => method_name(*m, types),
        IsInst(t) => types.type_name(*t).to_owned(),
        _ => match instr.target() {
            Some(t) => t.to_string(),
            None => return mnemonic.to_owned(),
        },
    };

    format!("{mnemonic} {operand}")
}

fn field_name(id: FieldId, types: &dyn TypeSystem) -> String {
    let def = types.field(id);
    format!("{}::{}", types.type_name(def.declaring), types.name(def.name))
}

fn method_name(id: MethodId, types: &dyn TypeSystem) -> String {
    let def = types.method(id);
    format!("{}::{}", types.type_name(def.declaring), types.name(def.name))
}
