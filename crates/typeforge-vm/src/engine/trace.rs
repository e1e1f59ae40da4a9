//! Execution tracing.
//!
//! The VM is generic over its tracer. `NoopTracer` methods are empty and
//! `#[inline(always)]`, so untraced execution pays nothing for the calls.
//! `PrintTracer` resolves names through the type system and collects one
//! line per event.

use typeforge_bytecode::{HandlerKind, Instruction, format_instruction};
use typeforge_core::{FieldId, MethodId, TypeId, TypeSystem};

/// Tracer trait for VM execution instrumentation.
///
/// - `trace_instruction` - before executing an instruction
/// - `trace_call` / `trace_return` - entering and leaving a method, natives included
/// - `trace_throw` - when an exception is raised or rethrown
/// - `trace_handler` - when control enters a catch or finally handler
/// - `trace_field_store` - after a field store
pub trait Tracer {
    fn trace_instruction(&mut self, method: MethodId, ip: usize, instr: &Instruction);
    fn trace_call(&mut self, method: MethodId);
    fn trace_return(&mut self, method: MethodId);
    fn trace_throw(&mut self, ty: TypeId);
    fn trace_handler(&mut self, kind: HandlerKind, ip: usize);
    fn trace_field_store(&mut self, field: FieldId);
}

/// Tracer that does nothing.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_instruction(&mut self, _method: MethodId, _ip: usize, _instr: &Instruction) {}

    #[inline(always)]
    fn trace_call(&mut self, _method: MethodId) {}

    #[inline(always)]
    fn trace_return(&mut self, _method: MethodId) {}

    #[inline(always)]
    fn trace_throw(&mut self, _ty: TypeId) {}

    #[inline(always)]
    fn trace_handler(&mut self, _kind: HandlerKind, _ip: usize) {}

    #[inline(always)]
    fn trace_field_store(&mut self, _field: FieldId) {}
}

/// Tracer that collects a readable execution trace.
pub struct PrintTracer<'t> {
    types: &'t dyn TypeSystem,
    lines: Vec<String>,
    /// Call depth, for indentation.
    depth: usize,
    /// Whether instruction lines are recorded, or only calls and exceptions.
    instructions: bool,
}

impl<'t> PrintTracer<'t> {
    pub fn new(types: &'t dyn TypeSystem) -> Self {
        Self {
            types,
            lines: Vec::new(),
            depth: 0,
            instructions: true,
        }
    }

    /// Record only calls, returns, throws, handlers and field stores.
    pub fn events_only(mut self) -> Self {
        self.instructions = false;
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines joined with newlines.
    pub fn output(&self) -> String {
        self.lines.join("\n")
    }

    pub fn print(&self) {
        for line in &self.lines {
            println!("{}", line);
        }
    }

    fn method_name(&self, id: MethodId) -> String {
        let def = self.types.method(id);
        format!("{}::{}", self.types.type_name(def.declaring), self.types.name(def.name))
    }

    fn push(&mut self, line: String) {
        let indent = "  ".repeat(self.depth);
        self.lines.push(format!("{indent}{line}"));
    }
}

impl Tracer for PrintTracer<'_> {
    fn trace_instruction(&mut self, _method: MethodId, ip: usize, instr: &Instruction) {
        if !self.instructions {
            return;
        }
        let text = format_instruction(instr, self.types);
        self.push(format!("{ip:04} {text}"));
    }

    fn trace_call(&mut self, method: MethodId) {
        let name = self.method_name(method);
        self.push(format!("-> {name}"));
        self.depth += 1;
    }

    fn trace_return(&mut self, method: MethodId) {
        self.depth = self.depth.saturating_sub(1);
        let name = self.method_name(method);
        self.push(format!("<- {name}"));
    }

    fn trace_throw(&mut self, ty: TypeId) {
        let name = self.types.type_name(ty).to_owned();
        self.push(format!("!! throw {name}"));
    }

    fn trace_handler(&mut self, kind: HandlerKind, ip: usize) {
        let line = match kind {
            HandlerKind::Catch(ty) => format!("=> catch {} at {ip:04}", self.types.type_name(ty)),
            HandlerKind::Finally => format!("=> finally at {ip:04}"),
        };
        self.push(line);
    }

    fn trace_field_store(&mut self, field: FieldId) {
        let def = self.types.field(field);
        let name = format!("{}::{}", self.types.type_name(def.declaring), self.types.name(def.name));
        self.push(format!("   store {name}"));
    }
}
